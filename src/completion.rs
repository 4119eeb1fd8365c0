use crate::transport::TransferResult;

/// Receives the outcome of every accepted transfer.
///
/// Vendor protocols built on top of the driver implement this to interpret the payload. The
/// returned value is passed through [`VendorHost::on_transfer_complete`] to the host stack.
///
/// Closures of the form `FnMut(slot, endpoint, result, bytes_transferred) -> bool` implement this
/// trait too.
///
/// [`VendorHost::on_transfer_complete`]: struct.VendorHost.html#method.on_transfer_complete
pub trait CompletionHandler {
    fn transfer_complete(
        &mut self,
        slot: u8,
        endpoint: u8,
        result: TransferResult,
        bytes_transferred: u32,
    ) -> bool;
}

/// The default handler: reports every completion as handled, whatever its result.
#[derive(Debug, Copy, Clone, Default)]
pub struct AcceptAll;

impl CompletionHandler for AcceptAll {
    fn transfer_complete(&mut self, _: u8, _: u8, _: TransferResult, _: u32) -> bool {
        true
    }
}

impl<F> CompletionHandler for F
where
    F: FnMut(u8, u8, TransferResult, u32) -> bool,
{
    fn transfer_complete(
        &mut self,
        slot: u8,
        endpoint: u8,
        result: TransferResult,
        bytes_transferred: u32,
    ) -> bool {
        self(slot, endpoint, result, bytes_transferred)
    }
}
