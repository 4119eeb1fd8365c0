//! Interface to the USB host stack underneath the driver.

use crate::descriptor::EndpointDescriptor;

/// Outcome of a finished transfer, as reported by the transport.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransferResult {
    Success,
    Failed,
    /// The device answered with a STALL handshake.
    Stalled,
    Timeout,
    Invalid,
}

/// A finished transfer, handed back by transports that queue completions.
#[derive(Debug)]
pub struct Completion {
    pub slot: u8,
    pub endpoint: u8,
    pub result: TransferResult,
    pub bytes_transferred: u32,
    /// The buffer passed to `submit_transfer`. For IN transfers, the first `bytes_transferred`
    /// Bytes hold the received data.
    pub buffer: Vec<u8>,
}

impl Completion {
    /// Returns the part of the buffer that was actually transferred.
    pub fn data(&self) -> &[u8] {
        let len = (self.bytes_transferred as usize).min(self.buffer.len());
        &self.buffer[..len]
    }
}

/// Services the driver consumes from the surrounding USB host stack.
///
/// Enumeration, addressing and control transfers are the stack's business. The driver only asks
/// it to open endpoints, to hand out exclusive claims on them and to run bulk transfers. Finished
/// transfers are reported back by calling [`VendorHost::on_transfer_complete`].
///
/// [`VendorHost::on_transfer_complete`]: ../struct.VendorHost.html#method.on_transfer_complete
pub trait Transport {
    /// Returns the VID and PID of the device attached at `slot`.
    fn device_identity(&self, slot: u8) -> Option<(u16, u16)>;

    /// Opens an endpoint of the device at `slot` so transfers can be scheduled on it.
    fn register_endpoint(&mut self, slot: u8, endpoint: &EndpointDescriptor) -> bool;

    /// Reserves `endpoint` for a single transfer.
    ///
    /// Returns `false` if the endpoint is already claimed. The claim is dropped by the transport
    /// once it reports the transfer's completion, or by `release_endpoint`.
    fn claim_endpoint(&mut self, slot: u8, endpoint: u8) -> bool;

    /// Drops the claim on `endpoint` and abandons any transfer still running on it.
    fn release_endpoint(&mut self, slot: u8, endpoint: u8);

    /// Starts a transfer on a claimed endpoint.
    ///
    /// The transfer length is `buffer.len()`. Returns whether the transfer was accepted; the
    /// outcome is reported later.
    fn submit_transfer(&mut self, slot: u8, endpoint: u8, buffer: Vec<u8>) -> bool;

    /// Tells the stack that the driver finished configuring interface `interface_number`.
    fn set_config_complete(&mut self, slot: u8, interface_number: u8) -> bool;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn device_identity(&self, slot: u8) -> Option<(u16, u16)> {
        (**self).device_identity(slot)
    }

    fn register_endpoint(&mut self, slot: u8, endpoint: &EndpointDescriptor) -> bool {
        (**self).register_endpoint(slot, endpoint)
    }

    fn claim_endpoint(&mut self, slot: u8, endpoint: u8) -> bool {
        (**self).claim_endpoint(slot, endpoint)
    }

    fn release_endpoint(&mut self, slot: u8, endpoint: u8) {
        (**self).release_endpoint(slot, endpoint)
    }

    fn submit_transfer(&mut self, slot: u8, endpoint: u8, buffer: Vec<u8>) -> bool {
        (**self).submit_transfer(slot, endpoint, buffer)
    }

    fn set_config_complete(&mut self, slot: u8, interface_number: u8) -> bool {
        (**self).set_config_complete(slot, interface_number)
    }
}
