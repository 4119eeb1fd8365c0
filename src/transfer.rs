//! Bulk transfers on a mounted interface.
//!
//! `lib.rs` drives the slot lifecycle, while this module checks caller requests against the
//! registry and hands them to the transport.

use crate::completion::CompletionHandler;
use crate::descriptor::Direction;
use crate::transport::Transport;
use crate::{Error, ErrorKind, Result, VendorHost};

impl<T: Transport, H: CompletionHandler> VendorHost<T, H> {
    /// Starts a bulk IN transfer of `buffer.len()` Bytes from the device at `slot`.
    ///
    /// `vendor_id` and `product_id` have to match the device currently bound to `slot`, which
    /// guards against talking to a device that replaced the intended one in the same slot.
    ///
    /// Returns once the transport accepted the transfer. The result is delivered through
    /// `on_transfer_complete`, the buffer is handed back by the transport.
    ///
    /// # Errors
    ///
    /// * `DeviceNotReady` if the slot is not mounted for `vendor_id:product_id`.
    /// * `InvalidArgument` if `buffer` is empty.
    /// * `EndpointBusy` if a read is already in flight.
    /// * `TransferRejected` if the transport refused to start the transfer.
    pub fn read(
        &mut self,
        slot: u8,
        vendor_id: u16,
        product_id: u16,
        buffer: Vec<u8>,
    ) -> Result<()> {
        self.submit(slot, vendor_id, product_id, Direction::In, buffer)
    }

    /// Starts a bulk OUT transfer of `data` to the device at `slot`.
    ///
    /// Same contract as [`read`](#method.read), using the OUT endpoint.
    pub fn write(
        &mut self,
        slot: u8,
        vendor_id: u16,
        product_id: u16,
        data: Vec<u8>,
    ) -> Result<()> {
        self.submit(slot, vendor_id, product_id, Direction::Out, data)
    }

    fn submit(
        &mut self,
        slot: u8,
        vendor_id: u16,
        product_id: u16,
        dir: Direction,
        buffer: Vec<u8>,
    ) -> Result<()> {
        if !self.registry.is_mounted(slot, vendor_id, product_id) {
            return Err(Error::new(
                ErrorKind::DeviceNotReady,
                format!(
                    "no interface of {:04x}:{:04x} mounted at slot {}",
                    vendor_id, product_id, slot
                ),
            ));
        }

        if buffer.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "transfer buffer is empty",
            ));
        }

        let entry = match self.registry.entry_mut(slot) {
            Some(entry) => entry,
            None => return Err(ErrorKind::DeviceNotReady.into()),
        };
        let ep = entry.record.endpoint(dir);
        let len = buffer.len();

        if !self.transport.claim_endpoint(slot, ep) {
            return Err(Error::new(
                ErrorKind::EndpointBusy,
                format!("endpoint {:#04x} on slot {} is busy", ep, slot),
            ));
        }

        if !self.transport.submit_transfer(slot, ep, buffer) {
            self.transport.release_endpoint(slot, ep);
            return Err(Error::new(
                ErrorKind::TransferRejected,
                format!("{} byte transfer on endpoint {:#04x}", len, ep),
            ));
        }

        log::trace!("slot {}: {} byte transfer on {:#04x} accepted", slot, len, ep);
        entry.in_flight.insert(dir.into());
        Ok(())
    }
}
