//! Host-side driver for vendor-specific USB interfaces.
//!
//! Many vendor-defined devices expose a single interface with one bulk IN and one bulk OUT
//! endpoint and speak a private protocol over it. This crate implements the USB side of such a
//! driver: it binds the endpoints when the host stack mounts the interface, keeps track of which
//! device is attached to which slot, and hands bulk transfers to the stack.
//!
//! The host stack itself is abstracted by the [`Transport`] trait. [`LibusbTransport`] implements
//! it on top of libusb, other implementations can sit on a bare-metal host controller.
//!
//! ```no_run
//! use rvendor::{descriptor, LibusbTransport, VendorHost};
//!
//! # fn main() -> rvendor::Result<()> {
//! let mut transport = LibusbTransport::new();
//! transport.attach_by_id(1, 0x1234, 0x5678)?;
//! let config = transport.read_config_descriptor(1)?;
//!
//! let mut host = VendorHost::new(transport);
//! let offset = descriptor::find_vendor_interface(&config)?.expect("no vendor interface");
//! host.open(1, &config[offset..])?;
//! host.set_config(1, config[offset + 2]);
//!
//! host.write(1, 0x1234, 0x5678, b"ping".to_vec())?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Transport`]: trait.Transport.html
//! [`LibusbTransport`]: struct.LibusbTransport.html

#![doc(html_root_url = "https://docs.rs/rvendor/0.0.0")]
// Deny a few warnings in doctests, since rustdoc `allow`s many warnings by default
#![doc(test(attr(deny(unused_imports, unused_must_use))))]
#![warn(missing_debug_implementations, rust_2018_idioms)]

mod binder;
mod completion;
pub mod descriptor;
mod error;
mod libusb;
mod registry;
mod transfer;
mod transport;

#[cfg(test)]
mod test_transport;

use std::fmt;

pub use completion::{AcceptAll, CompletionHandler};
pub use error::{Error, ErrorKind};
pub use libusb::LibusbTransport;
pub use registry::{Record, Registry, SlotState};
pub use transport::{Completion, TransferResult, Transport};

/// A result type with the error hardwired to [`Error`].
///
/// [`Error`]: struct.Error.html
pub type Result<T> = std::result::Result<T, Error>;

/// Driver for the vendor interfaces of all devices attached to one host stack.
///
/// The host stack calls the lifecycle methods (`init`, `open`, `set_config`,
/// `on_transfer_complete`, `close`) as devices come and go. Application code uses `is_mounted`,
/// `read` and `write`.
///
/// All methods take `&mut self`. The driver itself never blocks; `read` and `write` only wait if
/// the transport runs transfers synchronously, as `LibusbTransport` does (at most its configured
/// timeout). To drive several slots from different threads, put the driver behind a `Mutex`.
pub struct VendorHost<T, H = AcceptAll> {
    transport: T,
    handler: H,
    registry: Registry,
}

impl<T: Transport> VendorHost<T> {
    /// Number of device slots used by `new`.
    pub const DEFAULT_MAX_DEVICES: usize = 4;

    /// Creates a driver with `DEFAULT_MAX_DEVICES` slots and the `AcceptAll` completion handler.
    pub fn new(transport: T) -> Self {
        Self::with_capacity(transport, Self::DEFAULT_MAX_DEVICES)
    }

    /// Creates a driver with slots `1..=max_devices`.
    ///
    /// # Panics
    ///
    /// Panics if `max_devices` is not in range `1..=255`.
    pub fn with_capacity(transport: T, max_devices: usize) -> Self {
        Self {
            transport,
            handler: AcceptAll,
            registry: Registry::new(max_devices),
        }
    }
}

impl<T: Transport, H: CompletionHandler> VendorHost<T, H> {
    /// Replaces the completion handler.
    ///
    /// This consumes the driver and returns a new instance using `handler`. Slot state is kept.
    pub fn with_handler<H2: CompletionHandler>(self, handler: H2) -> VendorHost<T, H2> {
        VendorHost {
            transport: self.transport,
            handler,
            registry: self.registry,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Returns the table of interface records.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the lifecycle state of `slot`, or `None` if `slot` is out of range.
    pub fn state(&self, slot: u8) -> Option<SlotState> {
        self.registry.state(slot)
    }

    /// Returns whether `slot` has a bound vendor interface of device `vendor_id:product_id`.
    pub fn is_mounted(&self, slot: u8, vendor_id: u16, product_id: u16) -> bool {
        self.registry.is_mounted(slot, vendor_id, product_id)
    }

    /// Resets every slot to `Unmounted`.
    ///
    /// Endpoints with a transfer in flight are released in the transport, as `close` does.
    pub fn init(&mut self) {
        log::debug!("VendorHost::init({} slots)", self.registry.capacity());
        for slot in 1..=self.registry.capacity() as u8 {
            self.release_in_flight(slot);
        }
        self.registry.clear_all();
    }

    /// Mounts the vendor interface whose descriptors start at `descr`.
    ///
    /// `descr` must begin with the interface descriptor, followed by its bulk IN and bulk OUT
    /// endpoint descriptors in either order. It may extend further; only the interface's own
    /// descriptors are parsed. On success, returns the number of Bytes they occupy, so the caller
    /// can continue walking the configuration descriptor after them.
    ///
    /// On failure, the slot stays `Unmounted`.
    pub fn open(&mut self, slot: u8, descr: &[u8]) -> Result<usize> {
        log::debug!("VendorHost::open(slot = {}, {} bytes)", slot, descr.len());

        match self.registry.state(slot) {
            Some(SlotState::Unmounted) => {}
            Some(state) => {
                return Err(Error::new(
                    ErrorKind::SlotInUse,
                    format!("slot {} is {:?}", slot, state),
                ))
            }
            None => {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!(
                        "slot {} out of range (driver has {})",
                        slot,
                        self.registry.capacity()
                    ),
                ))
            }
        }

        match binder::bind(&mut self.transport, &mut self.registry, slot, descr) {
            Ok(consumed) => {
                if let Some(rec) = self.registry.lookup(slot) {
                    log::debug!(
                        "slot {}: mounted {:04x}:{:04x}, IN {:#04x}, OUT {:#04x}",
                        slot,
                        rec.vendor_id(),
                        rec.product_id(),
                        rec.endpoint_in(),
                        rec.endpoint_out()
                    );
                }
                Ok(consumed)
            }
            Err(e) => {
                log::error!("slot {}: failed to mount vendor interface: {}", slot, e);
                self.registry.clear(slot);
                Err(e)
            }
        }
    }

    /// Acknowledges that the stack finished configuring interface `interface_number` of `slot`.
    ///
    /// Returns `false` without notifying the transport if `slot` has no mounted interface.
    pub fn set_config(&mut self, slot: u8, interface_number: u8) -> bool {
        log::debug!(
            "VendorHost::set_config(slot = {}, interface = {})",
            slot,
            interface_number
        );

        match self.registry.entry_mut(slot) {
            Some(entry) if entry.record.is_bound() => entry.configured = true,
            _ => {
                log::warn!("set_config on unmounted slot {}", slot);
                return false;
            }
        }

        self.transport.set_config_complete(slot, interface_number)
    }

    /// Called by the stack when an accepted transfer finished.
    ///
    /// The outcome is passed unchanged to the completion handler and its verdict is returned. The
    /// slot leaves the `Transferring` state whatever the result was. No retries are made.
    ///
    /// Completions for slots without a mounted interface, or for endpoints that don't belong to
    /// it, are dropped and `false` is returned. These can arrive after `close`.
    pub fn on_transfer_complete(
        &mut self,
        slot: u8,
        endpoint: u8,
        result: TransferResult,
        bytes_transferred: u32,
    ) -> bool {
        log::trace!(
            "VendorHost::on_transfer_complete(slot = {}, ep = {:#04x}, {:?}, {} bytes)",
            slot,
            endpoint,
            result,
            bytes_transferred
        );

        let entry = match self.registry.entry_mut(slot) {
            Some(entry) if entry.record.is_bound() => entry,
            _ => {
                log::warn!(
                    "dropping completion for unmounted slot {} (ep {:#04x})",
                    slot,
                    endpoint
                );
                return false;
            }
        };

        let dir = descriptor::Direction::of(endpoint);
        if entry.record.endpoint(dir) != endpoint {
            log::warn!(
                "dropping completion for unknown endpoint {:#04x} on slot {}",
                endpoint,
                slot
            );
            return false;
        }
        entry.in_flight.remove(dir.into());

        self.handler
            .transfer_complete(slot, endpoint, result, bytes_transferred)
    }

    /// Unbinds the interface of `slot`, eg. because the device was disconnected.
    ///
    /// Claims of transfers still in flight are released in the transport. Closing an unmounted or
    /// out-of-range slot does nothing.
    pub fn close(&mut self, slot: u8) {
        log::debug!("VendorHost::close(slot = {})", slot);

        self.release_in_flight(slot);
        self.registry.clear(slot);
    }

    fn release_in_flight(&mut self, slot: u8) {
        let entry = match self.registry.entry(slot) {
            Some(entry) => *entry,
            None => return,
        };

        for &dir in &[descriptor::Direction::In, descriptor::Direction::Out] {
            if entry.in_flight.contains(dir.into()) {
                let ep = entry.record.endpoint(dir);
                log::debug!("slot {}: releasing busy endpoint {:#04x}", slot, ep);
                self.transport.release_endpoint(slot, ep);
            }
        }
    }
}

impl<T, H> fmt::Debug for VendorHost<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorHost")
            .field("registry", &self.registry)
            .finish()
    }
}
