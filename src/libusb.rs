//! `Transport` implementation on top of libusb.
//!
//! libusb does enumeration and configuration on its own, so this transport is mostly bookkeeping:
//! devices are opened and bound to a slot by the application, endpoint claims are tracked here,
//! and bulk transfers run with a timeout when they are submitted. Their results are queued and
//! have to be fetched with `poll_completion`.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;

use crate::descriptor::{Direction, EndpointDescriptor, DESCRIPTOR_TYPE_CONFIGURATION};
use crate::transport::{Completion, TransferResult, Transport};
use crate::{Error, ErrorKind, Result};

type Handle = rusb::DeviceHandle<rusb::GlobalContext>;

const REQ_GET_DESCRIPTOR: u8 = 0x06;
/// Standard request, device recipient, device-to-host.
const REQ_TYPE_STANDARD_IN: u8 = 0x80;

/// An opened device and the driver resources held on it.
struct Attached {
    handle: Handle,
    /// Claimed interface numbers. Released on drop.
    interfaces: Vec<u8>,
    /// Endpoints opened through `register_endpoint`.
    endpoints: Vec<u8>,
    /// Endpoints with a claimed transfer.
    busy: Vec<u8>,
}

impl Drop for Attached {
    fn drop(&mut self) {
        for &index in &self.interfaces {
            self.handle.release_interface(index).ok();
        }
    }
}

/// A [`Transport`] driving devices through libusb.
///
/// Each device has to be attached to a slot before the slot can be mounted with
/// `VendorHost::open`. Transfers are executed synchronously when they are submitted, honoring the
/// configured timeout. The endpoint stays claimed until its `Completion` is taken out with
/// `poll_completion`.
///
/// [`Transport`]: trait.Transport.html
pub struct LibusbTransport {
    devices: HashMap<u8, Attached>,
    completions: VecDeque<Completion>,
    timeout: Duration,
}

impl LibusbTransport {
    const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            completions: VecDeque::new(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Returns the configured timeout for USB operations.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sets the timeout to use for USB operations.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Opens the device with the given VID and PID and attaches it to `slot`.
    ///
    /// If multiple devices match the IDs, an error will be returned.
    pub fn attach_by_id(&mut self, slot: u8, vid: u16, pid: u16) -> Result<()> {
        self.attach_filtered(slot, |dev| {
            let descr = dev.device_descriptor().map_err(Error::usb)?;
            Ok(descr.vendor_id() == vid && descr.product_id() == pid)
        })
    }

    /// Opens a device by its unique USB address and attaches it to `slot`.
    ///
    /// The address is not device-specific and may change when the device is replugged.
    pub fn attach_by_addr(&mut self, slot: u8, bus_number: u8, device_address: u8) -> Result<()> {
        self.attach_filtered(slot, |dev| {
            Ok(dev.bus_number() == bus_number && dev.address() == device_address)
        })
    }

    /// Attaches a unique device that matches a `filter` predicate.
    ///
    /// Private, since we don't want to make rusb a public dependency.
    fn attach_filtered(
        &mut self,
        slot: u8,
        mut filter: impl FnMut(&rusb::Device<rusb::GlobalContext>) -> Result<bool>,
    ) -> Result<()> {
        if self.devices.contains_key(&slot) {
            return Err(Error::new(
                ErrorKind::SlotInUse,
                format!("slot {} already has a device attached", slot),
            ));
        }

        let list = rusb::devices().map_err(Error::usb)?;
        let mut selected_device = None;
        for device in list.iter() {
            if filter(&device)? {
                if selected_device.is_some() {
                    return Err(Error::from_kind(ErrorKind::MultipleDevicesFound));
                }
                selected_device = Some(device);
            }
        }

        let device = selected_device.ok_or_else(|| Error::from_kind(ErrorKind::NoDeviceFound))?;
        log::debug!("LibusbTransport::attach(slot = {}, device = {:?})", slot, device);

        let handle = device.open().map_err(|e| {
            if cfg!(windows) && matches!(e, rusb::Error::NotSupported | rusb::Error::NotFound) {
                // Provide a more helpful error message on non-plug-and-play platforms.
                Error::new(
                    ErrorKind::Usb,
                    format!(
                        "{} (this error may be caused by not having the WinUSB driver installed; \
                            use Zadig (https://zadig.akeo.ie/) to install it for the device)",
                        e
                    ),
                )
            } else {
                Error::usb(e)
            }
        })?;

        self.devices.insert(
            slot,
            Attached {
                handle,
                interfaces: Vec::new(),
                endpoints: Vec::new(),
                busy: Vec::new(),
            },
        );
        Ok(())
    }

    /// Closes the device attached to `slot`, releasing its claimed interfaces.
    ///
    /// Completions of the device that were not polled yet are discarded. Returns whether a device
    /// was attached.
    pub fn detach(&mut self, slot: u8) -> bool {
        self.completions.retain(|c| c.slot != slot);
        self.devices.remove(&slot).is_some()
    }

    /// Returns whether a device is attached to `slot`.
    pub fn is_attached(&self, slot: u8) -> bool {
        self.devices.contains_key(&slot)
    }

    fn attached(&self, slot: u8) -> Result<&Attached> {
        self.devices.get(&slot).ok_or_else(|| {
            Error::new(
                ErrorKind::DeviceNotReady,
                format!("no device attached to slot {}", slot),
            )
        })
    }

    /// Reads the raw configuration descriptor of the device at `slot`, including all interface,
    /// endpoint and class-specific descriptors.
    pub fn read_config_descriptor(&self, slot: u8) -> Result<Vec<u8>> {
        let dev = self.attached(slot)?;
        let value = u16::from(DESCRIPTOR_TYPE_CONFIGURATION) << 8; // index 0

        let mut header = [0; 9];
        let n = dev
            .handle
            .read_control(
                REQ_TYPE_STANDARD_IN,
                REQ_GET_DESCRIPTOR,
                value,
                0,
                &mut header,
                self.timeout,
            )
            .map_err(Error::usb)?;
        if n != header.len() || header[1] != DESCRIPTOR_TYPE_CONFIGURATION {
            return Err(Error::other(format!(
                "invalid configuration descriptor header {:02x?}",
                &header[..n]
            )));
        }

        let total_length = u16::from_le_bytes([header[2], header[3]]);
        let mut buf = vec![0; usize::from(total_length)];
        let n = dev
            .handle
            .read_control(
                REQ_TYPE_STANDARD_IN,
                REQ_GET_DESCRIPTOR,
                value,
                0,
                &mut buf,
                self.timeout,
            )
            .map_err(Error::usb)?;
        if n != buf.len() {
            return Err(Error::other(format!(
                "read {} bytes, expected {}",
                n,
                buf.len()
            )));
        }

        Ok(buf)
    }

    /// Takes the oldest finished transfer out of the queue and releases its endpoint.
    ///
    /// Pass its slot, endpoint, result and length on to `VendorHost::on_transfer_complete`.
    pub fn poll_completion(&mut self) -> Option<Completion> {
        let completion = self.completions.pop_front()?;
        if let Some(dev) = self.devices.get_mut(&completion.slot) {
            dev.busy.retain(|&ep| ep != completion.endpoint);
        }
        Some(completion)
    }
}

impl Default for LibusbTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn transfer_result(e: rusb::Error) -> TransferResult {
    match e {
        rusb::Error::Pipe => TransferResult::Stalled,
        rusb::Error::Timeout => TransferResult::Timeout,
        rusb::Error::InvalidParam => TransferResult::Invalid,
        _ => TransferResult::Failed,
    }
}

impl Transport for LibusbTransport {
    fn device_identity(&self, slot: u8) -> Option<(u16, u16)> {
        // This is infallible since libusb 1.0.16.
        let descr = self.devices.get(&slot)?.handle.device().device_descriptor().ok()?;
        Some((descr.vendor_id(), descr.product_id()))
    }

    fn register_endpoint(&mut self, slot: u8, endpoint: &EndpointDescriptor) -> bool {
        match self.devices.get_mut(&slot) {
            Some(dev) => {
                if !dev.endpoints.contains(&endpoint.address) {
                    dev.endpoints.push(endpoint.address);
                }
                true
            }
            None => false,
        }
    }

    fn claim_endpoint(&mut self, slot: u8, endpoint: u8) -> bool {
        match self.devices.get_mut(&slot) {
            Some(dev) if dev.endpoints.contains(&endpoint) && !dev.busy.contains(&endpoint) => {
                dev.busy.push(endpoint);
                true
            }
            _ => false,
        }
    }

    fn release_endpoint(&mut self, slot: u8, endpoint: u8) {
        self.completions
            .retain(|c| !(c.slot == slot && c.endpoint == endpoint));
        if let Some(dev) = self.devices.get_mut(&slot) {
            dev.busy.retain(|&ep| ep != endpoint);
        }
    }

    fn submit_transfer(&mut self, slot: u8, endpoint: u8, mut buffer: Vec<u8>) -> bool {
        let dev = match self.devices.get(&slot) {
            Some(dev) if dev.busy.contains(&endpoint) => dev,
            _ => return false,
        };

        let res = match Direction::of(endpoint) {
            Direction::In => dev.handle.read_bulk(endpoint, &mut buffer, self.timeout),
            Direction::Out => dev.handle.write_bulk(endpoint, &buffer, self.timeout),
        };
        let (result, bytes_transferred) = match res {
            Ok(n) => (TransferResult::Success, n as u32),
            Err(e) => {
                log::debug!("slot {}: transfer on {:#04x} failed: {}", slot, endpoint, e);
                (transfer_result(e), 0)
            }
        };

        self.completions.push_back(Completion {
            slot,
            endpoint,
            result,
            bytes_transferred,
            buffer,
        });
        true
    }

    fn set_config_complete(&mut self, slot: u8, interface_number: u8) -> bool {
        let dev = match self.devices.get_mut(&slot) {
            Some(dev) => dev,
            None => return false,
        };
        if dev.interfaces.contains(&interface_number) {
            return true;
        }

        match dev.handle.claim_interface(interface_number) {
            Ok(()) => {
                dev.interfaces.push(interface_number);
                true
            }
            Err(e) => {
                log::error!(
                    "slot {}: failed to claim interface {}: {}",
                    slot,
                    interface_number,
                    e
                );
                false
            }
        }
    }
}

impl fmt::Debug for LibusbTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut slots = self.devices.keys().collect::<Vec<_>>();
        slots.sort();
        f.debug_struct("LibusbTransport")
            .field("slots", &slots)
            .field("pending", &self.completions.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}
