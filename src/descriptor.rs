//! Parsing of the standard USB interface and endpoint descriptors.
//!
//! The layouts are defined in chapter 9 of the USB 2.0 specification. All multi-byte fields are
//! little-endian.

use crate::{Error, ErrorKind, Result};
use std::fmt;

/// `bDescriptorType` of a configuration descriptor.
pub const DESCRIPTOR_TYPE_CONFIGURATION: u8 = 0x02;
/// `bDescriptorType` of an interface descriptor.
pub const DESCRIPTOR_TYPE_INTERFACE: u8 = 0x04;
/// `bDescriptorType` of an endpoint descriptor.
pub const DESCRIPTOR_TYPE_ENDPOINT: u8 = 0x05;

/// `bInterfaceClass` value reserved for vendor-specific interfaces.
pub const CLASS_VENDOR_SPECIFIC: u8 = 0xFF;

/// Direction bit of `bEndpointAddress`. Set for IN (device-to-host) endpoints.
pub const ENDPOINT_DIR_IN_MASK: u8 = 0x80;

/// Data flow direction of an endpoint, as seen from the host.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device-to-host.
    In,
    /// Host-to-device.
    Out,
}

impl Direction {
    /// Decodes the direction bit of an endpoint address.
    pub fn of(endpoint_address: u8) -> Self {
        if endpoint_address & ENDPOINT_DIR_IN_MASK != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }
}

/// Transfer type encoded in the low bits of `bmAttributes`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

/// A standard interface descriptor (USB 2.0 Table 9-12).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub length: u8,
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    pub interface_str: u8,
}

impl InterfaceDescriptor {
    /// Size of the standard interface descriptor in Bytes.
    pub const SIZE: usize = 9;

    /// Parses an interface descriptor from the start of `bytes`.
    ///
    /// Trailing data after the descriptor is ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let raw = header(bytes, DESCRIPTOR_TYPE_INTERFACE, Self::SIZE)?;
        Ok(Self {
            length: raw[0],
            interface_number: raw[2],
            alternate_setting: raw[3],
            num_endpoints: raw[4],
            class: raw[5],
            sub_class: raw[6],
            protocol: raw[7],
            interface_str: raw[8],
        })
    }

    /// Returns whether this interface uses the vendor-specific class code.
    pub fn is_vendor_specific(&self) -> bool {
        self.class == CLASS_VENDOR_SPECIFIC
    }
}

/// A standard endpoint descriptor (USB 2.0 Table 9-13).
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub length: u8,
    /// `bEndpointAddress`: endpoint number plus direction bit.
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointDescriptor {
    /// Size of the standard endpoint descriptor in Bytes.
    pub const SIZE: usize = 7;

    /// Parses an endpoint descriptor from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let raw = header(bytes, DESCRIPTOR_TYPE_ENDPOINT, Self::SIZE)?;
        Ok(Self {
            length: raw[0],
            address: raw[2],
            attributes: raw[3],
            max_packet_size: u16::from_le_bytes([raw[4], raw[5]]),
            interval: raw[6],
        })
    }

    pub fn direction(&self) -> Direction {
        Direction::of(self.address)
    }

    /// Endpoint number without the direction bit.
    pub fn number(&self) -> u8 {
        self.address & 0x0F
    }

    pub fn transfer_type(&self) -> TransferType {
        match self.attributes & 0b11 {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }
}

impl fmt::Debug for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDescriptor")
            .field("address", &format_args!("{:#04x}", self.address))
            .field("direction", &self.direction())
            .field("transfer_type", &self.transfer_type())
            .field("max_packet_size", &self.max_packet_size)
            .finish()
    }
}

/// Checks `bLength` and `bDescriptorType` and returns the descriptor's fixed-size prefix.
fn header(bytes: &[u8], kind: u8, size: usize) -> Result<&[u8]> {
    if bytes.len() < size {
        return Err(Error::new(
            ErrorKind::MalformedDescriptor,
            format!("need {} bytes, only {} remaining", size, bytes.len()),
        ));
    }

    let (length, found) = (usize::from(bytes[0]), bytes[1]);
    if found != kind {
        return Err(Error::new(
            ErrorKind::MalformedDescriptor,
            format!("expected descriptor type {:#04x}, found {:#04x}", kind, found),
        ));
    }
    if length < size || length > bytes.len() {
        return Err(Error::new(
            ErrorKind::MalformedDescriptor,
            format!(
                "bLength {} invalid (minimum {}, {} remaining)",
                length,
                size,
                bytes.len()
            ),
        ));
    }

    Ok(&bytes[..size])
}

/// A raw descriptor yielded by [`Descriptors`].
///
/// [`Descriptors`]: struct.Descriptors.html
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RawDescriptor<'a> {
    /// Offset of the descriptor from the start of the walked block.
    pub offset: usize,
    /// `bDescriptorType`.
    pub kind: u8,
    /// The whole descriptor, including the `bLength`/`bDescriptorType` header.
    pub bytes: &'a [u8],
}

/// Iterator walking a block of concatenated descriptors by their `bLength` fields.
///
/// Yields an error and stops if a descriptor is shorter than its 2-Byte header or extends past the
/// end of the block.
#[derive(Debug, Clone)]
pub struct Descriptors<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Descriptors<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for Descriptors<'a> {
    type Item = Result<RawDescriptor<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }

        let rest = &self.bytes[self.offset..];
        let length = usize::from(rest[0]);
        if length < 2 || length > rest.len() {
            self.failed = true;
            return Some(Err(Error::new(
                ErrorKind::MalformedDescriptor,
                format!(
                    "descriptor at offset {} has bLength {} ({} bytes remaining)",
                    self.offset,
                    length,
                    rest.len()
                ),
            )));
        }

        let descr = RawDescriptor {
            offset: self.offset,
            kind: rest[1],
            bytes: &rest[..length],
        };
        self.offset += length;
        Some(Ok(descr))
    }
}

/// Finds the first vendor-specific interface in a configuration descriptor block.
///
/// Returns the offset of its interface descriptor, suitable for slicing the block and passing the
/// remainder to [`VendorHost::open`].
///
/// [`VendorHost::open`]: ../struct.VendorHost.html#method.open
pub fn find_vendor_interface(config: &[u8]) -> Result<Option<usize>> {
    for descr in Descriptors::new(config) {
        let descr = descr?;
        if descr.kind != DESCRIPTOR_TYPE_INTERFACE {
            continue;
        }

        let intf = InterfaceDescriptor::parse(descr.bytes)?;
        if intf.is_vendor_specific() {
            return Ok(Some(descr.offset));
        }
    }

    Ok(None)
}
