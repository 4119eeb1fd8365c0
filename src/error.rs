use std::{error, fmt};

/// The error type used by this library.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    inner: Option<Box<dyn error::Error + Send + Sync>>,
}

/// List of specific kinds of errors that may occur when using this library.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The slot has no mounted vendor interface, or the caller's VID/PID does not match the device
    /// currently bound to it.
    DeviceNotReady,

    /// An argument was out of range, eg. an empty transfer buffer or a slot number outside the
    /// driver's table.
    InvalidArgument,

    /// The interface descriptor block did not have the expected layout (an interface descriptor
    /// followed by two endpoint descriptors).
    MalformedDescriptor,

    /// Both endpoint descriptors of the interface point in the same direction.
    DuplicateEndpointRole,

    /// The transport refused to open one of the interface's endpoints.
    EndpointOpenFailed,

    /// The endpoint already has a transfer in flight.
    EndpointBusy,

    /// The endpoint was claimed, but the transport did not accept the transfer.
    TransferRejected,

    /// `open` was called on a slot that already has a bound interface.
    ///
    /// The slot has to be closed first.
    SlotInUse,

    /// A USB I/O error was encountered.
    ///
    /// This usually indicates that there is a permission problem, that a driver or another
    /// application is using the device, or that the device was unplugged.
    Usb,

    /// Multiple matching devices were found.
    MultipleDevicesFound,

    /// No matching device was found.
    NoDeviceFound,

    /// Other errors that don't fit the other variants.
    Other,
}

impl Error {
    pub(crate) fn new(
        kind: ErrorKind,
        inner: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            inner: Some(inner.into()),
        }
    }

    pub(crate) fn usb(inner: rusb::Error) -> Self {
        Self {
            kind: ErrorKind::Usb,
            inner: Some(Box::new(inner)),
        }
    }

    pub(crate) fn other(inner: impl Into<Box<dyn error::Error + Send + Sync>>) -> Self {
        Self::new(ErrorKind::Other, inner)
    }

    pub(crate) fn from_kind(kind: ErrorKind) -> Self {
        Self { kind, inner: None }
    }

    /// Returns the `ErrorKind` most closely describing this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.kind {
            ErrorKind::DeviceNotReady => "device not ready",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::MalformedDescriptor => "malformed interface descriptor",
            ErrorKind::DuplicateEndpointRole => "both endpoints have the same direction",
            ErrorKind::EndpointOpenFailed => "failed to open endpoint",
            ErrorKind::EndpointBusy => "endpoint busy",
            ErrorKind::TransferRejected => "transfer rejected by transport",
            ErrorKind::SlotInUse => "slot already has a bound interface",
            ErrorKind::Usb => "USB error",
            ErrorKind::MultipleDevicesFound => "multiple matching devices found",
            ErrorKind::NoDeviceFound => "no matching devices found",
            ErrorKind::Other => "other error",
        };

        match &self.inner {
            Some(inner) => write!(f, "{}: {}", msg, inner),
            None => f.write_str(msg),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.inner.as_ref().map(|e| &**e as &dyn error::Error)
    }
}
