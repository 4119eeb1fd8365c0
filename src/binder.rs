//! Binding of a vendor interface's endpoints at mount time.

use crate::descriptor::{Direction, EndpointDescriptor, InterfaceDescriptor, TransferType};
use crate::registry::{Record, Registry};
use crate::transport::Transport;
use crate::{Error, ErrorKind, Result};

/// Number of endpoint descriptors following the interface descriptor.
const NUM_ENDPOINTS: usize = 2;

/// Validates the descriptor block at `descr`, opens both endpoints and records them in `slot`.
///
/// `descr` must start with the interface descriptor. Returns the number of Bytes making up the
/// interface and its endpoint descriptors. `slot` must be unmounted and in range; it is only
/// written to once every step succeeded.
pub(crate) fn bind<T: Transport>(
    transport: &mut T,
    registry: &mut Registry,
    slot: u8,
    descr: &[u8],
) -> Result<usize> {
    let intf = InterfaceDescriptor::parse(descr)?;
    if usize::from(intf.num_endpoints) != NUM_ENDPOINTS {
        log::warn!(
            "interface {} declares {} endpoints, expected {}",
            intf.interface_number,
            intf.num_endpoints,
            NUM_ENDPOINTS
        );
    }

    let mut consumed = usize::from(intf.length);
    let mut next_endpoint = || -> Result<EndpointDescriptor> {
        let ep = EndpointDescriptor::parse(&descr[consumed..])?;
        if ep.number() == 0 {
            return Err(Error::new(
                ErrorKind::MalformedDescriptor,
                format!("endpoint descriptor for control endpoint {:#04x}", ep.address),
            ));
        }
        if ep.transfer_type() != TransferType::Bulk {
            log::warn!(
                "endpoint {:#04x} is {:?}, expected bulk",
                ep.address,
                ep.transfer_type()
            );
        }
        consumed += usize::from(ep.length);
        Ok(ep)
    };
    let (a, b) = (next_endpoint()?, next_endpoint()?);

    let (ep_in, ep_out) = match (a.direction(), b.direction()) {
        (Direction::In, Direction::Out) => (a, b),
        (Direction::Out, Direction::In) => (b, a),
        (dir, _) => {
            return Err(Error::new(
                ErrorKind::DuplicateEndpointRole,
                format!(
                    "endpoints {:#04x} and {:#04x} are both {:?}",
                    a.address, b.address, dir
                ),
            ))
        }
    };

    let (vendor_id, product_id) = transport.device_identity(slot).ok_or_else(|| {
        Error::new(
            ErrorKind::DeviceNotReady,
            format!("no device identity for slot {}", slot),
        )
    })?;

    for ep in &[ep_in, ep_out] {
        if !transport.register_endpoint(slot, ep) {
            return Err(Error::new(
                ErrorKind::EndpointOpenFailed,
                format!("transport rejected endpoint {:#04x}", ep.address),
            ));
        }
    }

    registry.populate(
        slot,
        Record::new(vendor_id, product_id, ep_in.address, ep_out.address),
    );

    Ok(consumed)
}
