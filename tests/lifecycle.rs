//! Drives the driver through the public API with an in-memory host stack.

use rvendor::descriptor::EndpointDescriptor;
use rvendor::{Completion, ErrorKind, SlotState, TransferResult, Transport, VendorHost};
use std::collections::{HashMap, HashSet, VecDeque};

/// Host stack that queues transfers and completes them on request.
#[derive(Default)]
struct FakeStack {
    identities: HashMap<u8, (u16, u16)>,
    opened: HashSet<(u8, u8)>,
    claimed: HashSet<(u8, u8)>,
    pending: VecDeque<Completion>,
    config_complete: Vec<(u8, u8)>,
}

impl FakeStack {
    fn with_device(slot: u8, vid: u16, pid: u16) -> Self {
        let mut stack = Self::default();
        stack.identities.insert(slot, (vid, pid));
        stack
    }

    /// Finishes the oldest transfer, echoing OUT lengths and filling IN buffers with `0x5A`.
    fn finish_next(&mut self) -> Option<Completion> {
        let mut c = self.pending.pop_front()?;
        self.claimed.remove(&(c.slot, c.endpoint));
        if c.endpoint & 0x80 != 0 {
            for b in c.buffer.iter_mut() {
                *b = 0x5A;
            }
        }
        c.bytes_transferred = c.buffer.len() as u32;
        Some(c)
    }
}

impl Transport for FakeStack {
    fn device_identity(&self, slot: u8) -> Option<(u16, u16)> {
        self.identities.get(&slot).copied()
    }

    fn register_endpoint(&mut self, slot: u8, endpoint: &EndpointDescriptor) -> bool {
        self.opened.insert((slot, endpoint.address));
        true
    }

    fn claim_endpoint(&mut self, slot: u8, endpoint: u8) -> bool {
        self.opened.contains(&(slot, endpoint)) && self.claimed.insert((slot, endpoint))
    }

    fn release_endpoint(&mut self, slot: u8, endpoint: u8) {
        self.claimed.remove(&(slot, endpoint));
        self.pending
            .retain(|c| !(c.slot == slot && c.endpoint == endpoint));
    }

    fn submit_transfer(&mut self, slot: u8, endpoint: u8, buffer: Vec<u8>) -> bool {
        self.pending.push_back(Completion {
            slot,
            endpoint,
            result: TransferResult::Success,
            bytes_transferred: 0,
            buffer,
        });
        true
    }

    fn set_config_complete(&mut self, slot: u8, interface_number: u8) -> bool {
        self.config_complete.push((slot, interface_number));
        true
    }
}

const VID: u16 = 0x1234;
const PID: u16 = 0x5678;
const INTERFACE_SIZE: usize = 9;
const ENDPOINT_SIZE: usize = 7;

fn interface(ep_a: u8, ep_b: u8) -> Vec<u8> {
    let mut v = vec![9, 4, 0, 0, 2, 0xFF, 0x00, 0x00, 0];
    v.extend_from_slice(&[7, 5, ep_a, 0x02, 0x00, 0x02, 0]);
    v.extend_from_slice(&[7, 5, ep_b, 0x02, 0x00, 0x02, 0]);
    v
}

fn host() -> VendorHost<FakeStack> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut host = VendorHost::new(FakeStack::with_device(1, VID, PID));
    host.init();
    host
}

#[test]
fn nothing_mounted_after_init() {
    let host = host();
    for slot in 0..=10 {
        for &(vid, pid) in &[(0, 0), (VID, PID), (0xFFFF, 0xFFFF)] {
            assert!(!host.is_mounted(slot, vid, pid));
        }
    }
}

#[test]
fn mount_scenario() {
    let mut host = host();
    let consumed = host.open(1, &interface(0x81, 0x02)).unwrap();
    assert_eq!(consumed, INTERFACE_SIZE + 2 * ENDPOINT_SIZE);

    assert!(host.is_mounted(1, VID, PID));
    assert!(!host.is_mounted(1, 0x0000, 0x0000));
    assert!(!host.is_mounted(1, VID, 0x0000));
    assert!(!host.is_mounted(2, VID, PID));

    let rec = host.registry().lookup(1).unwrap();
    assert_eq!((rec.endpoint_in(), rec.endpoint_out()), (0x81, 0x02));
    assert_eq!((rec.vendor_id(), rec.product_id()), (VID, PID));
}

#[test]
fn consumed_length_leaves_following_descriptors() {
    let mut host = host();
    let mut config = interface(0x01, 0x82);
    let next = config.len();
    config.extend_from_slice(&[9, 4, 1, 0, 1, 0x03, 0, 0, 0]);

    let consumed = host.open(1, &config).unwrap();
    assert_eq!(consumed, next);
    assert_eq!(config[consumed + 1], 4);
}

#[test]
fn malformed_second_descriptor() {
    let mut host = host();
    let mut descr = interface(0x81, 0x02);
    descr[INTERFACE_SIZE + ENDPOINT_SIZE + 1] = 0x25;

    let err = host.open(1, &descr).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDescriptor);
    assert!(!host.is_mounted(1, VID, PID));
}

#[test]
fn duplicate_direction() {
    let mut host = host();
    let err = host.open(1, &interface(0x81, 0x83)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateEndpointRole);
    let err = host.open(1, &interface(0x02, 0x03)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateEndpointRole);
    assert_eq!(host.state(1), Some(SlotState::Unmounted));
}

#[test]
fn transfers_need_a_mount() {
    let mut host = host();
    let err = host.read(1, VID, PID, vec![0; 16]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceNotReady);
    let err = host.write(1, VID, PID, vec![0; 16]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceNotReady);

    host.open(1, &interface(0x81, 0x02)).unwrap();
    host.close(1);

    let err = host.read(1, VID, PID, vec![0; 16]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceNotReady);
    let err = host.write(1, VID, PID, vec![0; 16]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceNotReady);
}

#[test]
fn empty_buffers_rejected_when_mounted() {
    let mut host = host();
    host.open(1, &interface(0x81, 0x02)).unwrap();

    let err = host.read(1, VID, PID, Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = host.write(1, VID, PID, Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn double_close() {
    let mut host = host();
    host.open(1, &interface(0x81, 0x02)).unwrap();
    host.close(1);
    host.close(1);
    assert_eq!(host.state(1), Some(SlotState::Unmounted));
    assert!(!host.is_mounted(1, VID, PID));
}

#[test]
fn single_write_in_flight() {
    let mut host = host();
    host.open(1, &interface(0x81, 0x02)).unwrap();

    assert!(host.write(1, VID, PID, vec![7; 10]).is_ok());
    let err = host.write(1, VID, PID, vec![7; 10]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EndpointBusy);

    let c = host.transport_mut().finish_next().unwrap();
    assert_eq!((c.endpoint, c.bytes_transferred), (0x02, 10));
    assert!(host.on_transfer_complete(c.slot, c.endpoint, c.result, c.bytes_transferred));

    assert!(host.write(1, VID, PID, vec![7; 10]).is_ok());
}

#[test]
fn full_session() {
    let mut host = host();
    assert_eq!(host.open(1, &interface(0x02, 0x81)).unwrap(), 23);
    assert_eq!(host.state(1), Some(SlotState::Open));
    assert!(host.set_config(1, 0));
    assert_eq!(host.transport().config_complete, [(1, 0)]);
    assert_eq!(host.state(1), Some(SlotState::Configured));

    host.read(1, VID, PID, vec![0; 32]).unwrap();
    assert_eq!(host.state(1), Some(SlotState::Transferring));

    let c = host.transport_mut().finish_next().unwrap();
    assert_eq!(c.data(), &[0x5A; 32][..]);
    assert!(host.on_transfer_complete(c.slot, c.endpoint, TransferResult::Failed, 0));
    assert_eq!(host.state(1), Some(SlotState::Configured));

    // A transfer left running is abandoned when the device goes away.
    host.write(1, VID, PID, b"bye".to_vec()).unwrap();
    host.close(1);
    assert!(host.transport().claimed.is_empty());
    assert!(host.transport().pending.is_empty());
    assert!(!host.on_transfer_complete(1, 0x02, TransferResult::Success, 3));
}

#[test]
fn slot_reuse_by_other_device() {
    let mut host = host();
    host.open(1, &interface(0x81, 0x02)).unwrap();
    host.close(1);

    host.transport_mut().identities.insert(1, (0xCAFE, 0x0001));
    host.open(1, &interface(0x83, 0x04)).unwrap();

    let err = host.write(1, VID, PID, vec![1]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceNotReady);
    host.write(1, 0xCAFE, 0x0001, vec![1]).unwrap();
    assert_eq!(host.transport().pending[0].endpoint, 0x04);
}

#[test]
fn independent_slots() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut stack = FakeStack::with_device(1, VID, PID);
    stack.identities.insert(3, (VID, PID));
    let mut host = VendorHost::with_capacity(stack, 3);

    host.open(1, &interface(0x81, 0x02)).unwrap();
    host.open(3, &interface(0x81, 0x02)).unwrap();
    host.write(1, VID, PID, vec![0; 4]).unwrap();
    host.write(3, VID, PID, vec![0; 4]).unwrap();

    host.close(1);
    assert!(host.is_mounted(3, VID, PID));
    assert_eq!(host.state(3), Some(SlotState::Transferring));
    assert_eq!(host.transport().pending.len(), 1);
}

#[test]
fn reinit_releases_borrowed_stack() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut stack = FakeStack::with_device(1, VID, PID);

    {
        let mut host = VendorHost::new(&mut stack);
        host.init();
        host.open(1, &interface(0x81, 0x02)).unwrap();
        host.read(1, VID, PID, vec![0; 8]).unwrap();

        host.init();
        assert!(!host.is_mounted(1, VID, PID));
        assert_eq!(host.state(1), Some(SlotState::Unmounted));

        host.open(1, &interface(0x81, 0x02)).unwrap();
        host.read(1, VID, PID, vec![0; 8]).unwrap();
    }

    assert_eq!(stack.pending.len(), 1);
    assert_eq!(stack.claimed.len(), 1);
}
