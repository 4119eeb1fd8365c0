//! Scripted transport for unit tests.

use crate::descriptor::EndpointDescriptor;
use crate::transport::Transport;

#[derive(Debug, Default)]
pub(crate) struct TestTransport {
    /// Slot of the only attached device and its VID/PID.
    pub device: Option<(u8, u16, u16)>,
    pub registered: Vec<u8>,
    pub claimed: Vec<(u8, u8)>,
    pub submitted: Vec<(u8, u8, Vec<u8>)>,
    pub configured: Vec<(u8, u8)>,
    pub reject_register: Option<u8>,
    pub reject_submit: bool,
}

impl TestTransport {
    pub fn new(slot: u8, vendor_id: u16, product_id: u16) -> Self {
        Self {
            device: Some((slot, vendor_id, product_id)),
            ..Self::default()
        }
    }

    /// Simulates the stack finishing a transfer: drops the claim.
    pub fn finish(&mut self, slot: u8, endpoint: u8) {
        self.claimed.retain(|&c| c != (slot, endpoint));
    }
}

impl Transport for TestTransport {
    fn device_identity(&self, slot: u8) -> Option<(u16, u16)> {
        match self.device {
            Some((s, vid, pid)) if s == slot => Some((vid, pid)),
            _ => None,
        }
    }

    fn register_endpoint(&mut self, _slot: u8, endpoint: &EndpointDescriptor) -> bool {
        if self.reject_register == Some(endpoint.address) {
            return false;
        }
        self.registered.push(endpoint.address);
        true
    }

    fn claim_endpoint(&mut self, slot: u8, endpoint: u8) -> bool {
        if self.claimed.contains(&(slot, endpoint)) {
            return false;
        }
        self.claimed.push((slot, endpoint));
        true
    }

    fn release_endpoint(&mut self, slot: u8, endpoint: u8) {
        self.finish(slot, endpoint);
    }

    fn submit_transfer(&mut self, slot: u8, endpoint: u8, buffer: Vec<u8>) -> bool {
        if self.reject_submit {
            return false;
        }
        self.submitted.push((slot, endpoint, buffer));
        true
    }

    fn set_config_complete(&mut self, slot: u8, interface_number: u8) -> bool {
        self.configured.push((slot, interface_number));
        true
    }
}
