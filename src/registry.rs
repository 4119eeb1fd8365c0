//! Per-slot interface records.

use bitflags::bitflags;

use crate::descriptor::Direction;

bitflags! {
    /// Endpoints of a slot that currently have a transfer in flight.
    pub(crate) struct InFlight: u8 {
        const IN = 1;
        const OUT = 2;
    }
}

impl From<Direction> for InFlight {
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::In => InFlight::IN,
            Direction::Out => InFlight::OUT,
        }
    }
}

/// The interface bound to a device slot.
///
/// An all-zero record means that nothing is bound.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Record {
    vendor_id: u16,
    product_id: u16,
    endpoint_in: u8,
    endpoint_out: u8,
}

impl Record {
    pub(crate) fn new(vendor_id: u16, product_id: u16, endpoint_in: u8, endpoint_out: u8) -> Self {
        Self {
            vendor_id,
            product_id,
            endpoint_in,
            endpoint_out,
        }
    }

    /// USB Vendor ID of the device the interface was bound for.
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// USB Product ID of the device the interface was bound for.
    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// Address of the bulk IN endpoint, or 0 if unbound.
    pub fn endpoint_in(&self) -> u8 {
        self.endpoint_in
    }

    /// Address of the bulk OUT endpoint, or 0 if unbound.
    pub fn endpoint_out(&self) -> u8 {
        self.endpoint_out
    }

    pub fn endpoint(&self, dir: Direction) -> u8 {
        match dir {
            Direction::In => self.endpoint_in,
            Direction::Out => self.endpoint_out,
        }
    }

    /// Returns whether both endpoints are bound.
    pub fn is_bound(&self) -> bool {
        self.endpoint_in != 0 && self.endpoint_out != 0
    }

    /// Returns whether both endpoints are bound and the record belongs to `vendor_id:product_id`.
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.is_bound() && self.vendor_id == vendor_id && self.product_id == product_id
    }
}

/// Lifecycle state of a slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// No interface is bound.
    Unmounted,
    /// Endpoints are bound, but the stack has not finished configuring the interface yet.
    Open,
    /// The interface is configured and idle.
    Configured,
    /// At least one accepted transfer has not reported completion yet.
    Transferring,
}

#[derive(Debug, Copy, Clone, Default)]
pub(crate) struct Entry {
    pub(crate) record: Record,
    pub(crate) configured: bool,
    pub(crate) in_flight: InFlight,
}

impl Default for InFlight {
    fn default() -> Self {
        InFlight::empty()
    }
}

impl Entry {
    fn state(&self) -> SlotState {
        if !self.record.is_bound() {
            SlotState::Unmounted
        } else if !self.in_flight.is_empty() {
            SlotState::Transferring
        } else if self.configured {
            SlotState::Configured
        } else {
            SlotState::Open
        }
    }
}

/// Fixed-size table of interface records, one per device slot.
///
/// Slots are numbered starting at 1, as USB device addresses are. Out-of-range slots behave like
/// slots that never had anything bound.
#[derive(Debug)]
pub struct Registry {
    entries: Box<[Entry]>,
}

impl Registry {
    /// Creates a registry with slots `1..=capacity`, all unmounted.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 or exceeds 255, the number of addressable slots.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity >= 1 && capacity <= usize::from(u8::MAX),
            "registry capacity {} out of range (1..=255)",
            capacity
        );

        Self {
            entries: vec![Entry::default(); capacity].into_boxed_slice(),
        }
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Returns the record of `slot`, or `None` if `slot` is out of range.
    pub fn lookup(&self, slot: u8) -> Option<Record> {
        self.entry(slot).map(|e| e.record)
    }

    /// Returns whether `slot` has a fully bound interface belonging to `vendor_id:product_id`.
    pub fn is_mounted(&self, slot: u8, vendor_id: u16, product_id: u16) -> bool {
        self.entry(slot)
            .map_or(false, |e| e.record.matches(vendor_id, product_id))
    }

    /// Returns the lifecycle state of `slot`, or `None` if `slot` is out of range.
    pub fn state(&self, slot: u8) -> Option<SlotState> {
        self.entry(slot).map(Entry::state)
    }

    /// Resets `slot` to the unmounted state.
    pub fn clear(&mut self, slot: u8) {
        if let Some(entry) = self.entry_mut(slot) {
            *entry = Entry::default();
        }
    }

    /// Resets every slot.
    pub fn clear_all(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = Entry::default();
        }
    }

    pub(crate) fn entry(&self, slot: u8) -> Option<&Entry> {
        let index = usize::from(slot).checked_sub(1)?;
        self.entries.get(index)
    }

    pub(crate) fn entry_mut(&mut self, slot: u8) -> Option<&mut Entry> {
        let index = usize::from(slot).checked_sub(1)?;
        self.entries.get_mut(index)
    }

    /// Binds `record` to an unmounted `slot`.
    pub(crate) fn populate(&mut self, slot: u8, record: Record) {
        if let Some(entry) = self.entry_mut(slot) {
            debug_assert!(!entry.record.is_bound(), "slot {} already bound", slot);
            *entry = Entry {
                record,
                ..Entry::default()
            };
        }
    }
}
