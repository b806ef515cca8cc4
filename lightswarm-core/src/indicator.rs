//! Indicator slot allocation

use crate::types::{DeviceId, IndicatorSlot};
use std::collections::{BTreeMap, VecDeque};
use tracing::{info, warn};

/// Hands out a fixed pool of indicator slots, first come first served.
///
/// A device keeps its slot until `reset`, even after it goes silent.
#[derive(Debug)]
pub struct IndicatorAllocator {
    capacity: usize,
    free: VecDeque<IndicatorSlot>,
    assigned: BTreeMap<DeviceId, IndicatorSlot>,
    /// Devices already reported as left without a slot
    unassigned: Vec<DeviceId>,
}

impl IndicatorAllocator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(u8::MAX as usize + 1);
        Self {
            capacity,
            free: Self::full_pool(capacity),
            assigned: BTreeMap::new(),
            unassigned: Vec::new(),
        }
    }

    fn full_pool(capacity: usize) -> VecDeque<IndicatorSlot> {
        (0..capacity).map(|i| IndicatorSlot(i as u8)).collect()
    }

    /// Slot for `id`, allocating the next free one on first sight.
    /// `None` means the pool is exhausted.
    pub fn assign(&mut self, id: DeviceId) -> Option<IndicatorSlot> {
        if let Some(slot) = self.assigned.get(&id) {
            return Some(*slot);
        }

        match self.free.pop_front() {
            Some(slot) => {
                self.assigned.insert(id, slot);
                info!("Indicator: Assigned {} to device {}", slot, id);
                Some(slot)
            }
            None => {
                if !self.unassigned.contains(&id) {
                    self.unassigned.push(id);
                    warn!(
                        "Indicator: Pool exhausted ({} slots), device {} has no indicator",
                        self.capacity, id
                    );
                }
                None
            }
        }
    }

    pub fn slot_of(&self, id: DeviceId) -> Option<IndicatorSlot> {
        self.assigned.get(&id).copied()
    }

    pub fn assignments(&self) -> impl Iterator<Item = (DeviceId, IndicatorSlot)> + '_ {
        self.assigned.iter().map(|(id, slot)| (*id, *slot))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return every slot to the pool
    pub fn reset(&mut self) {
        self.assigned.clear();
        self.unassigned.clear();
        self.free = Self::full_pool(self.capacity);
    }
}
