//! Latest known state per reporting device

use crate::types::{DeviceId, Observation, Reading, Stamp};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Last message received from a device
#[derive(Debug, Clone, Copy)]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub reading: Reading,
    pub last_seen: Stamp,
    pub addr: IpAddr,
}

/// Device table, keyed by reported identity
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for `id`. Readings outside the
    /// nominal range are stored as-is.
    pub fn record_reading(&mut self, id: DeviceId, reading: Reading, time: Stamp, addr: IpAddr) {
        self.devices.insert(
            id,
            DeviceRecord {
                device_id: id,
                reading,
                last_seen: time,
                addr,
            },
        );
    }

    /// Record a received observation
    pub fn record(&mut self, obs: &Observation) {
        self.record_reading(obs.device_id, obs.reading, obs.stamp, obs.addr);
    }

    pub fn get(&self, id: DeviceId) -> Option<&DeviceRecord> {
        self.devices.get(&id)
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }
}
