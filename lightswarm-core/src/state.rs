//! Process-wide coordinator state.
//!
//! `SwarmState` owns the registry, accountant, allocator and elector. Tasks
//! share it as a `SharedState` handle and mutate it only through the methods
//! below, each called with the lock held for the duration of the call and
//! never across I/O.

use crate::accounting::TimeAccountant;
use crate::blink::{flash_delay, BlinkPlan};
use crate::config::CoordinatorConfig;
use crate::election::{ElectionPolicy, MasterElector};
use crate::indicator::IndicatorAllocator;
use crate::presentation::DashboardSnapshot;
use crate::registry::{DeviceRecord, DeviceRegistry};
use crate::session_log::{ReadingRecord, ResetSummary, SummaryEntry};
use crate::types::{DeviceId, IndicatorSlot, Observation, Stamp};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub type SharedState = Arc<Mutex<SwarmState>>;

/// Outcome of one accepted reading
#[derive(Debug, Clone, PartialEq)]
pub struct Ingest {
    /// Mastership moved to the reporting device
    pub master_changed: bool,
    /// Line to append to the session log
    pub record: ReadingRecord,
}

/// Aggregate of all tracking state
#[derive(Debug)]
pub struct SwarmState {
    registry: DeviceRegistry,
    accountant: TimeAccountant,
    indicators: IndicatorAllocator,
    elector: MasterElector,
    active: bool,
    /// Generation of the session log records belong to
    session: u64,
}

impl SwarmState {
    pub fn new(slot_count: usize, policy: ElectionPolicy) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            accountant: TimeAccountant::new(),
            indicators: IndicatorAllocator::new(slot_count),
            elector: MasterElector::new(policy),
            active: true,
            session: 0,
        }
    }

    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self::new(config.slot_count, config.election)
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Start a new log generation; returns the new generation
    pub fn next_session(&mut self) -> u64 {
        self.session += 1;
        self.session
    }

    pub fn current_master(&self) -> Option<DeviceId> {
        self.elector.current()
    }

    pub fn master_changes(&self) -> u64 {
        self.elector.change_count()
    }

    pub fn get(&self, id: DeviceId) -> Option<&DeviceRecord> {
        self.registry.get(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.registry.iter()
    }

    pub fn slot_of(&self, id: DeviceId) -> Option<IndicatorSlot> {
        self.indicators.slot_of(id)
    }

    /// Projected master seconds per device
    pub fn snapshot(&self, now: Instant) -> BTreeMap<DeviceId, f64> {
        self.accountant.snapshot(now)
    }

    /// Election step for one reading. No-op returning false while paused.
    pub fn on_reading(&mut self, obs: &Observation) -> bool {
        if !self.active {
            return false;
        }
        self.elector
            .on_reading(obs, &mut self.registry, &mut self.accountant)
    }

    /// Full ingest step: slot assignment, election, and the log record to
    /// write once the lock is released. `None` while paused.
    pub fn ingest(&mut self, obs: &Observation) -> Option<Ingest> {
        if !self.active {
            debug!("State: Paused, dropping reading from device {}", obs.device_id);
            return None;
        }

        self.indicators.assign(obs.device_id);
        let master_changed = self.on_reading(obs);

        Some(Ingest {
            master_changed,
            record: ReadingRecord {
                session: self.session,
                wall: obs.stamp.wall,
                device_id: obs.device_id,
                addr: obs.addr,
                reading: obs.reading,
                master_seconds: self.accountant.projected(obs.device_id, obs.stamp.at),
            },
        })
    }

    /// What the indicator task should blink right now
    pub fn blink_plan(&self) -> Option<BlinkPlan> {
        if !self.active {
            return None;
        }
        let master = self.elector.current()?;
        let slot = self.indicators.slot_of(master)?;
        let record = self.registry.get(master)?;
        Some(BlinkPlan {
            slot,
            delay: flash_delay(record.reading),
        })
    }

    /// Final projected durations for the closing log block
    pub fn reset_summary(&self, stamp: Stamp) -> ResetSummary {
        let entries = self
            .accountant
            .snapshot(stamp.at)
            .into_iter()
            .map(|(device_id, seconds)| SummaryEntry {
                device_id,
                addr: self.registry.get(device_id).map(|r| r.addr),
                seconds,
            })
            .collect();

        ResetSummary {
            session: self.session,
            wall: stamp.wall,
            entries,
        }
    }

    /// Read-only view for the dashboard
    pub fn dashboard_snapshot(&self, stamp: Stamp) -> DashboardSnapshot {
        let master = self.elector.current();
        DashboardSnapshot {
            timestamp: stamp.wall,
            reading: master.and_then(|id| self.registry.get(id)).map(|r| r.reading),
            master,
            master_times: self.accountant.snapshot(stamp.at),
            active: self.active,
            session: self.session,
        }
    }

    /// Drop every device, account, slot and the current master
    pub fn clear_tracking(&mut self) {
        self.registry.clear();
        self.indicators.reset();
        self.accountant.reset();
        self.elector.reset();
    }
}

impl Default for SwarmState {
    fn default() -> Self {
        Self::from_config(&CoordinatorConfig::default())
    }
}
