//! Master time accounting.
//!
//! Tracks how long each device has held mastership. Only one device has an
//! open interval at a time; its running time is added to the cumulative
//! total when the interval closes. Snapshots project the open interval to
//! the requested instant without persisting it, so a later close never
//! counts the same span twice.

use crate::types::DeviceId;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::info;

/// Per-device master time
#[derive(Debug, Clone, Default)]
pub struct MasterAccount {
    /// Closed time as master
    pub cumulative: Duration,
    /// Start of the current interval, set only for the holder
    pub open_since: Option<Instant>,
}

impl MasterAccount {
    /// Cumulative time with any open interval projected to `now`
    pub fn projected(&self, now: Instant) -> Duration {
        match self.open_since {
            Some(start) => self.cumulative + now.saturating_duration_since(start),
            None => self.cumulative,
        }
    }
}

/// Result of an effective master switch
#[derive(Debug, Clone, PartialEq)]
pub struct MasterSwitch {
    /// Previous holder and the span that was just closed
    pub closed: Option<(DeviceId, Duration)>,
    /// New holder
    pub opened: DeviceId,
}

/// Cumulative master time for every device seen this session
#[derive(Debug, Default)]
pub struct TimeAccountant {
    accounts: BTreeMap<DeviceId, MasterAccount>,
    holder: Option<DeviceId>,
}

impl TimeAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device holding the open interval
    pub fn holder(&self) -> Option<DeviceId> {
        self.holder
    }

    /// Close the current interval (if any) and open one for `new_id`.
    ///
    /// Returns `None` when `new_id` already holds the open interval.
    pub fn switch_master(&mut self, new_id: DeviceId, now: Instant) -> Option<MasterSwitch> {
        if self.holder == Some(new_id) {
            return None;
        }

        let closed = self.holder.take().and_then(|old_id| {
            let account = self.accounts.get_mut(&old_id)?;
            let start = account.open_since.take()?;
            let delta = now.saturating_duration_since(start);
            account.cumulative += delta;
            info!(
                "Accounting: Master {} -> {} (closed {:.2}s, total {:.2}s)",
                old_id,
                new_id,
                delta.as_secs_f64(),
                account.cumulative.as_secs_f64()
            );
            Some((old_id, delta))
        });

        let account = self.accounts.entry(new_id).or_default();
        account.open_since = Some(now);
        self.holder = Some(new_id);

        Some(MasterSwitch {
            closed,
            opened: new_id,
        })
    }

    /// Seconds as master per device, open interval projected to `now`
    pub fn snapshot(&self, now: Instant) -> BTreeMap<DeviceId, f64> {
        self.accounts
            .iter()
            .map(|(id, account)| (*id, account.projected(now).as_secs_f64()))
            .collect()
    }

    /// Projected seconds for one device (0 if never master)
    pub fn projected(&self, id: DeviceId, now: Instant) -> f64 {
        self.accounts
            .get(&id)
            .map(|account| account.projected(now).as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn account(&self, id: DeviceId) -> Option<&MasterAccount> {
        self.accounts.get(&id)
    }

    pub fn reset(&mut self) {
        self.accounts.clear();
        self.holder = None;
    }
}
