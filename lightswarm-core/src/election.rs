//! Master election.
//!
//! Every reading is a bid for mastership. With the default policy the most
//! recent reporter always wins: a single message is enough to take over, so
//! a noisy device can cause rapid churn and the accountant sees many short
//! intervals. `MinimumHold` is available as a tunable for deployments that
//! need damping; it is never applied implicitly.

use crate::accounting::TimeAccountant;
use crate::registry::DeviceRegistry;
use crate::types::{DeviceId, Observation};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How a reporting device challenges the current master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElectionPolicy {
    /// Any reading from a different device takes over immediately
    #[default]
    MostRecentReporter,
    /// A challenger takes over only after the master held for this long
    MinimumHold(Duration),
}

/// Tracks the current master and applies the election policy
#[derive(Debug, Default)]
pub struct MasterElector {
    policy: ElectionPolicy,
    current: Option<DeviceId>,
    /// When the current master took over
    held_since: Option<Instant>,
    /// Master changes since the last reset
    changes: u64,
}

impl MasterElector {
    pub fn new(policy: ElectionPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn current(&self) -> Option<DeviceId> {
        self.current
    }

    pub fn policy(&self) -> ElectionPolicy {
        self.policy
    }

    pub fn change_count(&self) -> u64 {
        self.changes
    }

    /// Whether `reporter` would become master at `now`
    pub fn should_take_over(&self, reporter: DeviceId, now: Instant) -> bool {
        match self.current {
            None => true,
            Some(master) if master == reporter => false,
            Some(_) => match self.policy {
                ElectionPolicy::MostRecentReporter => true,
                ElectionPolicy::MinimumHold(min) => self
                    .held_since
                    .map(|since| now.saturating_duration_since(since) >= min)
                    .unwrap_or(true),
            },
        }
    }

    /// Record the reading and elect. Returns true if mastership changed.
    pub fn on_reading(
        &mut self,
        obs: &Observation,
        registry: &mut DeviceRegistry,
        accountant: &mut TimeAccountant,
    ) -> bool {
        registry.record(obs);

        let now = obs.stamp.at;
        if !self.should_take_over(obs.device_id, now) {
            debug!(
                "Election: Device {} reading {} (master {:?})",
                obs.device_id, obs.reading, self.current
            );
            return false;
        }

        let old = self.current.replace(obs.device_id);
        self.held_since = Some(now);
        accountant.switch_master(obs.device_id, now);

        // First master of a session is an assignment, not a change
        if old.is_some() {
            self.changes += 1;
        }

        info!("Election: Master changed from {:?} to {}", old, obs.device_id);
        true
    }

    /// Forget the master; the policy is kept
    pub fn reset(&mut self) {
        self.current = None;
        self.held_since = None;
        self.changes = 0;
    }
}
