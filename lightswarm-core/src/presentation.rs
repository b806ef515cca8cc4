//! Read-only feed for the dashboard.
//!
//! Samples the coordinator once per interval through the public accessors
//! and keeps a short rolling history of (timestamp, reading, master). The
//! plotting front end consumes `DashboardSnapshot` and `ReadingHistory`;
//! nothing here mutates coordinator state.

use crate::state::SharedState;
use crate::types::{DeviceId, Reading, Stamp};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Point-in-time view of the swarm
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub timestamp: DateTime<Local>,
    /// Latest reading of the current master
    pub reading: Option<Reading>,
    pub master: Option<DeviceId>,
    /// Projected master seconds per device
    pub master_times: BTreeMap<DeviceId, f64>,
    pub active: bool,
    pub session: u64,
}

/// One plotted point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: DateTime<Local>,
    pub reading: Reading,
    pub master: DeviceId,
}

/// Bounded history of master readings for the current session
#[derive(Debug, Clone, Serialize)]
pub struct ReadingHistory {
    capacity: usize,
    session: u64,
    samples: VecDeque<Sample>,
}

impl ReadingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            session: 0,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Add the snapshot's master reading; history restarts when the session
    /// changes
    pub fn push(&mut self, snapshot: &DashboardSnapshot) {
        if snapshot.session != self.session {
            self.samples.clear();
            self.session = snapshot.session;
        }

        let (Some(master), Some(reading)) = (snapshot.master, snapshot.reading) else {
            return;
        };
        if !snapshot.active || self.capacity == 0 {
            return;
        }

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample {
            timestamp: snapshot.timestamp,
            reading,
            master,
        });
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Presentation task: sample, record, emit as a JSON debug trace
pub async fn run_presentation(
    state: SharedState,
    history: Arc<Mutex<ReadingHistory>>,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    while running.load(Ordering::SeqCst) {
        let snapshot = state.lock().dashboard_snapshot(Stamp::now());
        history.lock().push(&snapshot);

        match serde_json::to_string(&snapshot) {
            Ok(json) => debug!("Dashboard: {}", json),
            Err(e) => warn!("Dashboard: Failed to encode snapshot: {}", e),
        }

        sleep(interval).await;
    }
}
