//! Property tests for master election and time accounting
//!
//! Tests invariants for:
//! - Single reporter: no master change after the first assignment
//! - Alternating reporters: projected total equals elapsed time
//! - Snapshots never mutate accounts

use lightswarm_core::accounting::TimeAccountant;
use lightswarm_core::state::SwarmState;
use lightswarm_core::types::{DeviceId, Observation, Stamp};
use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

// ============================================================================
// Strategies
// ============================================================================

fn device_id() -> impl Strategy<Value = DeviceId> {
    0u32..10_000u32
}

fn two_devices() -> impl Strategy<Value = (DeviceId, DeviceId)> {
    (0u32..5_000u32, 5_000u32..10_000u32)
}

/// Gaps between consecutive readings, in milliseconds
fn gaps() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..5_000u64, 1..60)
}

fn reading(id: DeviceId, value: i32, stamp: Stamp) -> Observation {
    Observation {
        device_id: id,
        reading: value,
        addr: IpAddr::V4(Ipv4Addr::new(10, 0, (id >> 8) as u8, id as u8)),
        stamp,
    }
}

// ============================================================================
// Election Property Tests
// ============================================================================

proptest! {
    /// CORE INVARIANT: one reporter never causes a master change
    #[test]
    fn single_reporter_never_changes_master(
        id in device_id(),
        values in prop::collection::vec(0i32..1024i32, 1..50),
        gap_ms in 0u64..2_000u64
    ) {
        let mut state = SwarmState::default();
        let t0 = Stamp::now();

        for (i, value) in values.iter().enumerate() {
            let stamp = t0.after(Duration::from_millis(gap_ms * i as u64));
            let ingest = state.ingest(&reading(id, *value, stamp)).unwrap();
            prop_assert_eq!(ingest.master_changed, i == 0);
        }

        prop_assert_eq!(state.master_changes(), 0);
        prop_assert_eq!(state.current_master(), Some(id));
    }

    /// CORE INVARIANT: alternating masters lose and duplicate no time
    #[test]
    fn alternating_masters_sum_to_elapsed(
        (a, b) in two_devices(),
        gaps in gaps(),
        tail_ms in 0u64..5_000u64
    ) {
        let mut state = SwarmState::default();
        let t0 = Stamp::now();
        let mut elapsed = Duration::ZERO;

        state.ingest(&reading(a, 100, t0));
        for (i, gap) in gaps.iter().enumerate() {
            elapsed += Duration::from_millis(*gap);
            let id = if i % 2 == 0 { b } else { a };
            state.ingest(&reading(id, 100, t0.after(elapsed)));

            // Projected at the instant of the switch
            let total: f64 = state.snapshot(t0.after(elapsed).at).values().sum();
            prop_assert!((total - elapsed.as_secs_f64()).abs() < 1e-6);
        }

        // And at an arbitrary later instant
        let end = elapsed + Duration::from_millis(tail_ms);
        let total: f64 = state.snapshot(t0.after(end).at).values().sum();
        prop_assert!((total - end.as_secs_f64()).abs() < 1e-6);
    }

    /// Projected sum is non-decreasing over time within a session
    #[test]
    fn projected_sum_monotonic(
        ids in prop::collection::vec(0u32..4u32, 1..40),
        gaps in prop::collection::vec(0u64..3_000u64, 40)
    ) {
        let mut acc = TimeAccountant::new();
        let t0 = std::time::Instant::now();
        let mut now = t0;
        let mut last_total = 0.0;

        for (id, gap) in ids.iter().zip(gaps.iter()) {
            now += Duration::from_millis(*gap);
            acc.switch_master(*id, now);
            let total: f64 = acc.snapshot(now).values().sum();
            prop_assert!(total + 1e-9 >= last_total);
            last_total = total;
        }
    }

    /// Snapshots are pure views
    #[test]
    fn snapshot_does_not_mutate(
        id in device_id(),
        probes in prop::collection::vec(0u64..10_000u64, 1..20)
    ) {
        let mut acc = TimeAccountant::new();
        let t0 = std::time::Instant::now();
        acc.switch_master(id, t0);

        for probe in probes {
            let _ = acc.snapshot(t0 + Duration::from_millis(probe));
        }

        let account = acc.account(id).unwrap();
        prop_assert_eq!(account.cumulative, Duration::ZERO);
        prop_assert_eq!(account.open_since, Some(t0));
    }
}
