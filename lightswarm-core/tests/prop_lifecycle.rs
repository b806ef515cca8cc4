//! Property tests for the button debouncer
//!
//! Tests invariants for:
//! - Accepted presses are at least one debounce window apart
//! - A held button never auto-repeats

use lightswarm_core::lifecycle::Debouncer;
use proptest::prelude::*;
use std::time::{Duration, Instant};

const WINDOW_MS: u64 = 500;

// ============================================================================
// Strategies
// ============================================================================

/// Button samples: (level, milliseconds since previous sample)
fn samples() -> impl Strategy<Value = Vec<(bool, u64)>> {
    prop::collection::vec((any::<bool>(), 0u64..400u64), 1..200)
}

proptest! {
    /// CORE INVARIANT: accepted presses respect the debounce window
    #[test]
    fn accepted_presses_are_spaced(samples in samples()) {
        let mut debouncer = Debouncer::new(Duration::from_millis(WINDOW_MS));
        let t0 = Instant::now();
        let mut now = t0;
        let mut accepted: Vec<Instant> = Vec::new();

        for (level, gap) in samples {
            now += Duration::from_millis(gap);
            if debouncer.sample(level, now) {
                accepted.push(now);
            }
        }

        for pair in accepted.windows(2) {
            prop_assert!(pair[1] - pair[0] >= Duration::from_millis(WINDOW_MS));
        }
    }

    /// Holding the button yields exactly one press
    #[test]
    fn held_button_fires_once(polls in 1usize..100usize, gap in 1u64..1_000u64) {
        let mut debouncer = Debouncer::new(Duration::from_millis(WINDOW_MS));
        let t0 = Instant::now();

        let fired = (0..polls)
            .filter(|i| debouncer.sample(true, t0 + Duration::from_millis(gap * *i as u64)))
            .count();
        prop_assert_eq!(fired, 1);
    }
}
