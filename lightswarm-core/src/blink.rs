//! Blink timing for the master's indicator

use crate::hal::IndicatorDriver;
use crate::state::SharedState;
use crate::types::{IndicatorSlot, Reading, READING_MAX};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Shortest half-period, keeps the blink visible
pub const MIN_FLASH_DELAY_SECS: f64 = 0.1;

/// Half-period of the blink for a reading: brighter means faster.
///
/// The reading is clamped to the ADC range, so the result is always within
/// 100 ms..=1 s.
pub fn flash_delay(reading: Reading) -> Duration {
    let reading = reading.clamp(0, READING_MAX) as f64;
    let secs = (1.0 - (reading / READING_MAX as f64) * 0.9).max(MIN_FLASH_DELAY_SECS);
    Duration::from_secs_f64(secs)
}

/// One blink cycle for the current master
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkPlan {
    pub slot: IndicatorSlot,
    pub delay: Duration,
}

/// Drive every indicator low, logging failures
pub fn all_off(driver: &dyn IndicatorDriver) {
    for i in 0..driver.slot_count() {
        let slot = IndicatorSlot(i as u8);
        if let Err(e) = driver.set_indicator(slot, false) {
            warn!("Blink: Failed to clear {}: {}", slot, e);
        }
    }
}

/// Indicator task: blink the master's slot while active, hold everything
/// low while paused. Exits when `running` is cleared.
pub async fn run_blink_loop(
    state: SharedState,
    driver: Arc<dyn IndicatorDriver>,
    running: Arc<AtomicBool>,
    idle_tick: Duration,
) {
    info!("Blink: Indicator task started");

    while running.load(Ordering::SeqCst) {
        let (active, plan) = {
            let state = state.lock();
            (state.is_active(), state.blink_plan())
        };

        match plan {
            Some(plan) => {
                debug!("Blink: {} every {:?}", plan.slot, plan.delay);
                if let Err(e) = driver.set_indicator(plan.slot, true) {
                    warn!("Blink: Failed to set {}: {}", plan.slot, e);
                }
                sleep(plan.delay).await;
                if let Err(e) = driver.set_indicator(plan.slot, false) {
                    warn!("Blink: Failed to clear {}: {}", plan.slot, e);
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                sleep(plan.delay).await;
            }
            None if !active => all_off(driver.as_ref()),
            None => {}
        }

        sleep(idle_tick).await;
    }

    info!("Blink: Indicator task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockHal;
    use crate::state::SwarmState;
    use crate::types::{Observation, Stamp};
    use std::net::{IpAddr, Ipv4Addr};

    fn close(d: Duration, secs: f64) -> bool {
        (d.as_secs_f64() - secs).abs() < 1e-9
    }

    #[test]
    fn test_flash_delay_formula() {
        assert!(close(flash_delay(0), 1.0));
        assert!(close(flash_delay(1023), 0.1));
        assert!(close(flash_delay(511), 1.0 - (511.0 / 1023.0) * 0.9));
    }

    #[test]
    fn test_flash_delay_clamped() {
        assert!(close(flash_delay(-500), 1.0));
        assert!(close(flash_delay(5000), 0.1));
    }

    #[test]
    fn test_brighter_is_faster() {
        assert!(flash_delay(900) < flash_delay(200));
    }

    #[tokio::test]
    async fn test_paused_forces_all_off() {
        let hal = Arc::new(MockHal::new(3));
        hal.set_indicator(IndicatorSlot(0), true).unwrap();
        hal.set_indicator(IndicatorSlot(2), true).unwrap();

        let state = SwarmState::default().shared();
        state.lock().set_active(false);
        let running = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(run_blink_loop(
            state,
            hal.clone(),
            running.clone(),
            Duration::from_millis(10),
        ));
        sleep(Duration::from_millis(50)).await;
        running.store(false, Ordering::SeqCst);
        task.await.unwrap();

        assert_eq!(hal.levels(), vec![false, false, false]);
    }

    #[tokio::test]
    async fn test_master_slot_toggles() {
        let hal = Arc::new(MockHal::new(3));
        let state = SwarmState::default().shared();
        state.lock().ingest(&Observation {
            device_id: 9,
            reading: 1023,
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            stamp: Stamp::now(),
        });
        let running = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(run_blink_loop(
            state,
            hal.clone(),
            running.clone(),
            Duration::from_millis(10),
        ));
        sleep(Duration::from_millis(350)).await;
        running.store(false, Ordering::SeqCst);
        task.await.unwrap();

        // Each cycle drives the slot high then low
        assert!(hal.writes_to(IndicatorSlot(0)) >= 2);
        assert_eq!(hal.writes_to(IndicatorSlot(1)), 0);
        assert!(!hal.levels()[0]);
    }
}
