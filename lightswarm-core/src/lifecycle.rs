//! Reset / activate lifecycle.
//!
//! State machine driven by the push button:
//! - `Active --press--> Paused`: indicators off, RESET broadcast, summary
//!   written, log rotated, all tracking cleared
//! - `Paused --press--> Active`: tracking cleared again, ACTIVATE broadcast,
//!   readings accepted
//!
//! Presses are edge-triggered and debounced: a press within the debounce
//! window of the previous accepted one is ignored.

use crate::blink::all_off;
use crate::error::SwarmError;
use crate::hal::{ControlInput, IndicatorDriver};
use crate::session_log::SessionLogger;
use crate::state::SharedState;
use crate::types::{ControlSignal, Stamp};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

/// Coordinator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Active,
    Paused,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Active => write!(f, "ACTIVE"),
            Phase::Paused => write!(f, "PAUSED"),
        }
    }
}

/// Rising-edge detector with a minimum spacing between accepted presses
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
    was_pressed: bool,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
            was_pressed: false,
        }
    }

    /// Feed one level sample; true if it is an accepted press.
    ///
    /// A press seen inside the window stays pending: if the button is still
    /// down once the window has passed, it is accepted then. An accepted
    /// press is latched until release.
    pub fn sample(&mut self, pressed: bool, now: Instant) -> bool {
        if !pressed {
            self.was_pressed = false;
            return false;
        }
        if self.was_pressed {
            return false;
        }

        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.window {
                trace!("Lifecycle: Press inside debounce window");
                return false;
            }
        }

        self.was_pressed = true;
        self.last_accepted = Some(now);
        true
    }
}

/// Drives global pause/activate transitions across all components
pub struct LifecycleController {
    state: SharedState,
    indicators: Arc<dyn IndicatorDriver>,
    logger: Arc<SessionLogger>,
    control_tx: mpsc::Sender<ControlSignal>,
    debouncer: Debouncer,
}

impl LifecycleController {
    pub fn new(
        state: SharedState,
        indicators: Arc<dyn IndicatorDriver>,
        logger: Arc<SessionLogger>,
        control_tx: mpsc::Sender<ControlSignal>,
        debounce: Duration,
    ) -> Self {
        Self {
            state,
            indicators,
            logger,
            control_tx,
            debouncer: Debouncer::new(debounce),
        }
    }

    pub fn phase(&self) -> Phase {
        if self.state.lock().is_active() {
            Phase::Active
        } else {
            Phase::Paused
        }
    }

    /// Feed a button sample. Returns the new phase if a transition happened.
    pub async fn on_button(&mut self, pressed: bool, now: Instant) -> Option<Phase> {
        if !self.debouncer.sample(pressed, now) {
            return None;
        }
        Some(self.toggle().await)
    }

    /// Flip between the two phases
    pub async fn toggle(&mut self) -> Phase {
        match self.phase() {
            Phase::Active => {
                info!("Lifecycle: Button pressed, resetting system");
                self.pause().await
            }
            Phase::Paused => {
                info!("Lifecycle: Button pressed, activating system");
                self.activate().await
            }
        }
    }

    /// `Active -> Paused`. Transient failures are logged; the transition
    /// always completes.
    pub async fn pause(&mut self) -> Phase {
        let stamp = Stamp::now();

        // Stop ingestion before any I/O so nothing lands in the closing session
        let summary = {
            let mut state = self.state.lock();
            if !state.is_active() {
                return Phase::Paused;
            }
            state.set_active(false);
            state.reset_summary(stamp)
        };

        all_off(self.indicators.as_ref());
        self.signal(ControlSignal::Reset).await;

        if let Err(e) = self.logger.write_reset_summary(&summary) {
            warn!("Lifecycle: Failed to write reset summary: {}", e);
        }

        let session = {
            let mut state = self.state.lock();
            state.clear_tracking();
            state.next_session()
        };

        match self.logger.new_session(session, Stamp::now().wall) {
            Ok(path) => info!("Lifecycle: New session log {:?}", path),
            Err(e) => warn!("Lifecycle: Failed to rotate session log: {}", e),
        }

        info!("Lifecycle: System PAUSED, press button again to activate");
        Phase::Paused
    }

    /// `Paused -> Active`
    pub async fn activate(&mut self) -> Phase {
        {
            let mut state = self.state.lock();
            if state.is_active() {
                return Phase::Active;
            }
            state.clear_tracking();
            state.set_active(true);
        }

        self.signal(ControlSignal::Activate).await;
        info!("Lifecycle: System ACTIVE, starting fresh from zero");
        Phase::Active
    }

    /// Queue a control token for broadcast; a closed channel is logged only
    async fn signal(&self, signal: ControlSignal) {
        let sent = self
            .control_tx
            .send(signal)
            .await
            .map_err(|_| SwarmError::ControlChannelClosed);
        if let Err(e) = sent {
            warn!("Lifecycle: {} not sent: {}", signal, e);
        }
    }
}

/// Control-input task: poll the button at a fixed interval
pub async fn run_control_input(
    mut controller: LifecycleController,
    input: Arc<dyn ControlInput>,
    running: Arc<AtomicBool>,
    poll: Duration,
) {
    info!("Lifecycle: Control input task started");

    while running.load(Ordering::SeqCst) {
        match input.poll_button() {
            Ok(pressed) => {
                if let Some(phase) = controller.on_button(pressed, Instant::now()).await {
                    debug!("Lifecycle: Now {}", phase);
                }
            }
            Err(e) => warn!("Lifecycle: Button read failed: {}", e),
        }
        sleep(poll).await;
    }

    info!("Lifecycle: Control input task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockHal;
    use crate::state::SwarmState;
    use crate::types::{IndicatorSlot, Observation};
    use std::fs;
    use std::net::{IpAddr, Ipv4Addr};
    use tempfile::{tempdir, TempDir};

    struct Rig {
        dir: TempDir,
        state: SharedState,
        hal: Arc<MockHal>,
        logger: Arc<SessionLogger>,
        signals: mpsc::Receiver<ControlSignal>,
        controller: LifecycleController,
    }

    fn rig() -> Rig {
        let dir = tempdir().unwrap();
        let state = SwarmState::default().shared();
        let hal = Arc::new(MockHal::new(3));
        let logger = Arc::new(SessionLogger::new(dir.path(), true).unwrap());
        logger.new_session(0, Stamp::now().wall).unwrap();
        let (tx, signals) = mpsc::channel(8);
        let controller = LifecycleController::new(
            state.clone(),
            hal.clone(),
            logger.clone(),
            tx,
            Duration::from_millis(500),
        );
        Rig { dir, state, hal, logger, signals, controller }
    }

    fn feed(state: &SharedState, id: u32, stamp: Stamp) {
        let record = state.lock().ingest(&Observation {
            device_id: id,
            reading: 600,
            addr: IpAddr::V4(Ipv4Addr::new(192, 168, 1, id as u8)),
            stamp,
        });
        assert!(record.is_some());
    }

    #[test]
    fn test_debouncer_edges() {
        let mut d = Debouncer::new(Duration::from_millis(500));
        let t0 = Instant::now();

        assert!(d.sample(true, t0));
        // Held down: no repeat
        assert!(!d.sample(true, t0 + Duration::from_secs(2)));
        assert!(!d.sample(false, t0 + Duration::from_secs(3)));
        assert!(d.sample(true, t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_debouncer_window() {
        let mut d = Debouncer::new(Duration::from_millis(500));
        let t0 = Instant::now();

        assert!(d.sample(true, t0));
        d.sample(false, t0 + Duration::from_millis(100));
        assert!(!d.sample(true, t0 + Duration::from_millis(200)));
        d.sample(false, t0 + Duration::from_millis(300));
        assert!(d.sample(true, t0 + Duration::from_millis(600)));
    }

    #[test]
    fn test_press_held_past_window_fires_once() {
        let mut d = Debouncer::new(Duration::from_millis(500));
        let t0 = Instant::now();

        assert!(d.sample(true, t0));
        assert!(!d.sample(false, t0 + Duration::from_millis(200)));

        // Pressed at 400 ms and held until 3 s, polled every 100 ms
        let fired: Vec<u64> = (4..=30)
            .map(|i| i * 100)
            .filter(|ms| d.sample(true, t0 + Duration::from_millis(*ms)))
            .collect();
        assert_eq!(fired, vec![500]);
    }

    #[tokio::test]
    async fn test_pause_after_logger_close_opens_nothing() {
        let mut rig = rig();
        feed(&rig.state, 3, Stamp::now());
        rig.logger.close();

        assert_eq!(rig.controller.pause().await, Phase::Paused);

        assert!(rig.logger.current_path().is_none());
        assert_eq!(fs::read_dir(rig.dir.path()).unwrap().count(), 1);
        assert!(!rig.state.lock().is_active());
        assert_eq!(rig.hal.levels(), vec![false, false, false]);
    }

    #[tokio::test]
    async fn test_press_pauses_and_clears() {
        let mut rig = rig();
        feed(&rig.state, 5, Stamp::now());
        rig.hal.set_indicator(IndicatorSlot(0), true).unwrap();

        let t0 = Instant::now();
        assert_eq!(rig.controller.on_button(true, t0).await, Some(Phase::Paused));

        {
            let state = rig.state.lock();
            assert!(!state.is_active());
            assert!(state.current_master().is_none());
            assert!(state.get(5).is_none());
            assert!(state.slot_of(5).is_none());
            assert_eq!(state.session(), 1);
        }
        assert_eq!(rig.hal.levels(), vec![false, false, false]);
        assert_eq!(rig.signals.try_recv().unwrap(), ControlSignal::Reset);
        assert_eq!(rig.logger.current_session(), Some(1));

        // Bounce within the window has no effect
        rig.controller.on_button(false, t0 + Duration::from_millis(50)).await;
        assert_eq!(rig.controller.on_button(true, t0 + Duration::from_millis(100)).await, None);
        assert_eq!(rig.controller.phase(), Phase::Paused);
        assert!(rig.signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_second_press_activates() {
        let mut rig = rig();
        let t0 = Instant::now();

        rig.controller.on_button(true, t0).await;
        rig.controller.on_button(false, t0 + Duration::from_millis(300)).await;
        let phase = rig.controller.on_button(true, t0 + Duration::from_millis(700)).await;

        assert_eq!(phase, Some(Phase::Active));
        assert!(rig.state.lock().is_active());
        assert_eq!(rig.signals.try_recv().unwrap(), ControlSignal::Reset);
        assert_eq!(rig.signals.try_recv().unwrap(), ControlSignal::Activate);
        // Activation does not rotate the log
        assert_eq!(rig.logger.current_session(), Some(1));
    }

    #[tokio::test]
    async fn test_summary_matches_final_snapshot() {
        let mut rig = rig();
        let first = rig.logger.current_path().unwrap();
        let now = Stamp::now();
        let t0 = Stamp {
            at: now.at - Duration::from_secs(10),
            wall: now.wall - chrono::Duration::seconds(10),
        };

        feed(&rig.state, 1, t0);
        feed(&rig.state, 2, t0.after(Duration::from_secs(4)));

        rig.controller.pause().await;

        let text = fs::read_to_string(&first).unwrap();
        let line = text
            .lines()
            .find(|l| l.starts_with("IP: 192.168.1.1,"))
            .unwrap();
        assert_eq!(line, "IP: 192.168.1.1, Device: 1, Total Time: 4.00 seconds");
        assert!(text.contains("IP: 192.168.1.2, Device: 2, Total Time:"));
    }

    #[tokio::test]
    async fn test_pause_survives_closed_channel() {
        let mut rig = rig();
        drop(rig.signals);
        assert_eq!(rig.controller.pause().await, Phase::Paused);
        assert!(!rig.state.lock().is_active());
    }
}
