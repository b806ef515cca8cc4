//! Coordinator: owns the shared state and runs the swarm tasks.
//!
//! Tasks (all stop when the running flag is cleared):
//! - ingestion: UDP receive → `SwarmState::ingest` → session log
//! - control sender: queued RESET / ACTIVATE → broadcast
//! - indicator: blink loop
//! - control input: button polling → lifecycle transitions
//! - presentation: periodic dashboard snapshots

use crate::blink::{all_off, run_blink_loop};
use crate::config::CoordinatorConfig;
use crate::error::{ParseError, SwarmError};
use crate::hal::{ControlInput, IndicatorDriver};
use crate::lifecycle::{run_control_input, LifecycleController};
use crate::presentation::{run_presentation, ReadingHistory};
use crate::session_log::SessionLogger;
use crate::state::{SharedState, SwarmState};
use crate::transport::{run_control_sender, Received, Transport};
use crate::types::{ControlSignal, Message, Observation, Stamp};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, info, trace, warn};

/// Queue depth for outbound control signals
const CONTROL_QUEUE: usize = 16;

/// What happened to one datagram
#[derive(Debug, PartialEq)]
pub enum Ingested {
    /// Reading accepted; `logged` is false if the log write was skipped or failed
    Recorded { master_changed: bool, logged: bool },
    /// Coordinator is paused, reading dropped
    Paused,
    /// Echo of our own control broadcast
    Control(ControlSignal),
    /// Malformed payload
    Discarded(ParseError),
}

/// Process one datagram. The state lock is released before the log write.
pub fn handle_datagram(
    state: &SharedState,
    logger: &SessionLogger,
    payload: &[u8],
    src: SocketAddr,
    stamp: Stamp,
) -> Ingested {
    let (device_id, reading) = match Message::from_bytes(payload) {
        Ok(Message::Master { device_id, reading }) => (device_id, reading),
        Ok(Message::Control(signal)) => {
            trace!("Ingest: Ignoring {} echo from {}", signal, src);
            return Ingested::Control(signal);
        }
        Err(ParseError::UnknownPrefix(prefix)) => {
            debug!("Ingest: Ignoring {:?} message from {}", prefix, src);
            return Ingested::Discarded(ParseError::UnknownPrefix(prefix));
        }
        Err(e) => {
            warn!(
                "Ingest: Discarding malformed message from {}: {} ({:?})",
                src,
                e,
                String::from_utf8_lossy(payload)
            );
            return Ingested::Discarded(e);
        }
    };

    debug!("Ingest: MASTER:{}:{} from {}", device_id, reading, src);

    let obs = Observation {
        device_id,
        reading,
        addr: src.ip(),
        stamp,
    };
    let Some(ingest) = state.lock().ingest(&obs) else {
        return Ingested::Paused;
    };

    let logged = match logger.log_reading(&ingest.record) {
        Ok(written) => written,
        Err(e) => {
            warn!("Ingest: Failed to log reading: {}", e);
            false
        }
    };

    Ingested::Recorded {
        master_changed: ingest.master_changed,
        logged,
    }
}

/// Ingestion task
pub async fn run_ingestion(
    transport: Transport,
    state: SharedState,
    logger: Arc<SessionLogger>,
    running: Arc<AtomicBool>,
    recv_timeout: Duration,
) {
    info!("Ingest: Waiting for devices");

    while running.load(Ordering::SeqCst) {
        match transport.recv_timeout(recv_timeout).await {
            Ok(Received::Datagram(payload, src)) => {
                let stamp = Stamp::now();
                let (state, logger) = (state.clone(), logger.clone());
                // Log writes hit the file system
                let handled = tokio::task::spawn_blocking(move || {
                    handle_datagram(&state, &logger, &payload, src, stamp)
                })
                .await;
                if let Err(e) = handled {
                    error!("Ingest: Datagram handler failed: {}", e);
                }
            }
            Ok(Received::Idle) => {}
            Err(e) => {
                error!("Ingest: UDP receive error: {}", e);
                sleep(Duration::from_millis(100)).await;
            }
        }
    }

    info!("Ingest: Stopped");
}

/// Running coordinator
pub struct Coordinator {
    config: CoordinatorConfig,
    state: SharedState,
    logger: Arc<SessionLogger>,
    indicators: Arc<dyn IndicatorDriver>,
    input: Arc<dyn ControlInput>,
    transport: Transport,
    history: Arc<Mutex<ReadingHistory>>,
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl Coordinator {
    /// Bind the socket and open the first session log. Failures here are
    /// fatal; nothing has been started yet.
    pub async fn start(
        config: CoordinatorConfig,
        indicators: Arc<dyn IndicatorDriver>,
        input: Arc<dyn ControlInput>,
    ) -> Result<Self, SwarmError> {
        let transport = Transport::bind(config.port).await?;
        info!("Coordinator: Listening on {}", transport.local_addr()?);

        let logger = Arc::new(SessionLogger::new(&config.log_dir, config.flush_each_line)?);
        let state = SwarmState::from_config(&config).shared();
        let session = state.lock().session();
        logger.new_session(session, Stamp::now().wall)?;

        all_off(indicators.as_ref());

        Ok(Self {
            history: Arc::new(Mutex::new(ReadingHistory::new(config.history_len))),
            config,
            state,
            logger,
            indicators,
            input,
            transport,
            running: Arc::new(AtomicBool::new(true)),
            tasks: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn logger(&self) -> Arc<SessionLogger> {
        self.logger.clone()
    }

    /// Rolling reading history for the dashboard
    pub fn history(&self) -> Arc<Mutex<ReadingHistory>> {
        self.history.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.transport.local_addr()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn all tasks. The handles are kept so `stop` can wait for them.
    /// Returns the number of tasks started; zero if already spawned.
    pub fn spawn(&self) -> usize {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() || !self.is_running() {
            return 0;
        }

        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE);

        let controller = LifecycleController::new(
            self.state.clone(),
            self.indicators.clone(),
            self.logger.clone(),
            control_tx,
            self.config.debounce,
        );

        tasks.extend([
            tokio::spawn(run_ingestion(
                self.transport.clone(),
                self.state.clone(),
                self.logger.clone(),
                self.running.clone(),
                self.config.recv_timeout,
            )),
            tokio::spawn(run_control_sender(
                self.transport.clone(),
                control_rx,
                self.config.broadcast_addr(),
                self.running.clone(),
                self.config.recv_timeout,
            )),
            tokio::spawn(run_blink_loop(
                self.state.clone(),
                self.indicators.clone(),
                self.running.clone(),
                self.config.idle_tick,
            )),
            tokio::spawn(run_control_input(
                controller,
                self.input.clone(),
                self.running.clone(),
                self.config.button_poll,
            )),
            tokio::spawn(run_presentation(
                self.state.clone(),
                self.history.clone(),
                self.running.clone(),
                self.config.presentation_interval,
            )),
        ]);
        tasks.len()
    }

    /// Spawn the tasks and wait until the running flag is cleared or every
    /// task has exited. Dropping this future leaves the tasks running; call
    /// `stop` to end them.
    pub async fn run(&self) {
        let count = self.spawn();
        info!("Coordinator: Running ({} tasks)", count);

        while self.is_running() {
            if self.tasks.lock().iter().all(|t| t.is_finished()) {
                break;
            }
            sleep(self.config.idle_tick).await;
        }
    }

    /// Clear the running flag, wait up to `shutdown_grace` for the tasks to
    /// exit (aborting stragglers), then release resources.
    pub async fn stop(&self) -> bool {
        self.running.store(false, Ordering::SeqCst);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        let deadline = Instant::now() + self.config.shutdown_grace;
        for mut task in tasks {
            match timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Coordinator: Task failed: {}", e),
                Err(_) => {
                    warn!("Coordinator: Task did not stop in time, aborting");
                    task.abort();
                }
            }
        }

        self.shutdown()
    }

    /// Release resources: indicators off, hardware cleanup, log closed.
    /// Safe to call any number of times; only the first call does work.
    /// Returns true for that call. Tasks still alive are aborted first;
    /// prefer `stop`, which lets them finish.
    pub fn shutdown(&self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return false;
        }

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        info!("Coordinator: Cleaning up");
        self.logger.close();
        all_off(self.indicators.as_ref());
        if let Err(e) = self.indicators.cleanup() {
            warn!("Coordinator: Hardware cleanup failed: {}", e);
        }
        info!("Coordinator: Cleanup complete");
        true
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
