//! Configuration for the LightSwarm coordinator
//!
//! Combines network, timing, logging and GPIO settings.

use crate::election::ElectionPolicy;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default UDP port shared by readings and control broadcasts
pub const DEFAULT_PORT: u16 = 2910;

/// Number of indicator slots on the coordinator board
pub const DEFAULT_SLOT_COUNT: usize = 3;

/// Complete coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// UDP port to listen on and broadcast to
    pub port: u16,

    /// Broadcast address for RESET / ACTIVATE
    pub broadcast_ip: IpAddr,

    /// Directory session logs are written into
    pub log_dir: PathBuf,

    /// Flush the session log after every line
    pub flush_each_line: bool,

    /// Size of the indicator pool
    pub slot_count: usize,

    /// Minimum spacing between accepted button transitions
    pub debounce: Duration,

    /// Button polling period
    pub button_poll: Duration,

    /// Idle tick of the blink loop
    pub idle_tick: Duration,

    /// Upper bound on a single socket wait, so shutdown is noticed
    pub recv_timeout: Duration,

    /// How long `stop` waits for tasks before aborting them
    pub shutdown_grace: Duration,

    /// How often the presentation feed is sampled
    pub presentation_interval: Duration,

    /// Samples kept in the rolling reading history
    pub history_len: usize,

    /// Master election policy
    pub election: ElectionPolicy,

    /// GPIO pin numbering for the rppal backend
    pub pins: PinMap,
}

/// BCM pin numbers for the physical board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinMap {
    /// Output pin per indicator slot, in slot order
    pub indicators: Vec<u8>,

    /// Reset/activate push button (pull-down, high while pressed)
    pub button: u8,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            broadcast_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 255)),
            log_dir: PathBuf::from("."),
            flush_each_line: true,
            slot_count: DEFAULT_SLOT_COUNT,
            debounce: Duration::from_millis(500),
            button_poll: Duration::from_millis(100),
            idle_tick: Duration::from_millis(100),
            recv_timeout: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(3),
            presentation_interval: Duration::from_secs(1),
            history_len: 30,
            election: ElectionPolicy::default(),
            pins: PinMap::default(),
        }
    }
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            // red, green, yellow
            indicators: vec![27, 23, 22],
            button: 15,
        }
    }
}

impl CoordinatorConfig {
    /// Where control tokens are sent
    pub fn broadcast_addr(&self) -> SocketAddr {
        SocketAddr::new(self.broadcast_ip, self.port)
    }

    /// Set the log directory
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Set the UDP port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}
