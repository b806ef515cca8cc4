//! LightSwarm Core Library
//!
//! Coordinator for a swarm of light-sensing devices on a local network.
//! The most recent reporter is master; the coordinator accounts master time
//! per device, blinks the master's indicator at a rate set by its reading,
//! and writes one log file per session.
//!
//! ```text
//!   UDP "MASTER:<id>:<reading>"
//!         │
//!         ▼
//!   ┌───────────┐   ┌──────────────────────────────┐
//!   │ Transport │──►│ SwarmState (single mutex)    │
//!   └───────────┘   │  DeviceRegistry              │
//!         ▲         │  IndicatorAllocator          │
//!         │         │  MasterElector ─► TimeAccountant
//!   RESET/ACTIVATE  └──────┬───────────────┬───────┘
//!         │                │               │
//!   ┌─────┴──────┐   ┌─────┴─────┐   ┌─────┴────────┐
//!   │ Lifecycle  │   │ Blink     │   │ SessionLogger│
//!   └────────────┘   └───────────┘   └──────────────┘
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod registry;
pub mod accounting;
pub mod indicator;
pub mod election;
pub mod state;
pub mod blink;
pub mod session_log;
pub mod hal;
pub mod transport;
pub mod lifecycle;
pub mod presentation;
pub mod coordinator;

pub use types::*;
pub use error::{HalError, SwarmError};
pub use config::{CoordinatorConfig, PinMap};
pub use election::ElectionPolicy;
pub use state::{SharedState, SwarmState};
pub use session_log::SessionLogger;
pub use hal::{ControlInput, IndicatorDriver, MockHal};
pub use lifecycle::{LifecycleController, Phase};
pub use coordinator::Coordinator;

#[cfg(feature = "hardware")]
pub use hal::GpioHal;
