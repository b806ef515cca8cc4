//! Hardware Abstraction Layer
//!
//! The coordinator touches hardware only through two traits:
//! - `IndicatorDriver`: logical indicator slots, on/off
//! - `ControlInput`: the reset/activate push button, high while pressed
//!
//! `MockHal` keeps everything in memory and is used by tests and by nodes
//! built without the `hardware` feature. `GpioHal` drives Raspberry Pi pins
//! through `rppal`.
//!
//! # Implementing a HAL
//!
//! ```ignore
//! struct Board;
//!
//! impl IndicatorDriver for Board {
//!     fn set_indicator(&self, slot: IndicatorSlot, on: bool) -> Result<(), HalError> {
//!         // write the output mapped to `slot`
//!     }
//!
//!     fn slot_count(&self) -> usize {
//!         3
//!     }
//! }
//! ```

use crate::error::HalError;
use crate::types::IndicatorSlot;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info};

/// Output side: one on/off channel per logical slot
pub trait IndicatorDriver: Send + Sync {
    /// Drive `slot` high (`on`) or low
    fn set_indicator(&self, slot: IndicatorSlot, on: bool) -> Result<(), HalError>;

    /// Number of slots this driver exposes
    fn slot_count(&self) -> usize;

    /// Release hardware resources. Called once at shutdown.
    fn cleanup(&self) -> Result<(), HalError> {
        Ok(())
    }
}

/// Input side: the physical control
pub trait ControlInput: Send + Sync {
    /// Current button level, true while pressed
    fn poll_button(&self) -> Result<bool, HalError>;
}

// ============================================================================
// Mock implementation
// ============================================================================

/// In-memory indicators and a virtual button
#[derive(Debug)]
pub struct MockHal {
    levels: Mutex<Vec<bool>>,
    writes: Mutex<Vec<usize>>,
    button: AtomicBool,
    cleanups: AtomicUsize,
}

impl MockHal {
    pub fn new(slot_count: usize) -> Self {
        info!("HAL: Using mock hardware ({} indicator slots)", slot_count);
        Self {
            levels: Mutex::new(vec![false; slot_count]),
            writes: Mutex::new(vec![0; slot_count]),
            button: AtomicBool::new(false),
            cleanups: AtomicUsize::new(0),
        }
    }

    /// Current level of every slot
    pub fn levels(&self) -> Vec<bool> {
        self.levels.lock().clone()
    }

    /// Number of writes `slot` has received
    pub fn writes_to(&self, slot: IndicatorSlot) -> usize {
        self.writes.lock().get(slot.index()).copied().unwrap_or(0)
    }

    pub fn press(&self) {
        self.button.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.button.store(false, Ordering::SeqCst);
    }

    /// How many times `cleanup` ran
    pub fn cleanup_count(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

impl IndicatorDriver for MockHal {
    fn set_indicator(&self, slot: IndicatorSlot, on: bool) -> Result<(), HalError> {
        let mut levels = self.levels.lock();
        let level = levels
            .get_mut(slot.index())
            .ok_or(HalError::SlotOutOfRange(slot.0))?;
        *level = on;
        self.writes.lock()[slot.index()] += 1;
        debug!("[MOCK] {} -> {}", slot, if on { "on" } else { "off" });
        Ok(())
    }

    fn slot_count(&self) -> usize {
        self.levels.lock().len()
    }

    fn cleanup(&self) -> Result<(), HalError> {
        self.levels.lock().iter_mut().for_each(|l| *l = false);
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        debug!("[MOCK] Cleanup");
        Ok(())
    }
}

impl ControlInput for MockHal {
    fn poll_button(&self) -> Result<bool, HalError> {
        Ok(self.button.load(Ordering::SeqCst))
    }
}

// ============================================================================
// Raspberry Pi implementation
// ============================================================================

#[cfg(feature = "hardware")]
mod gpio {
    use super::*;
    use crate::config::PinMap;
    use rppal::gpio::{Gpio, InputPin, Level, OutputPin};

    impl From<rppal::gpio::Error> for HalError {
        fn from(e: rppal::gpio::Error) -> Self {
            HalError::Gpio(e.to_string())
        }
    }

    /// Indicators and button on BCM-numbered pins
    pub struct GpioHal {
        outputs: Vec<Mutex<OutputPin>>,
        button: InputPin,
    }

    impl GpioHal {
        /// Claim the pins; outputs start low, button is a pull-down input
        pub fn new(pins: &PinMap) -> Result<Self, HalError> {
            let gpio = Gpio::new()?;

            let mut outputs = Vec::with_capacity(pins.indicators.len());
            for pin in &pins.indicators {
                outputs.push(Mutex::new(gpio.get(*pin)?.into_output_low()));
            }
            let button = gpio.get(pins.button)?.into_input_pulldown();

            info!(
                "HAL: GPIO ready (indicators {:?}, button {})",
                pins.indicators, pins.button
            );
            Ok(Self { outputs, button })
        }
    }

    impl IndicatorDriver for GpioHal {
        fn set_indicator(&self, slot: IndicatorSlot, on: bool) -> Result<(), HalError> {
            let pin = self
                .outputs
                .get(slot.index())
                .ok_or(HalError::SlotOutOfRange(slot.0))?;
            pin.lock().write(if on { Level::High } else { Level::Low });
            Ok(())
        }

        fn slot_count(&self) -> usize {
            self.outputs.len()
        }

        fn cleanup(&self) -> Result<(), HalError> {
            for pin in &self.outputs {
                pin.lock().set_low();
            }
            info!("HAL: GPIO outputs released");
            Ok(())
        }
    }

    impl ControlInput for GpioHal {
        fn poll_button(&self) -> Result<bool, HalError> {
            Ok(self.button.is_high())
        }
    }
}

#[cfg(feature = "hardware")]
pub use gpio::GpioHal;
