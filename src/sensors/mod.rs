//! Temperature acquisition.
//!
//! The thermocouple is slow (one conversion per ~220 ms) while the heater
//! loop runs every few milliseconds, so the two are decoupled by a
//! lock-free [`TemperatureCache`]: the sensor task publishes, the heater
//! task reads the most recent value.

pub mod thermocouple;

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::SensorError;

/// Bit pattern stored when the last read failed.
const FAILED: u32 = f32::NAN.to_bits();

/// Single-value cache of the latest thermocouple reading.
///
/// Writes and reads are single atomic operations, so it is safe to share
/// between tasks by reference or `Arc`.
pub struct TemperatureCache {
    bits: AtomicU32,
}

impl Default for TemperatureCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureCache {
    /// A fresh cache reads as "failed" until the first publish.
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(FAILED),
        }
    }

    pub fn publish(&self, reading: Result<f32, SensorError>) {
        let bits = match reading {
            Ok(c) if c.is_finite() => c.to_bits(),
            _ => FAILED,
        };
        self.bits.store(bits, Ordering::Release);
    }

    /// Latest reading, `None` if the last read failed.
    pub fn latest(&self) -> Option<f32> {
        let c = f32::from_bits(self.bits.load(Ordering::Acquire));
        c.is_finite().then_some(c)
    }
}
