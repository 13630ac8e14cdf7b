//! Monotonic millisecond clock.
//!
//! - **`target_os = "espidf"`** wraps `esp_timer_get_time()` (microsecond
//!   resolution, monotonic since boot).
//! - **otherwise** uses `std::time::Instant` for host simulation.
//!
//! The controller works in wrapping `u32` milliseconds, so the value rolls
//! over roughly every 49.7 days; all consumers subtract with
//! `wrapping_sub`.

use crate::app::ports::Clock;

/// System clock for the controller and its tasks.
#[derive(Clone, Copy)]
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since construction.
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        (self.uptime_us() / 1000) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.now_ms();
        assert!(b.wrapping_sub(a) >= 5);
    }
}
