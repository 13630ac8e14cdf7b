//! Temperature safety supervisor.
//!
//! Runs in the sensor task, between the sensor and the temperature cache.  Every
//! sample is range-checked against the plausible window
//! `[min_allowed_temp_c, max_allowed_temp_c]`:
//!
//! ## Fault lifecycle
//!
//! 1. A plausible reading is published as-is and resets the bad-read
//!    counter.  If a fault was latched it is cleared and its alert
//!    pattern cancelled.
//! 2. An implausible or failed reading increments the counter and the
//!    last good value is held (never a low default, which would make
//!    the PID heat harder).
//! 3. Once the counter exceeds `bad_read_threshold` the fault latches:
//!    `max_allowed_temp_c` is published so the PID drives the relay
//!    off, the continuous fault alert starts and the counter restarts.
//! 4. While latched, every bad reading keeps publishing the maximum.

use log::{error, info};

use crate::alerts::{AlertHandle, SENSOR_FAULT, SharedAlerts};
use crate::config::SystemConfig;

/// Safety supervisor.
pub struct SafetySupervisor {
    min_c: f32,
    max_c: f32,
    threshold: u32,
    bad_reads: u32,
    faulted: bool,
    last_good: Option<f32>,
    alert: Option<AlertHandle>,
    trips: u32,
}

impl SafetySupervisor {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            min_c: config.min_allowed_temp_c,
            max_c: config.max_allowed_temp_c,
            threshold: config.bad_read_threshold,
            bad_reads: 0,
            faulted: false,
            last_good: None,
            alert: None,
            trips: 0,
        }
    }

    /// Classify one reading and return the temperature to publish.
    pub fn sample(&mut self, reading: Option<f32>, now_ms: u32, alerts: &SharedAlerts) -> f32 {
        match reading {
            Some(c) if self.is_plausible(c) => {
                self.bad_reads = 0;
                self.last_good = Some(c);
                if self.faulted {
                    self.faulted = false;
                    info!("SENSOR FAULT CLEARED: {:.2}\u{00b0}C", c);
                }
                if let Some(h) = self.alert.take() {
                    alerts.delete(h);
                }
                c
            }
            _ => {
                self.bad_reads += 1;
                if self.bad_reads > self.threshold {
                    self.bad_reads = 0;
                    self.trip(reading, now_ms, alerts);
                }
                if self.faulted {
                    self.max_c
                } else {
                    self.last_good.unwrap_or(self.max_c)
                }
            }
        }
    }

    /// True while the sensor fault is latched.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Consecutive bad reads since the last good read or trip.
    pub fn bad_reads(&self) -> u32 {
        self.bad_reads
    }

    /// Number of times the failsafe has tripped since boot.
    pub fn trip_count(&self) -> u32 {
        self.trips
    }

    // ── Internal ──────────────────────────────────────────────────

    fn is_plausible(&self, c: f32) -> bool {
        (self.min_c..=self.max_c).contains(&c)
    }

    fn trip(&mut self, reading: Option<f32>, now_ms: u32, alerts: &SharedAlerts) {
        self.trips = self.trips.saturating_add(1);
        if !self.faulted {
            self.faulted = true;
            match reading {
                Some(c) => error!(
                    "SENSOR FAULT SET: {:.2}\u{00b0}C outside {:.0}..{:.0}, publishing {:.0}",
                    c, self.min_c, self.max_c, self.max_c
                ),
                None => error!(
                    "SENSOR FAULT SET: thermocouple unreadable, publishing {:.0}",
                    self.max_c
                ),
            }
        }
        let sounding = self.alert.is_some_and(|h| alerts.is_scheduled(h));
        if !sounding {
            self.alert = alerts.add(now_ms, SENSOR_FAULT);
        }
    }
}
