//! System configuration parameters
//!
//! All tunable parameters for the ElectricStove controller.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Setpoint limits ---
    /// Lowest target temperature a user or recipe may request (°C)
    pub target_temp_min_c: u16,
    /// Highest target temperature a user or recipe may request (°C)
    pub target_temp_max_c: u16,
    /// Longest heating step a user or recipe may request (seconds)
    pub max_duration_secs: u32,

    // --- Temperature supervision ---
    /// Lower bound of a plausible thermocouple reading (°C)
    pub min_allowed_temp_c: f32,
    /// Upper bound of a plausible thermocouple reading (°C); also the
    /// value published while the sensor is faulted
    pub max_allowed_temp_c: f32,
    /// Consecutive implausible reads tolerated before failsafe
    pub bad_read_threshold: u32,

    // --- PID relay ---
    pub pid_kp: f32,
    pub pid_ki: f32,
    pub pid_kd: f32,
    /// Relay time-proportioning window (milliseconds)
    pub pid_window_ms: u32,
    /// Forced-off gap appended to every window (milliseconds)
    pub pid_dead_time_ms: u32,
    /// PID compute period (milliseconds)
    pub pid_sample_ms: u32,

    // --- Special events ---
    /// Safety bound on a PREHEATING hold (seconds)
    pub preheat_max_secs: u32,
    /// Safety bound on a PAUSE hold (seconds)
    pub pause_max_secs: u32,
    /// Period of the END alarm pattern (milliseconds)
    pub end_alarm_period_ms: u32,

    // --- Timing ---
    /// Thermocouple read interval (milliseconds)
    pub sensor_read_interval_ms: u32,
    /// Controller tick interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Alert output evaluation interval (milliseconds)
    pub alert_tick_ms: u32,
    /// Longest wait on a contended session or alert lock (milliseconds)
    pub lock_wait_ms: u32,
    /// Telemetry report interval (seconds)
    pub telemetry_interval_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Setpoint limits
            target_temp_min_c: 20,
            target_temp_max_c: 300,
            max_duration_secs: 24 * 3600,

            // Supervision
            min_allowed_temp_c: 0.0,
            max_allowed_temp_c: 350.0,
            bad_read_threshold: 100,

            // PID relay
            pid_kp: 70.0,
            pid_ki: 0.1,
            pid_kd: 1000.0,
            pid_window_ms: 8000,
            pid_dead_time_ms: 2000,
            pid_sample_ms: 10,

            // Special events
            preheat_max_secs: 2 * 3600,
            pause_max_secs: 3600,
            end_alarm_period_ms: 5000,

            // Timing
            sensor_read_interval_ms: 1000, // MAX6675 conversion time bound
            control_loop_interval_ms: 10,
            alert_tick_ms: 10,
            lock_wait_ms: 10,
            telemetry_interval_secs: 60,
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.target_temp_min_c >= self.target_temp_max_c {
            return Err("target_temp_min_c must be < target_temp_max_c");
        }
        if f32::from(self.target_temp_max_c) > self.max_allowed_temp_c {
            return Err("target_temp_max_c must not exceed max_allowed_temp_c");
        }
        if !(60..=7 * 24 * 3600).contains(&self.max_duration_secs) {
            return Err("max_duration_secs must be 60–604800");
        }
        if !(self.min_allowed_temp_c < self.max_allowed_temp_c) {
            return Err("min_allowed_temp_c must be < max_allowed_temp_c");
        }
        if !(1..=10_000).contains(&self.bad_read_threshold) {
            return Err("bad_read_threshold must be 1–10000");
        }
        if !(self.pid_kp >= 0.0 && self.pid_ki >= 0.0 && self.pid_kd >= 0.0) {
            return Err("PID gains must be non-negative");
        }
        if !(1000..=60_000).contains(&self.pid_window_ms) {
            return Err("pid_window_ms must be 1000–60000");
        }
        if self.pid_dead_time_ms > self.pid_window_ms {
            return Err("pid_dead_time_ms must not exceed pid_window_ms");
        }
        if self.pid_sample_ms == 0 || self.pid_sample_ms > self.pid_window_ms {
            return Err("pid_sample_ms must be 1–pid_window_ms");
        }
        if self.preheat_max_secs == 0 || self.pause_max_secs == 0 {
            return Err("special event safety bounds must be non-zero");
        }
        if self.end_alarm_period_ms < 500 {
            return Err("end_alarm_period_ms must be >= 500");
        }
        if !(250..=10_000).contains(&self.sensor_read_interval_ms) {
            return Err("sensor_read_interval_ms must be 250–10000");
        }
        if !(1..=1000).contains(&self.control_loop_interval_ms) {
            return Err("control_loop_interval_ms must be 1–1000");
        }
        if !(1..=1000).contains(&self.alert_tick_ms) {
            return Err("alert_tick_ms must be 1–1000");
        }
        if !(1..=1000).contains(&self.lock_wait_ms) {
            return Err("lock_wait_ms must be 1–1000");
        }
        if !(5..=3600).contains(&self.telemetry_interval_secs) {
            return Err("telemetry_interval_secs must be 5–3600");
        }
        Ok(())
    }

    /// Clamp a requested target temperature to the device limits.
    pub fn clamp_temperature(&self, temp_c: u16) -> u16 {
        temp_c.clamp(self.target_temp_min_c, self.target_temp_max_c)
    }

    /// Clamp a requested duration to the device limits.
    pub fn clamp_duration(&self, secs: u32) -> u32 {
        secs.min(self.max_duration_secs)
    }
}
