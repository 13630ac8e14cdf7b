//! Time-proportioning relay driver on top of [`PidController`].
//!
//! The heating element sits behind a mechanical relay, so the PID output
//! is expressed as an ON time inside a fixed window followed by a forced
//! OFF gap:
//!
//! ```text
//!  window_start                      +window        +window+dead_time
//!  │◀──── output ────▶│                │                │
//!  ┌──────────────────┐                                 ┌─────
//!  │       ON         │      OFF       │   dead (OFF)   │  next window
//! ─┘                  └────────────────┴────────────────┘
//! ```
//!
//! The window start only ever advances by whole multiples of
//! `window + dead_time`, so the phase stays stable across jittery ticks.
//! All timestamps are wrapping `u32` milliseconds and are compared by
//! difference only.

use super::pid::PidController;
use crate::config::SystemConfig;

/// PID + relay window state.
#[derive(Debug, Clone)]
pub struct RelayController {
    pid: PidController,
    window_ms: u32,
    dead_time_ms: u32,
    sample_ms: u32,
    window_start: Option<u32>,
    last_compute: Option<u32>,
    input: f32,
    /// Desired ON time in the current window, 0..=window_ms.
    output: f32,
    armed: bool,
    relay_on: bool,
    duty_sum: f32,
    duty_percent: u8,
}

impl RelayController {
    pub fn new(config: &SystemConfig) -> Self {
        let mut pid = PidController::new(config.pid_kp, config.pid_ki, config.pid_kd, 0.0);
        pid.set_limits(0.0, config.pid_window_ms as f32);
        Self {
            pid,
            window_ms: config.pid_window_ms,
            dead_time_ms: config.pid_dead_time_ms,
            sample_ms: config.pid_sample_ms.max(1),
            window_start: None,
            last_compute: None,
            input: 0.0,
            output: 0.0,
            armed: false,
            relay_on: false,
            duty_sum: 0.0,
            duty_percent: 0,
        }
    }

    /// Arm the relay output.
    pub fn on(&mut self) {
        self.armed = true;
        self.pid.reset();
        self.reset_accumulators();
    }

    /// Disarm the relay output; the relay is forced OFF.
    pub fn off(&mut self) {
        self.armed = false;
        self.relay_on = false;
        self.output = 0.0;
        self.reset_accumulators();
    }

    /// Change the target temperature.  The window phase is left alone.
    pub fn set_point(&mut self, temp_c: f32) {
        self.pid.set_target(temp_c);
    }

    /// Run one control step and return the relay state to drive.
    pub fn update(&mut self, now_ms: u32, input_c: f32) -> bool {
        if !self.armed {
            self.relay_on = false;
            return false;
        }

        let start = *self.window_start.get_or_insert(now_ms);

        let period = self.period_ms();
        let mut elapsed = now_ms.wrapping_sub(start);
        if elapsed >= period {
            let windows = elapsed / period;
            self.window_start = Some(start.wrapping_add(windows * period));
            elapsed -= windows * period;
            self.publish_duty();
        }

        let due = self
            .last_compute
            .is_none_or(|t| now_ms.wrapping_sub(t) >= self.sample_ms);
        if due {
            let dt_ms = self
                .last_compute
                .map_or(self.sample_ms, |t| now_ms.wrapping_sub(t));
            self.input = input_c;
            self.output = self.pid.compute(input_c, dt_ms as f32 / 1000.0);
            self.last_compute = Some(now_ms);
            self.duty_sum += self.output;
        }

        self.relay_on = (elapsed as f32) < self.output;
        self.relay_on
    }

    /// Full window period including the dead time.
    pub fn period_ms(&self) -> u32 {
        self.window_ms + self.dead_time_ms
    }

    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }

    /// Average duty of the last completed window, 0–100 %.
    pub fn duty_percent(&self) -> u8 {
        self.duty_percent
    }

    /// Whether the relay was driven ON by the last update.
    pub fn is_energized(&self) -> bool {
        self.relay_on
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn input(&self) -> f32 {
        self.input
    }

    pub fn window_start(&self) -> Option<u32> {
        self.window_start
    }

    // ── Internal ──────────────────────────────────────────────────

    fn publish_duty(&mut self) {
        let samples = (self.period_ms() / self.sample_ms).max(1) as f32;
        let avg_on_ms = self.duty_sum / samples;
        let pct = avg_on_ms / self.window_ms as f32 * 100.0;
        self.duty_percent = pct.clamp(0.0, 100.0) as u8;
        self.duty_sum = 0.0;
    }

    fn reset_accumulators(&mut self) {
        self.duty_sum = 0.0;
        self.duty_percent = 0;
    }
}
