//! Discrete PID controller for oven temperature.
//!
//! Derivative acts on the measurement rather than the error so that a
//! setpoint change does not produce a derivative kick.  The integral
//! term is accumulated already scaled by `ki` and clamped to the output
//! limits, which keeps it from winding up while the relay is saturated
//! during a long ramp.

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    setpoint: f32,
    /// Integral contribution, already multiplied by `ki`.
    integral: f32,
    prev_measurement: Option<f32>,
    output_min: f32,
    output_max: f32,
}

impl PidController {
    pub fn new(kp: f32, ki: f32, kd: f32, setpoint: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            setpoint,
            integral: 0.0,
            prev_measurement: None,
            output_min: 0.0,
            output_max: 100.0,
        }
    }

    /// Set output limits
    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
        self.integral = self.integral.clamp(min, max);
    }

    /// Update setpoint
    pub fn set_target(&mut self, setpoint: f32) {
        self.setpoint = setpoint;
    }

    pub fn target(&self) -> f32 {
        self.setpoint
    }

    /// Compute PID output given current measurement and the time since the
    /// previous compute in seconds.
    pub fn compute(&mut self, measurement: f32, dt: f32) -> f32 {
        let error = self.setpoint - measurement;

        self.integral = (self.integral + self.ki * error * dt).clamp(self.output_min, self.output_max);

        let d_input = match self.prev_measurement {
            Some(prev) if dt > 0.0 => (measurement - prev) / dt,
            _ => 0.0,
        };
        self.prev_measurement = Some(measurement);

        let output = self.kp * error + self.integral - self.kd * d_input;
        output.clamp(self.output_min, self.output_max)
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_measurement = None;
    }
}
