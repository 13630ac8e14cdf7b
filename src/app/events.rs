//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, forward to a remote
//! console, etc.

use crate::error::RecipeError;
use crate::fsm::StateId;
use crate::recipe::SpecialEvent;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// The controller transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A heater session was programmed and started.
    /// `step` is `None` in manual mode.
    StepStarted {
        step: Option<usize>,
        temp_c: u16,
        secs: u32,
    },

    /// A bake-curve special event began.
    SpecialStarted { step: usize, event: SpecialEvent },

    /// A manual session or a whole bake curve ran to completion.
    SessionCompleted,

    /// A recipe pickup was aborted.
    RecipeRejected { curve: usize, error: RecipeError },

    /// The sensor failsafe latched.
    SensorFault,

    /// The sensor failsafe cleared.
    SensorRecovered,

    /// The application service has started (carries initial state).
    Started(StateId),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryData {
    pub state: StateId,
    pub current_c: f32,
    pub target_c: u16,
    pub remaining_secs: u32,
    pub duty_percent: u8,
    pub energized: bool,
    /// Bounded-wait lock timeouts since boot (heater + alerts).
    pub lock_faults: u32,
}
