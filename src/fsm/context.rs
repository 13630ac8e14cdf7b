//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to: the user's pending intent, the heater and alert handles, the
//! bake-curve cursor, the special-event progression and the view state
//! the service pushes to the display.  Think of it as the "blackboard" in
//! a blackboard architecture.

use core::fmt::{self, Write as _};
use std::sync::Arc;

use heapless::{Deque, String};
use log::{Level, debug};

use crate::alerts::{AlertHandle, AlertPattern, STEP_DONE, SharedAlerts};
use crate::app::events::AppEvent;
use crate::app::ports::ButtonGroup;
use crate::config::SystemConfig;
use crate::heater::HeaterSession;
use crate::recipe::{SpecialEvent, Step};
use crate::sequencer::Sequencer;

/// Longest remote log line; longer lines are truncated.
pub const LOG_LINE_LEN: usize = 96;
/// Remote log lines buffered between ticks; the oldest is dropped first.
pub const LOG_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// User / callback intent
// ---------------------------------------------------------------------------

/// An intent marshalled into the next controller tick.
///
/// One slot, consumed or discarded within the tick that sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Start,
    /// Reprogram the heater with the sequencer's current heat step.
    NextStep,
    Pause,
    Stop,
    Continue,
}

/// Manual-mode target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setpoint {
    pub temp_c: u16,
    pub secs: u32,
}

// ---------------------------------------------------------------------------
// Special-event progression
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Begin,
    Handling,
    End,
}

#[derive(Debug, Default)]
pub struct SpecialProgress {
    pub event: Option<SpecialEvent>,
    pub phase: Phase,
    /// PREHEATING: clamped target.
    pub target_c: u16,
    /// PREHEATING: target reached, waiting for the user.
    pub reached: bool,
    /// PREHEATING: ramp paused by the user.
    pub held: bool,
    pub alert: Option<AlertHandle>,
    /// END: when the last alarm burst was scheduled.
    pub last_alarm_ms: u32,
}

// ---------------------------------------------------------------------------
// View state (written by handlers; applied to the display by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub buttons: ButtonGroup,
    pub blink_time: bool,
    pub blink_frame: bool,
    pub target_temp: Option<u16>,
    pub target_time: Option<u32>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            buttons: ButtonGroup::Start,
            blink_time: false,
            blink_frame: false,
            target_temp: None,
            target_time: None,
        }
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    /// Wall-clock milliseconds for this tick (wrapping).
    pub now_ms: u32,

    // -- Configuration --
    pub config: SystemConfig,

    // -- Collaborators --
    pub heater: Arc<HeaterSession>,
    pub alerts: Arc<SharedAlerts>,
    pub sequencer: Sequencer,

    // -- Intent --
    pub setpoint: Setpoint,
    pub request: Option<Request>,
    /// Heater completion seen but not yet handled.
    pub heater_done: bool,
    /// The sequencer reached a special event; dispatch it next.
    pub special_pending: bool,
    pub special: SpecialProgress,
    /// Target of the last heat step, held by a PAUSE event.
    pub last_target_c: u16,

    // -- Outputs --
    pub view: ViewState,
    /// Application events produced this tick.
    pub outbox: Vec<AppEvent>,
    remote_log: Deque<String<LOG_LINE_LEN>, LOG_DEPTH>,
}

impl FsmContext {
    pub fn new(config: SystemConfig, heater: Arc<HeaterSession>, alerts: Arc<SharedAlerts>) -> Self {
        let setpoint = Setpoint {
            temp_c: config.target_temp_min_c,
            secs: 0,
        };
        Self {
            now_ms: 0,
            config,
            heater,
            alerts,
            sequencer: Sequencer::new(),
            setpoint,
            request: None,
            heater_done: false,
            special_pending: false,
            special: SpecialProgress::default(),
            last_target_c: 0,
            view: ViewState::default(),
            outbox: Vec::new(),
            remote_log: Deque::new(),
        }
    }

    /// Post an intent for the next tick.  A pending Stop is never replaced.
    pub fn request(&mut self, r: Request) {
        match self.request {
            Some(Request::Stop) if r != Request::Stop => {
                debug!("{:?} dropped, Stop pending", r);
            }
            _ => self.request = Some(r),
        }
    }

    /// Log locally and queue the same line for the remote console.
    pub fn note(&mut self, level: Level, args: fmt::Arguments<'_>) {
        log::log!(level, "{}", args);
        let mut line = String::new();
        let _ = line.write_fmt(args);
        if self.remote_log.is_full() {
            self.remote_log.pop_front();
        }
        let _ = self.remote_log.push_back(line);
    }

    /// Hand every queued remote log line to `f`, oldest first.
    pub fn drain_remote_log(&mut self, mut f: impl FnMut(&str)) {
        while let Some(line) = self.remote_log.pop_front() {
            f(&line);
        }
    }

    pub fn emit(&mut self, event: AppEvent) {
        self.outbox.push(event);
    }

    pub fn sound(&self, pattern: AlertPattern) -> Option<AlertHandle> {
        self.alerts.add(self.now_ms, pattern)
    }

    // ── Heater programming ────────────────────────────────────────

    /// Program and start one heater session.  The heater must be stopped.
    ///
    /// A completion seen before this call belongs to an earlier session
    /// and is discarded.
    pub fn start_session(&mut self, temp_c: u16, secs: u32) {
        self.heater_done = false;
        self.heater.set_temp_time(temp_c, secs);
        self.heater.start(self.now_ms);
        self.last_target_c = temp_c;
        self.view.target_temp = (temp_c > 0).then_some(temp_c);
        self.view.target_time = Some(secs);

        let step = self.sequencer.is_loaded().then(|| self.sequencer.index());
        self.emit(AppEvent::StepStarted { step, temp_c, secs });
        match step {
            Some(i) => self.note(
                Level::Info,
                format_args!("step {} start {}C {}s", i, temp_c, secs),
            ),
            None => self.note(
                Level::Info,
                format_args!("manual start {}C {}s", temp_c, secs),
            ),
        }
    }

    /// React to a finished heater session: advance the curve and post the
    /// follow-up intent.
    pub fn complete_step(&mut self) {
        self.sound(STEP_DONE);
        if !self.sequencer.is_loaded() {
            self.note(Level::Info, format_args!("manual session done"));
            self.emit(AppEvent::SessionCompleted);
            self.request(Request::Stop);
            return;
        }
        match self.sequencer.advance() {
            Step::Heat { .. } => self.request(Request::NextStep),
            Step::Event(_) => self.special_pending = true,
            Step::End => {
                self.note(Level::Info, format_args!("bake curve done"));
                self.emit(AppEvent::SessionCompleted);
                self.request(Request::Stop);
            }
        }
    }

    /// Stop heating and forget any in-flight step.  A loaded curve is
    /// re-armed at its first step.
    pub fn stop_all(&mut self) {
        self.heater.stop();
        self.heater_done = false;
        self.special_pending = false;
        self.clear_special();
        self.last_target_c = 0;
        if self.sequencer.is_loaded() {
            self.sequencer.rewind();
        }
    }

    /// Move the special event to its End phase.  Its hold session, if any,
    /// is over, so a completion from it is consumed here.
    pub fn finish_special(&mut self) {
        self.heater_done = false;
        self.special.phase = Phase::End;
    }

    /// Reset the special-event progression and cancel its alert.
    pub fn clear_special(&mut self) {
        if let Some(h) = self.special.alert.take() {
            self.alerts.delete(h);
        }
        self.special = SpecialProgress::default();
    }

    /// Swap the special-event alert for `pattern`.
    pub fn replace_special_alert(&mut self, pattern: AlertPattern) {
        if let Some(h) = self.special.alert.take() {
            self.alerts.delete(h);
        }
        self.special.alert = self.sound(pattern);
    }

    /// Targets shown while idle: the armed curve step or the manual
    /// setpoint.  An event parameter is never shown as a temperature.
    pub fn show_preview(&mut self) {
        let (temp, time) = if self.sequencer.is_loaded() {
            match self.sequencer.current() {
                Step::Heat { temperature, secs } => (Some(temperature), Some(secs)),
                Step::Event(_) | Step::End => (None, None),
            }
        } else {
            (Some(self.setpoint.temp_c), Some(self.setpoint.secs))
        };
        self.view.target_temp = temp;
        self.view.target_time = time;
    }
}
