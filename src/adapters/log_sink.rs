//! Log-based adapters.
//!
//! [`LogEventSink`] writes structured application events to the logger
//! (UART / USB-CDC in production).  [`ConsoleRemoteLog`] is the remote-log
//! endpoint used when no network logger is attached, and [`LogDisplay`]
//! mirrors display updates to the console for headless bring-up.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{Blink, ButtonGroup, DisplayPort, EventSink, Icon, RemoteLog};

// ───────────────────────────────────────────────────────────────
// Event sink
// ───────────────────────────────────────────────────────────────

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | state={:?} | T={:.1}/{}\u{00b0}C | remaining={}s | \
                     duty={}% relay={} | lock_faults={}",
                    t.state,
                    t.current_c,
                    t.target_c,
                    t.remaining_secs,
                    t.duty_percent,
                    if t.energized { "ON" } else { "OFF" },
                    t.lock_faults,
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::StepStarted {
                step,
                temp_c,
                secs,
            } => match step {
                Some(i) => info!("STEP  | #{i} {temp_c}\u{00b0}C for {secs}s"),
                None => info!("STEP  | manual {temp_c}\u{00b0}C for {secs}s"),
            },
            AppEvent::SpecialStarted { step, event } => {
                info!("STEP  | #{step} {} ({})", event.code, event.param);
            }
            AppEvent::SessionCompleted => info!("DONE  | session complete"),
            AppEvent::RecipeRejected { curve, error } => {
                warn!("RECIPE| #{curve} rejected: {error}");
            }
            AppEvent::SensorFault => warn!("FAULT | thermocouple"),
            AppEvent::SensorRecovered => info!("FAULT | thermocouple recovered"),
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Remote log
// ───────────────────────────────────────────────────────────────

/// Remote log that forwards lines to the console.  Counts what it wrote.
#[derive(Default)]
pub struct ConsoleRemoteLog {
    lines: u32,
}

impl ConsoleRemoteLog {
    pub fn lines(&self) -> u32 {
        self.lines
    }
}

impl RemoteLog for ConsoleRemoteLog {
    fn log_write(&mut self, line: &str) {
        self.lines = self.lines.wrapping_add(1);
        info!(target: "remote", "{line}");
    }
}

// ───────────────────────────────────────────────────────────────
// Display mirror
// ───────────────────────────────────────────────────────────────

/// Display port that logs each field update at debug level.
#[derive(Default)]
pub struct LogDisplay;

impl DisplayPort for LogDisplay {
    fn set_current_temperature(&mut self, c: Option<u16>) {
        debug!(target: "display", "current_temp={c:?}");
    }

    fn set_target_temperature(&mut self, c: Option<u16>) {
        debug!(target: "display", "target_temp={c:?}");
    }

    fn set_current_time(&mut self, secs: Option<u32>) {
        debug!(target: "display", "current_time={secs:?}");
    }

    fn set_target_time(&mut self, secs: Option<u32>) {
        debug!(target: "display", "target_time={secs:?}");
    }

    fn set_button_group(&mut self, group: ButtonGroup) {
        debug!(target: "display", "buttons={group:?}");
    }

    fn set_editing_enabled(&mut self, on: bool) {
        debug!(target: "display", "editing={on}");
    }

    fn set_blink(&mut self, what: Blink, on: bool) {
        debug!(target: "display", "blink {what:?}={on}");
    }

    fn set_time_progress(&mut self, permille: u16) {
        debug!(target: "display", "time_progress={permille}");
    }

    fn set_temperature_progress(&mut self, percent: u8) {
        debug!(target: "display", "temp_progress={percent}");
    }

    fn set_recipe_name(&mut self, name: &str) {
        debug!(target: "display", "recipe={name}");
    }

    fn set_icon(&mut self, icon: Icon, on: bool) {
        debug!(target: "display", "icon {icon:?}={on}");
    }
}
