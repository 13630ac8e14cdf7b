//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch.  Intents arrive in `ctx.request` and are consumed (or
//! dropped by the engine) within the tick that sees them.
//!
//! ```text
//!          Start                 Pause
//!  IDLE ───────────▶ HEATING ───────────▶ HEATING_PAUSED
//!   ▲  │              │  ▲ NextStep          │
//!   │  │ Start on     │  └───┘               │ Pause / Continue
//!   │  │ event step   │ step done, event     ▼
//!   │  └─────────┐    ▼                   HEATING
//!   │            SPECIAL_EVENT ──[event done, heat step]──▶ HEATING
//!   │                 │
//!   └──── Stop ───────┴─── (from any state) ───
//! ```
//!
//! A special event runs its own Begin → Handling → End progression in
//! `ctx.special` so it can span many ticks.

use log::{Level, debug, info, warn};

use super::context::{FsmContext, Phase, Request};
use super::{StateDescriptor, StateId};
use crate::alerts::{CHIME, END_ALARM, HOLD, PREHEAT_REACHED};
use crate::app::events::AppEvent;
use crate::app::ports::ButtonGroup;
use crate::recipe::{EventCode, Step};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: Heating
        StateDescriptor {
            id: StateId::Heating,
            name: "Heating",
            on_enter: Some(heating_enter),
            on_exit: None,
            on_update: heating_update,
        },
        // Index 2: HeatingPaused
        StateDescriptor {
            id: StateId::HeatingPaused,
            name: "HeatingPaused",
            on_enter: Some(paused_enter),
            on_exit: Some(paused_exit),
            on_update: paused_update,
        },
        // Index 3: SpecialEvent
        StateDescriptor {
            id: StateId::SpecialEvent,
            name: "SpecialEvent",
            on_enter: Some(special_enter),
            on_exit: Some(special_exit),
            on_update: special_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.heater.stop();
    ctx.heater_done = false;
    ctx.view.buttons = ButtonGroup::Start;
    ctx.show_preview();
    info!("IDLE: heater off, editing enabled");
}

fn idle_update(ctx: &mut FsmContext) -> Option<StateId> {
    // A completion racing a Stop has nothing left to advance.
    ctx.heater_done = false;
    match ctx.request.take() {
        Some(Request::Start) => start_from_idle(ctx),
        Some(other) => {
            debug!("IDLE: {:?} ignored", other);
            None
        }
        None => None,
    }
}

fn start_from_idle(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.sequencer.is_loaded() {
        return match ctx.sequencer.current() {
            Step::Heat { temperature, secs } => {
                let temp = ctx.config.clamp_temperature(temperature);
                let secs = ctx.config.clamp_duration(secs);
                ctx.start_session(temp, secs);
                Some(StateId::Heating)
            }
            Step::Event(_) => Some(StateId::SpecialEvent),
            Step::End => {
                warn!("IDLE: start ignored, curve has no step to run");
                None
            }
        };
    }

    let temp = ctx.config.clamp_temperature(ctx.setpoint.temp_c);
    let secs = ctx.config.clamp_duration(ctx.setpoint.secs);
    if secs == 0 {
        ctx.note(Level::Warn, format_args!("start ignored, no duration set"));
        return None;
    }
    ctx.start_session(temp, secs);
    Some(StateId::Heating)
}

// ═══════════════════════════════════════════════════════════════════════════
//  HEATING state
// ═══════════════════════════════════════════════════════════════════════════

fn heating_enter(ctx: &mut FsmContext) {
    ctx.view.buttons = ButtonGroup::PauseStop;
}

fn heating_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.heater_done {
        ctx.heater_done = false;
        ctx.complete_step();
    }

    // The curve reached a special event.  Only Stop outranks it; any other
    // intent was aimed at the session that just ended.
    if ctx.special_pending && ctx.request != Some(Request::Stop) {
        ctx.special_pending = false;
        return Some(StateId::SpecialEvent);
    }

    match ctx.request.take() {
        Some(Request::Stop) => {
            ctx.stop_all();
            Some(StateId::Idle)
        }
        Some(Request::Pause) => {
            ctx.heater.pause(ctx.now_ms);
            Some(StateId::HeatingPaused)
        }
        Some(Request::NextStep) => {
            if let Step::Heat { temperature, secs } = ctx.sequencer.current() {
                ctx.start_session(temperature, secs);
            }
            None
        }
        Some(other) => {
            debug!("HEATING: {:?} ignored", other);
            None
        }
        None => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  HEATING_PAUSED state
// ═══════════════════════════════════════════════════════════════════════════

fn paused_enter(ctx: &mut FsmContext) {
    ctx.view.buttons = ButtonGroup::ContinueStop;
    ctx.view.blink_time = true;
}

fn paused_exit(ctx: &mut FsmContext) {
    ctx.view.blink_time = false;
}

fn paused_update(ctx: &mut FsmContext) -> Option<StateId> {
    match ctx.request.take() {
        Some(Request::Stop) => {
            ctx.stop_all();
            Some(StateId::Idle)
        }
        Some(Request::Pause | Request::Continue) => {
            ctx.heater.resume(ctx.now_ms);
            Some(StateId::Heating)
        }
        // The session finished just as the pause landed; let Heating
        // handle the completion.
        _ if ctx.heater_done => Some(StateId::Heating),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  SPECIAL_EVENT state
// ═══════════════════════════════════════════════════════════════════════════

fn special_enter(ctx: &mut FsmContext) {
    ctx.clear_special();
    ctx.view.target_temp = None;
    ctx.view.target_time = None;
    if let Step::Event(ev) = ctx.sequencer.current() {
        ctx.special.event = Some(ev);
        let step = ctx.sequencer.index();
        ctx.emit(AppEvent::SpecialStarted { step, event: ev });
        ctx.note(
            Level::Info,
            format_args!("step {} event {} param {}", step, ev.code, ev.param),
        );
    }
}

fn special_exit(ctx: &mut FsmContext) {
    ctx.clear_special();
    ctx.view.blink_time = false;
    ctx.view.blink_frame = false;
}

fn special_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.request == Some(Request::Stop) {
        ctx.request = None;
        if ctx.special.event.is_some_and(|e| e.code == EventCode::End) {
            ctx.emit(AppEvent::SessionCompleted);
        }
        ctx.stop_all();
        return Some(StateId::Idle);
    }

    let Some(ev) = ctx.special.event else {
        warn!("SPECIAL: entered without an event step");
        ctx.stop_all();
        return Some(StateId::Idle);
    };

    match ev.code {
        EventCode::Preheating => preheating(ctx, ev.param),
        EventCode::Pause => pause_event(ctx),
        EventCode::Sound => {
            ctx.sound(CHIME);
            advance_after_special(ctx)
        }
        EventCode::End => end_event(ctx),
        EventCode::Timer => {
            // A heat-free countdown runs as an ordinary step at 0 °C so
            // pause and completion follow the normal heating path.
            ctx.heater.stop();
            ctx.start_session(0, ctx.config.clamp_duration(u32::from(ev.param)));
            ctx.view.target_temp = None;
            Some(StateId::Heating)
        }
    }
}

fn preheating(ctx: &mut FsmContext, param: u16) -> Option<StateId> {
    match ctx.special.phase {
        Phase::Begin => {
            let target = ctx.config.clamp_temperature(param);
            ctx.heater.stop();
            ctx.heater.set_temp_time(target, ctx.config.preheat_max_secs);
            ctx.heater.start(ctx.now_ms);
            ctx.heater_done = false;
            ctx.last_target_c = target;
            ctx.special.target_c = target;
            ctx.replace_special_alert(HOLD);
            ctx.view.target_temp = Some(target);
            ctx.view.target_time = None;
            ctx.view.blink_time = true;
            ctx.view.buttons = ButtonGroup::PauseStop;
            ctx.special.phase = Phase::Handling;
            None
        }
        Phase::Handling => {
            if ctx.special.reached && ctx.request == Some(Request::Continue) {
                ctx.request = None;
                ctx.finish_special();
                return None;
            }
            if ctx.heater_done {
                ctx.heater_done = false;
                let limit = ctx.config.preheat_max_secs;
                ctx.note(
                    Level::Warn,
                    format_args!("preheat not acknowledged within {limit}s, stopping"),
                );
                ctx.stop_all();
                return Some(StateId::Idle);
            }
            if (!ctx.special.reached && preheat_hold_toggled(ctx)) || ctx.special.held {
                return None;
            }
            if !ctx.special.reached
                && ctx.heater.current_temperature() >= f32::from(ctx.special.target_c)
            {
                ctx.special.reached = true;
                ctx.replace_special_alert(PREHEAT_REACHED);
                ctx.view.buttons = ButtonGroup::ContinueStop;
                let target = ctx.special.target_c;
                ctx.note(Level::Info, format_args!("preheat reached {target}C"));
            }
            None
        }
        Phase::End => {
            ctx.heater.stop();
            advance_after_special(ctx)
        }
    }
}

/// Pause or resume the preheat ramp.  The preheat limit does not run
/// while the ramp is held.  Returns true if the request was taken.
fn preheat_hold_toggled(ctx: &mut FsmContext) -> bool {
    match (ctx.request, ctx.special.held) {
        (Some(Request::Pause), false) => {
            ctx.request = None;
            ctx.heater.pause(ctx.now_ms);
            ctx.special.held = true;
            ctx.view.buttons = ButtonGroup::ContinueStop;
            ctx.note(Level::Info, format_args!("preheat held"));
            true
        }
        (Some(Request::Pause | Request::Continue), true) => {
            ctx.request = None;
            ctx.heater.resume(ctx.now_ms);
            ctx.special.held = false;
            ctx.view.buttons = ButtonGroup::PauseStop;
            ctx.note(Level::Info, format_args!("preheat resumed"));
            true
        }
        _ => false,
    }
}

fn pause_event(ctx: &mut FsmContext) -> Option<StateId> {
    match ctx.special.phase {
        Phase::Begin => {
            let hold = ctx.last_target_c;
            ctx.heater.stop();
            ctx.heater.set_temp_time(hold, ctx.config.pause_max_secs);
            ctx.heater.start(ctx.now_ms);
            ctx.heater_done = false;
            ctx.replace_special_alert(HOLD);
            ctx.view.target_temp = (hold > 0).then_some(hold);
            ctx.view.target_time = None;
            ctx.view.blink_time = true;
            ctx.view.buttons = ButtonGroup::ContinueStop;
            ctx.special.phase = Phase::Handling;
            None
        }
        Phase::Handling => {
            if ctx.request == Some(Request::Continue) {
                ctx.request = None;
                ctx.finish_special();
            } else if ctx.heater_done {
                let limit = ctx.config.pause_max_secs;
                ctx.note(
                    Level::Info,
                    format_args!("pause limit {limit}s reached, continuing"),
                );
                ctx.finish_special();
            }
            None
        }
        Phase::End => {
            ctx.heater.stop();
            advance_after_special(ctx)
        }
    }
}

fn end_event(ctx: &mut FsmContext) -> Option<StateId> {
    match ctx.special.phase {
        Phase::Begin => {
            ctx.heater.stop();
            ctx.replace_special_alert(END_ALARM);
            ctx.special.last_alarm_ms = ctx.now_ms;
            ctx.view.blink_frame = true;
            ctx.view.buttons = ButtonGroup::ContinueStop;
            ctx.special.phase = Phase::Handling;
            None
        }
        Phase::Handling => {
            let since = ctx.now_ms.wrapping_sub(ctx.special.last_alarm_ms);
            if since >= ctx.config.end_alarm_period_ms {
                ctx.replace_special_alert(END_ALARM);
                ctx.special.last_alarm_ms = ctx.now_ms;
            }
            if ctx.request == Some(Request::Continue) {
                ctx.request = None;
                ctx.finish_special();
            }
            None
        }
        Phase::End => {
            ctx.emit(AppEvent::SessionCompleted);
            ctx.note(Level::Info, format_args!("bake curve done"));
            ctx.stop_all();
            Some(StateId::Idle)
        }
    }
}

/// Move past a finished special event, as if its step had completed.
fn advance_after_special(ctx: &mut FsmContext) -> Option<StateId> {
    match ctx.sequencer.advance() {
        Step::Heat { temperature, secs } => {
            ctx.start_session(temperature, secs);
            Some(StateId::Heating)
        }
        // Re-entering the state loads the next event.
        Step::Event(_) => Some(StateId::SpecialEvent),
        Step::End => {
            ctx.emit(AppEvent::SessionCompleted);
            ctx.note(Level::Info, format_args!("bake curve done"));
            ctx.stop_all();
            Some(StateId::Idle)
        }
    }
}
