//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the controller FSM and its context.  It exposes a
//! hardware-agnostic API: commands from the front-end go in through
//! [`AppService::handle_command`], and every controller tick pushes state
//! out through the display, remote-log and event-sink ports.
//!
//! ```text
//!  AppCommand ──▶ ┌──────────────────────────┐ ──▶ DisplayPort
//!                 │        AppService         │ ──▶ RemoteLog
//! Notifications ─▶│  FSM · Sequencer · View   │ ──▶ EventSink
//!                 └──────────────────────────┘
//!                   │ heater / alerts (shared)
//! ```

use std::sync::Arc;

use log::{Level, debug, info};

use crate::alerts::{CLICK, RECIPE_REJECTED};
use crate::config::SystemConfig;
use crate::error;
use crate::events::Notifications;
use crate::fsm::context::{FsmContext, Request, Setpoint};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::heater::HeaterState;
use crate::recipe::MANUAL_NAME;
use crate::tasks::Shared;

use super::commands::AppCommand;
use super::display::{DisplayModel, temp_percent, time_permille, whole_degrees};
use super::events::{AppEvent, TelemetryData};
use super::ports::{
    DisplayPort, EventSink, OptionKey, OptionStore, RecipeStore, RemoteLog, StorageError,
};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all controller logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    notify: Arc<Notifications>,
    /// What the display currently shows.
    shown: Option<DisplayModel>,
    link_up: bool,
    sound_on: bool,
    last_telemetry_ms: u32,
}

impl AppService {
    /// Construct the service.  Does **not** start the FSM; call
    /// [`start`](Self::start) next.
    pub fn new(shared: &Shared) -> Self {
        let ctx = FsmContext::new(
            shared.config.clone(),
            Arc::clone(&shared.heater),
            Arc::clone(&shared.alerts),
        );
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx,
            notify: Arc::clone(&shared.notify),
            shown: None,
            link_up: false,
            sound_on: true,
            last_telemetry_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Apply stored options and enter Idle.
    pub fn start(&mut self, options: &impl OptionStore, sink: &mut impl EventSink) {
        self.sound_on = options.option_enabled(OptionKey::HeatingSound);
        self.ctx.alerts.activate(self.sound_on);
        self.fsm.start(&mut self.ctx);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("AppService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one controller tick: notifications → FSM → display → logs.
    pub fn tick(
        &mut self,
        now_ms: u32,
        display: &mut impl DisplayPort,
        remote: &mut impl RemoteLog,
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;

        // 1. Cross-task notifications, taken once per tick
        // A completion signalled just before the controller replaced the
        // session belongs to the old one.
        if self.notify.take_heater_done()
            && !matches!(
                self.ctx.heater.state(),
                Some(HeaterState::Processing | HeaterState::Paused)
            )
        {
            self.ctx.heater_done = true;
        }
        if let Some(faulted) = self.notify.take_sensor_fault() {
            if faulted {
                self.ctx.emit(AppEvent::SensorFault);
                self.ctx.note(Level::Error, format_args!("sensor fault, heater held off"));
            } else {
                self.ctx.emit(AppEvent::SensorRecovered);
                self.ctx.note(Level::Info, format_args!("sensor recovered"));
            }
        }
        if let Some(up) = self.notify.take_link_state() {
            self.link_up = up;
            debug!("Link {}", if up { "up" } else { "down" });
        }

        // 2. Controller FSM
        let prev = self.fsm.current_state();
        self.fsm.tick(&mut self.ctx);
        let next = self.fsm.current_state();
        if next != prev {
            self.ctx.emit(AppEvent::StateChanged { from: prev, to: next });
        }

        // 3. Display
        self.refresh_display(now_ms, display);

        // 4. Telemetry
        let interval_ms = self.ctx.config.telemetry_interval_secs.saturating_mul(1000);
        if now_ms.wrapping_sub(self.last_telemetry_ms) >= interval_ms {
            self.last_telemetry_ms = now_ms;
            if let Some(t) = self.build_telemetry() {
                self.ctx.emit(AppEvent::Telemetry(t));
            }
        }

        // 5. Outbound events and remote log
        self.flush(sink);
        self.ctx.drain_remote_log(|line| remote.log_write(line));
    }

    // ── Command handling ──────────────────────────────────────

    /// Process one front-end command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u32,
        store: &mut (impl RecipeStore + OptionStore),
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;
        if cmd.is_button() && store.option_enabled(OptionKey::MenuSound) {
            self.ctx.sound(CLICK);
        }

        let what = cmd.label();
        if let Err(e) = self.apply_command(cmd, store) {
            self.ctx.note(Level::Warn, format_args!("{what} failed: {e}"));
        }

        self.flush(sink);
    }

    fn apply_command(
        &mut self,
        cmd: AppCommand,
        store: &mut (impl RecipeStore + OptionStore),
    ) -> error::Result<()> {
        match cmd {
            AppCommand::SetTemperature(t) => {
                let t = self.ctx.config.clamp_temperature(t);
                self.edit_setpoint(|sp| sp.temp_c = t);
            }
            AppCommand::SetTime(secs) => {
                let secs = self.ctx.config.clamp_duration(secs);
                self.edit_setpoint(|sp| sp.secs = secs);
            }
            AppCommand::Start => self.ctx.request(Request::Start),
            AppCommand::Pause => self.ctx.request(Request::Pause),
            AppCommand::Stop => self.ctx.request(Request::Stop),
            AppCommand::Continue => self.ctx.request(Request::Continue),
            AppCommand::PickRecipe { index, long_press } => {
                self.pick_recipe(index, long_press, store)?;
            }
            AppCommand::AdjustTime { minutes } => self.adjust_time(minutes),
            AppCommand::RemoveRecipes(indices) => {
                if self.idle_or_log("remove recipes") {
                    let res = store.remove_bakes(&indices);
                    self.after_list_edit(res.map(|()| 0), store)?;
                }
            }
            AppCommand::SwapRecipes(a, b) => {
                if self.idle_or_log("swap recipes") {
                    let res = store.swap_bakes(a, b);
                    self.after_list_edit(res.map(|()| 0), store)?;
                }
            }
            AppCommand::ImportRecipes(data) => {
                let res = store.add_bakes_from_file(&data);
                let n = self.after_list_edit(res, store)?;
                self.ctx
                    .note(Level::Info, format_args!("imported {n} recipes"));
            }
            AppCommand::SetOption(key, value) => {
                if key == OptionKey::HeatingSound {
                    self.sound_on = value != 0;
                    self.ctx.alerts.activate(self.sound_on);
                }
                store.set_option(key, value)?;
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot.  `None` if the heater lock was busy.
    pub fn build_telemetry(&self) -> Option<TelemetryData> {
        let snap = self.ctx.heater.snapshot(self.ctx.now_ms)?;
        Some(TelemetryData {
            state: self.fsm.current_state(),
            current_c: self.ctx.heater.current_temperature(),
            target_c: snap.target_c,
            remaining_secs: snap.remaining_ms / 1000,
            duty_percent: snap.duty_percent,
            energized: snap.energized,
            lock_faults: self.ctx.heater.fault_count() + self.ctx.alerts.fault_count(),
        })
    }

    /// Current controller state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Manual-mode setpoint.
    pub fn setpoint(&self) -> Setpoint {
        self.ctx.setpoint
    }

    /// Loaded curve name, or the manual label.
    pub fn recipe_name(&self) -> &str {
        self.ctx.sequencer.name().unwrap_or(MANUAL_NAME)
    }

    /// Step cursor of the loaded curve.
    pub fn recipe_step(&self) -> Option<usize> {
        self.ctx
            .sequencer
            .is_loaded()
            .then(|| self.ctx.sequencer.index())
    }

    pub fn config(&self) -> &SystemConfig {
        &self.ctx.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn flush(&mut self, sink: &mut impl EventSink) {
        for event in self.ctx.outbox.drain(..) {
            sink.emit(&event);
        }
    }

    fn idle_or_log(&mut self, what: &str) -> bool {
        let state = self.fsm.current_state();
        if state.is_busy() {
            debug!("{what} ignored in {state:?}");
            return false;
        }
        true
    }

    /// Manual edit while idle.  A loaded curve is dropped.
    fn edit_setpoint(&mut self, f: impl FnOnce(&mut Setpoint)) {
        if !self.idle_or_log("setpoint edit") {
            return;
        }
        if self.ctx.sequencer.is_loaded() {
            self.ctx.sequencer.clear();
            debug!("Manual edit, recipe released");
        }
        f(&mut self.ctx.setpoint);
        self.ctx.show_preview();
    }

    fn adjust_time(&mut self, minutes: i32) {
        let delta_secs = minutes.saturating_mul(60);
        match self.fsm.current_state() {
            StateId::Idle => {
                let secs = (i64::from(self.ctx.setpoint.secs) + i64::from(delta_secs))
                    .clamp(0, i64::from(u32::MAX)) as u32;
                let secs = self.ctx.config.clamp_duration(secs);
                self.edit_setpoint(|sp| sp.secs = secs);
            }
            StateId::Heating | StateId::HeatingPaused => {
                self.ctx.heater.adjust_time(delta_secs, self.ctx.now_ms);
                if let Some(snap) = self.ctx.heater.snapshot(self.ctx.now_ms) {
                    if snap.state != HeaterState::Stopped {
                        self.ctx.view.target_time = Some(snap.duration_ms / 1000);
                    }
                }
            }
            StateId::SpecialEvent => debug!("time adjust ignored during special event"),
        }
    }

    fn pick_recipe(
        &mut self,
        index: usize,
        long_press: bool,
        store: &impl RecipeStore,
    ) -> error::Result<()> {
        if !self.idle_or_log("recipe pick") {
            return Ok(());
        }
        let config = self.ctx.config.clone();
        if let Err(error) = self.ctx.sequencer.load(store, index, &config) {
            self.ctx.sound(RECIPE_REJECTED);
            self.ctx.emit(AppEvent::RecipeRejected {
                curve: index,
                error,
            });
            return Err(error.into());
        }
        self.ctx.show_preview();
        if long_press {
            self.ctx.request(Request::Start);
        }
        Ok(())
    }

    /// Persist the list and fall back to manual if the loaded curve may
    /// have moved.  Returns the edit's count.
    fn after_list_edit(
        &mut self,
        res: Result<usize, StorageError>,
        store: &mut impl RecipeStore,
    ) -> error::Result<usize> {
        if self.ctx.sequencer.is_loaded() && self.fsm.current_state() == StateId::Idle {
            self.ctx.sequencer.clear();
            self.ctx.show_preview();
        }
        let n = res?;
        store.store_bake_list()?;
        Ok(n)
    }

    fn refresh_display(&mut self, now_ms: u32, display: &mut impl DisplayPort) {
        // Busy heater lock: keep what is shown until the next tick.
        let Some(snap) = self.ctx.heater.snapshot(now_ms) else {
            return;
        };
        let running = snap.state != HeaterState::Stopped;
        let current_c = self.ctx.heater.current_temperature();
        let view = self.ctx.view;
        let name = self.ctx.sequencer.name().unwrap_or(MANUAL_NAME);

        let model = DisplayModel {
            current_temp: whole_degrees(current_c),
            target_temp: view.target_temp,
            current_time: running.then_some(snap.elapsed_ms / 1000),
            target_time: view.target_time,
            buttons: view.buttons,
            editing: self.fsm.current_state() == StateId::Idle,
            blink_time: view.blink_time,
            blink_frame: view.blink_frame,
            time_permille: if running && view.target_time.is_some() {
                time_permille(snap.elapsed_ms, snap.duration_ms)
            } else {
                0
            },
            temp_percent: temp_percent(current_c, view.target_temp),
            recipe_name: heapless::String::try_from(name).unwrap_or_default(),
            power: snap.energized,
            sound: self.sound_on,
            network: self.link_up,
        };

        if self.shown.as_ref() != Some(&model) {
            model.apply(self.shown.as_ref(), display);
            self.shown = Some(model);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoOptions;

    impl OptionStore for NoOptions {
        fn get_option(&self, _: OptionKey) -> Option<i32> {
            None
        }
        fn set_option(&mut self, _: OptionKey, _: i32) -> Result<(), StorageError> {
            Ok(())
        }
    }

    struct Sink(Vec<AppEvent>);

    impl EventSink for Sink {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    #[test]
    fn telemetry_reflects_heater() {
        let shared = Shared::new(SystemConfig::default());
        let mut app = AppService::new(&shared);
        let mut sink = Sink(Vec::new());
        app.start(&NoOptions, &mut sink);
        assert_eq!(sink.0, vec![AppEvent::Started(StateId::Idle)]);

        shared.heater.set_temp_time(150, 60);
        let t = app.build_telemetry().unwrap();
        assert_eq!(t.state, StateId::Idle);
        assert_eq!(t.target_c, 150);
        assert_eq!(t.lock_faults, 0);
    }

    #[test]
    fn recipe_name_defaults_to_manual() {
        let shared = Shared::new(SystemConfig::default());
        let app = AppService::new(&shared);
        assert_eq!(app.recipe_name(), MANUAL_NAME);
        assert_eq!(app.recipe_step(), None);
    }
}
