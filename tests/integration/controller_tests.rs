//! End-to-end controller tests: commands in, relay / buzzer / display out.
//!
//! Every test runs the real sensor, heater and alert tasks plus the
//! application service against the simulated oven in [`Rig`].

use crate::mock_hw::{MockStore, Rig};

use electricstove::alerts::AlertPattern;
use electricstove::app::commands::AppCommand;
use electricstove::app::events::AppEvent;
use electricstove::app::ports::{ButtonGroup, OptionKey};
use electricstove::config::SystemConfig;
use electricstove::error::RecipeError;
use electricstove::fsm::StateId;
use electricstove::recipe::{EventCode, RawStep};

fn manual(rig: &mut Rig, temp_c: u16, secs: u32) {
    rig.cmd(AppCommand::SetTemperature(temp_c));
    rig.cmd(AppCommand::SetTime(secs));
    rig.cmd(AppCommand::Start);
    // The controller starts the session, the heater task drives the
    // relay on the following tick.
    rig.run_ms(20);
}

// ── Manual sessions ───────────────────────────────────────────

#[test]
fn manual_session_heats_and_stops_itself() {
    let mut rig = Rig::new(MockStore::default());
    rig.cmd(AppCommand::SetTemperature(180));
    rig.cmd(AppCommand::SetTime(120));
    rig.run_ms(10);
    assert_eq!(rig.display.target_temp, Some(180));
    assert_eq!(rig.display.target_time, Some(120));
    assert!(rig.display.editing);
    assert_eq!(rig.display.recipe_name, "Manual");

    rig.cmd(AppCommand::Start);
    rig.run_ms(20);
    assert_eq!(rig.app.state(), StateId::Heating);
    assert!(!rig.display.editing);
    assert_eq!(rig.display.buttons, Some(ButtonGroup::PauseStop));
    assert!(rig.relay_on(), "cold oven must call for heat");

    let done = rig.run_until(125_000, |r| r.app.state() == StateId::Idle);
    assert!(done, "manual session must end on its own");
    assert!(rig.now >= 120_000);
    assert!(!rig.relay_on());
    assert_eq!(rig.sink.count(|e| *e == AppEvent::SessionCompleted), 1);
    assert!(rig.sink.events.contains(&AppEvent::StateChanged {
        from: StateId::Heating,
        to: StateId::Idle,
    }));
    assert_eq!(rig.display.buttons, Some(ButtonGroup::Start));
}

#[test]
fn oven_holds_near_target() {
    let mut rig = Rig::new(MockStore::default());
    manual(&mut rig, 150, 900);
    rig.run_ms(600_000);
    let temp = rig.oven.borrow().temp_c;
    assert!(
        (110.0..=180.0).contains(&temp),
        "oven at {temp:.1}\u{00b0}C after 10 min"
    );
    assert_eq!(rig.app.state(), StateId::Heating);
}

#[test]
fn start_without_duration_is_ignored() {
    let mut rig = Rig::new(MockStore::default());
    rig.cmd(AppCommand::SetTemperature(180));
    rig.cmd(AppCommand::Start);
    rig.run_ms(10);
    assert_eq!(rig.app.state(), StateId::Idle);
    assert!(rig.remote.contains("no duration"));
}

#[test]
fn pause_and_resume_keep_remaining_time() {
    let mut rig = Rig::new(MockStore::default());
    manual(&mut rig, 180, 600);
    rig.run_ms(10_000);

    let before = rig.remaining_ms();
    rig.cmd(AppCommand::Pause);
    rig.run_ms(10);
    assert_eq!(rig.app.state(), StateId::HeatingPaused);
    assert!(!rig.relay_on(), "relay must drop while paused");
    assert!(rig.display.blink_time);
    assert_eq!(rig.display.buttons, Some(ButtonGroup::ContinueStop));

    rig.run_ms(30_000);
    assert_eq!(rig.app.state(), StateId::HeatingPaused);
    rig.cmd(AppCommand::Pause);
    rig.run_ms(10);
    assert_eq!(rig.app.state(), StateId::Heating);
    assert!(!rig.display.blink_time);

    let after = rig.remaining_ms();
    assert!(
        before.abs_diff(after) <= 20,
        "remaining {before} before pause, {after} after resume"
    );
}

#[test]
fn stop_from_pause_returns_to_idle() {
    let mut rig = Rig::new(MockStore::default());
    manual(&mut rig, 180, 600);
    rig.cmd(AppCommand::Pause);
    rig.run_ms(10);
    rig.cmd(AppCommand::Stop);
    rig.run_ms(10);
    assert_eq!(rig.app.state(), StateId::Idle);
    assert_eq!(rig.remaining_ms(), 0);
    assert!(!rig.relay_on());
}

#[test]
fn late_completion_does_not_end_a_new_session() {
    let mut rig = Rig::new(MockStore::default());
    manual(&mut rig, 180, 600);
    // Left over from a session that ended before this one started.
    rig.shared.notify.signal_heater_done();
    rig.run_ms(100);
    assert_eq!(rig.app.state(), StateId::Heating);
    assert!(!rig.sink.events.contains(&AppEvent::SessionCompleted));
    assert!(rig.remaining_ms() > 590_000);
}

#[test]
fn adjust_time_extends_a_running_session() {
    let mut rig = Rig::new(MockStore::default());
    manual(&mut rig, 180, 600);
    rig.cmd(AppCommand::AdjustTime { minutes: 5 });
    rig.run_ms(10);
    assert_eq!(rig.display.target_time, Some(900));
    assert!(rig.remaining_ms() > 890_000);

    rig.cmd(AppCommand::AdjustTime { minutes: -60 });
    rig.run_ms(10);
    // Never shorter than the time already spent.
    let done = rig.run_until(100, |r| r.app.state() == StateId::Idle);
    assert!(done);
}

#[test]
fn setpoint_edits_are_ignored_while_heating() {
    let mut rig = Rig::new(MockStore::default());
    manual(&mut rig, 180, 600);
    rig.cmd(AppCommand::SetTemperature(250));
    rig.run_ms(10);
    assert_eq!(rig.app.setpoint().temp_c, 180);
    assert_eq!(rig.shared.heater.snapshot(rig.now).unwrap().target_c, 180);
}

#[test]
fn setpoint_is_clamped_to_device_limits() {
    let mut rig = Rig::new(MockStore::default());
    rig.cmd(AppCommand::SetTemperature(5000));
    rig.cmd(AppCommand::SetTime(u32::MAX));
    let cfg = SystemConfig::default();
    assert_eq!(rig.app.setpoint().temp_c, cfg.target_temp_max_c);
    assert_eq!(rig.app.setpoint().secs, cfg.max_duration_secs);
}

// ── Recipes ───────────────────────────────────────────────────

#[test]
fn recipe_step_chain_enters_preheating() {
    let store = MockStore::default().with_bake(
        "Glaze",
        &[
            RawStep::heat(200, 60),
            RawStep::event(EventCode::Preheating, 150),
        ],
    );
    let mut rig = Rig::new(store);

    rig.cmd(AppCommand::PickRecipe {
        index: 0,
        long_press: false,
    });
    rig.run_ms(10);
    assert_eq!(rig.display.target_temp, Some(200));
    assert_eq!(rig.display.target_time, Some(60));
    assert_eq!(rig.display.recipe_name, "Glaze");

    rig.cmd(AppCommand::Start);
    rig.run_ms(10);
    assert_eq!(rig.app.state(), StateId::Heating);
    assert_eq!(rig.app.recipe_step(), Some(0));

    let entered = rig.run_until(61_000, |r| r.app.state() == StateId::SpecialEvent);
    assert!(entered);
    rig.run_ms(10);
    assert_eq!(rig.display.target_temp, Some(150));
    assert_eq!(rig.display.target_time, None);
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::SpecialStarted { step: 1, event } if event.code == EventCode::Preheating
            && event.param == 150
    )));

    // The oven is already past 150 °C: the user is asked to continue.
    let reached = rig.run_until(5_000, |r| {
        r.display.buttons == Some(ButtonGroup::ContinueStop)
    });
    assert!(reached);
    assert!(rig.remote.contains("preheat reached 150C"));

    rig.cmd(AppCommand::Continue);
    let idle = rig.run_until(100, |r| r.app.state() == StateId::Idle);
    assert!(idle);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::SessionCompleted), 1);
    // The curve is re-armed at its first step.
    assert_eq!(rig.app.recipe_step(), Some(0));
    assert_eq!(rig.display.target_temp, Some(200));
}

#[test]
fn long_press_picks_and_starts() {
    let store = MockStore::default().with_bake("Bread", &[RawStep::heat(220, 1500)]);
    let mut rig = Rig::new(store);
    rig.cmd(AppCommand::PickRecipe {
        index: 0,
        long_press: true,
    });
    rig.run_ms(10);
    assert_eq!(rig.app.state(), StateId::Heating);
    assert!(rig.sink.events.contains(&AppEvent::StepStarted {
        step: Some(0),
        temp_c: 220,
        secs: 1500,
    }));
}

#[test]
fn invalid_recipe_is_rejected_with_an_alert() {
    let store = MockStore::default().with_bake("Broken", &[RawStep::heat(999, 60)]);
    let mut rig = Rig::new(store);
    rig.cmd(AppCommand::PickRecipe {
        index: 0,
        long_press: true,
    });
    rig.run_ms(10);
    assert_eq!(rig.app.state(), StateId::Idle);
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::RecipeRejected {
            curve: 0,
            error: RecipeError::InvalidStep { .. }
        }
    )));
    assert!(rig.buzzer.beeps() > 0);
    assert!(rig.remote.contains("recipe pick failed: recipe: step"));
    assert_eq!(rig.app.recipe_name(), "Manual");
}

#[test]
fn missing_recipe_is_rejected() {
    let mut rig = Rig::new(MockStore::default());
    rig.cmd(AppCommand::PickRecipe {
        index: 3,
        long_press: false,
    });
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::RecipeRejected {
            curve: 3,
            error: RecipeError::UnknownCurve(3)
        }
    )));
}

#[test]
fn timer_event_counts_down_without_heat() {
    let store = MockStore::default().with_bake(
        "Rest",
        &[RawStep::event(EventCode::Timer, 30), RawStep::END],
    );
    let mut rig = Rig::new(store);
    rig.cmd(AppCommand::PickRecipe {
        index: 0,
        long_press: true,
    });
    let heating = rig.run_until(50, |r| r.app.state() == StateId::Heating);
    assert!(heating);
    assert_eq!(rig.display.target_temp, None);
    assert_eq!(rig.display.target_time, Some(30));
    rig.run_ms(1_000);
    assert!(!rig.relay_on());

    let idle = rig.run_until(31_000, |r| r.app.state() == StateId::Idle);
    assert!(idle);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::SessionCompleted), 1);
}

#[test]
fn end_event_alarms_until_acknowledged() {
    let store = MockStore::default().with_bake(
        "Finish",
        &[RawStep::heat(100, 5), RawStep::event(EventCode::End, 0)],
    );
    let mut rig = Rig::new(store);
    rig.cmd(AppCommand::PickRecipe {
        index: 0,
        long_press: true,
    });
    let special = rig.run_until(6_000, |r| r.app.state() == StateId::SpecialEvent);
    assert!(special);
    rig.run_ms(10);
    assert!(rig.display.blink_frame);

    let beeps = rig.buzzer.beeps();
    rig.run_ms(20_000);
    assert_eq!(rig.app.state(), StateId::SpecialEvent);
    assert!(rig.buzzer.beeps() > beeps + 4, "alarm must keep repeating");

    rig.cmd(AppCommand::Stop);
    rig.run_ms(10);
    assert_eq!(rig.app.state(), StateId::Idle);
    assert!(!rig.display.blink_frame);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::SessionCompleted), 1);
}

#[test]
fn list_edits_only_while_idle_and_persist() {
    let store = MockStore::default()
        .with_bake("A", &[RawStep::heat(100, 60)])
        .with_bake("B", &[RawStep::heat(120, 60)]);
    let mut rig = Rig::new(store);

    rig.cmd(AppCommand::SwapRecipes(0, 1));
    assert_eq!(rig.store.bakes[0].name, "B");
    assert_eq!(rig.store.stores, 1);

    rig.cmd(AppCommand::PickRecipe {
        index: 0,
        long_press: true,
    });
    rig.run_ms(10);
    rig.cmd(AppCommand::RemoveRecipes(vec![0]));
    assert_eq!(rig.store.bakes.len(), 2, "busy controller keeps the list");

    rig.cmd(AppCommand::Stop);
    rig.run_ms(10);
    rig.cmd(AppCommand::RemoveRecipes(vec![0]));
    assert_eq!(rig.store.bakes.len(), 1);
    assert_eq!(rig.app.recipe_name(), "Manual");
}

#[test]
fn import_appends_curves() {
    let mut rig = Rig::new(MockStore::default());
    let file = br#"[{"name": "Pizza", "steps": [{"temperature": 300, "duration": 600}]}]"#;
    rig.cmd(AppCommand::ImportRecipes(file.to_vec()));
    rig.run_ms(10);
    assert_eq!(rig.store.bakes.len(), 1);
    assert_eq!(rig.store.stores, 1);
    assert!(rig.remote.contains("imported 1 recipes"));

    rig.cmd(AppCommand::ImportRecipes(b"garbage".to_vec()));
    rig.run_ms(10);
    assert_eq!(rig.store.bakes.len(), 1);
    assert!(rig.remote.contains("recipe import failed: storage:"));
}

// ── Alerts and options ────────────────────────────────────────

#[test]
fn alert_handles_are_distinct_and_single_use() {
    let rig = Rig::new(MockStore::default());
    let alerts = &rig.shared.alerts;
    let pattern = AlertPattern::once(100);
    let a = alerts.add(0, pattern).unwrap();
    let b = alerts.add(0, pattern).unwrap();
    assert_ne!(a, b);
    assert_eq!(alerts.active_count(), 2);
    assert!(alerts.delete(a));
    assert!(!alerts.delete(a));
    assert!(alerts.is_scheduled(b));
}

#[test]
fn menu_sound_clicks_on_buttons() {
    let mut rig = Rig::new(MockStore::default());
    rig.cmd(AppCommand::Stop);
    rig.run_ms(20);
    assert_eq!(rig.buzzer.beeps(), 1);

    rig.cmd(AppCommand::SetOption(OptionKey::MenuSound, 0));
    rig.cmd(AppCommand::Stop);
    rig.run_ms(20);
    assert_eq!(rig.buzzer.beeps(), 1);
}

#[test]
fn heating_sound_off_mutes_the_buzzer() {
    let store = MockStore::default().with_option(OptionKey::HeatingSound, 0);
    let mut rig = Rig::new(store);
    rig.run_ms(10);
    assert!(!rig.display.icon("sound"));

    rig.cmd(AppCommand::Start);
    rig.run_ms(1_000);
    assert_eq!(rig.buzzer.beeps(), 0);

    rig.cmd(AppCommand::SetOption(OptionKey::HeatingSound, 1));
    rig.run_ms(10);
    assert!(rig.display.icon("sound"));
}

// ── Sensor supervision ────────────────────────────────────────

#[test]
fn sustained_bad_readings_fail_safe_then_recover() {
    let mut rig = Rig::new(MockStore::default());
    manual(&mut rig, 200, 3600);
    let max = rig.shared.config.max_allowed_temp_c;
    rig.oven.borrow_mut().reading_override = Some(Ok(900.0));

    // 100 bad samples are tolerated; the 101st trips the failsafe.
    rig.run_ms(100_000);
    assert!(!rig.sink.events.contains(&AppEvent::SensorFault));
    rig.run_ms(1_000);
    assert!(rig.sink.events.contains(&AppEvent::SensorFault));
    assert_eq!(rig.shared.temperature.latest(), Some(max));
    assert!(rig.remote.contains("sensor fault"));

    rig.run_ms(100);
    assert!(rig.buzzer.is_on(), "fault alert must sound");
    rig.run_ms(8_000);
    assert!(!rig.relay_on(), "failsafe must drop the relay");

    {
        let mut oven = rig.oven.borrow_mut();
        oven.reading_override = None;
        oven.temp_c = 120.0;
    }
    rig.run_ms(1_000);
    assert!(rig.sink.events.contains(&AppEvent::SensorRecovered));
    assert!(rig.shared.temperature.latest().unwrap() < max);
    rig.run_ms(500);
    assert!(!rig.buzzer.is_on(), "fault alert must be cancelled");
}

#[test]
fn muted_fault_still_drops_the_relay() {
    let store = MockStore::default().with_option(OptionKey::HeatingSound, 0);
    let mut rig = Rig::new(store);
    manual(&mut rig, 200, 3600);
    rig.oven.borrow_mut().reading_override = Some(Ok(900.0));

    rig.run_ms(101_000);
    assert!(rig.sink.events.contains(&AppEvent::SensorFault));
    assert!(rig.remote.contains("sensor fault"));

    rig.run_ms(8_000);
    assert!(!rig.relay_on(), "failsafe must not depend on sound");
    assert_eq!(rig.buzzer.beeps(), 0, "heating sound off mutes the fault alert");
}

// ── Display and telemetry ─────────────────────────────────────

#[test]
fn display_tracks_progress_and_power() {
    let mut rig = Rig::new(MockStore::default());
    manual(&mut rig, 250, 100);
    assert!(rig.display.icon("power"));
    rig.run_ms(50_000);
    assert!((490..=510).contains(&rig.display.time_permille));
    assert_eq!(rig.display.current_time, Some(50));
    assert!(rig.display.temp_percent > 0);
    assert_eq!(
        rig.display.current_temp,
        Some(rig.shared.heater.current_temperature().round() as u16)
    );

    let updates = rig.display.updates;
    rig.cmd(AppCommand::Stop);
    rig.run_ms(10);
    assert!(rig.display.updates > updates);
    assert_eq!(rig.display.current_time, None);
    assert!(!rig.display.icon("power"));
}

#[test]
fn telemetry_is_periodic() {
    let mut rig = Rig::new(MockStore::default());
    manual(&mut rig, 180, 600);
    rig.run_ms(180_000);
    let n = rig
        .sink
        .count(|e| matches!(e, AppEvent::Telemetry(t) if t.target_c == 180));
    assert!((2..=4).contains(&n), "{n} telemetry events in 3 min");
}

#[test]
fn link_state_shows_network_icon() {
    let mut rig = Rig::new(MockStore::default());
    rig.shared.notify.signal_link_state(true);
    rig.run_ms(10);
    assert!(rig.display.icon("network"));
}
