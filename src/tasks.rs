//! Periodic tasks and the state they share.
//!
//! ```text
//!  SensorTask (1 s)          HeaterTask (10 ms)           AlertTask (10 ms)
//!  sensor ─▶ supervisor ─▶ TemperatureCache ─▶ HeaterSession ─▶ relay pin
//!               │                                  │
//!               └──── SharedAlerts ◀── controller ─┘──── evaluate ─▶ buzzer pin
//! ```
//!
//! Each task exposes a `step(now_ms)` that does one period's work, so the
//! host tests can drive them with a synthetic clock; `run` wraps it in the
//! real loop.

use std::sync::Arc;
use std::time::Duration;

use embedded_hal::digital::{Error as _, OutputPin};
use log::{debug, warn};

use crate::alerts::SharedAlerts;
use crate::app::ports::{Clock, TemperatureSensor};
use crate::config::SystemConfig;
use crate::events::Notifications;
use crate::heater::HeaterSession;
use crate::safety::SafetySupervisor;
use crate::sensors::TemperatureCache;

// ───────────────────────────────────────────────────────────────
// Shared state
// ───────────────────────────────────────────────────────────────

/// Everything the tasks and the controller share.  Cheap to clone.
#[derive(Clone)]
pub struct Shared {
    pub config: SystemConfig,
    pub heater: Arc<HeaterSession>,
    pub alerts: Arc<SharedAlerts>,
    pub notify: Arc<Notifications>,
    pub temperature: Arc<TemperatureCache>,
}

impl Shared {
    /// Build the shared state.  Heater completion is wired to
    /// [`Notifications::signal_heater_done`].
    pub fn new(config: SystemConfig) -> Self {
        let notify = Arc::new(Notifications::new());
        let done = Arc::clone(&notify);
        let heater =
            Arc::new(HeaterSession::new(&config).on_complete(move || done.signal_heater_done()));
        let wait = Duration::from_millis(u64::from(config.lock_wait_ms));
        Self {
            heater,
            alerts: Arc::new(SharedAlerts::new(wait)),
            notify,
            temperature: Arc::new(TemperatureCache::new()),
            config,
        }
    }
}

/// Drive `pin`, writing only on change.
fn drive<P: OutputPin>(pin: &mut P, level: &mut Option<bool>, on: bool, what: &str) {
    if *level == Some(on) {
        return;
    }
    let res = if on { pin.set_high() } else { pin.set_low() };
    match res {
        Ok(()) => *level = Some(on),
        Err(e) => warn!("{what} pin write failed: {:?}", e.kind()),
    }
}

fn run_every(clock: &impl Clock, period_ms: u32, mut step: impl FnMut(u32)) -> ! {
    let period = Duration::from_millis(u64::from(period_ms));
    loop {
        step(clock.now_ms());
        std::thread::sleep(period);
    }
}

// ───────────────────────────────────────────────────────────────
// Sensor task
// ───────────────────────────────────────────────────────────────

/// Samples the thermocouple, supervises the reading and publishes the
/// result for the heater task.
pub struct SensorTask<T> {
    thermocouple: T,
    supervisor: SafetySupervisor,
    cache: Arc<TemperatureCache>,
    alerts: Arc<SharedAlerts>,
    notify: Arc<Notifications>,
    period_ms: u32,
}

impl<T: TemperatureSensor> SensorTask<T> {
    pub fn new(thermocouple: T, shared: &Shared) -> Self {
        Self {
            thermocouple,
            supervisor: SafetySupervisor::new(&shared.config),
            cache: Arc::clone(&shared.temperature),
            alerts: Arc::clone(&shared.alerts),
            notify: Arc::clone(&shared.notify),
            period_ms: shared.config.sensor_read_interval_ms,
        }
    }

    /// One sample.  Returns the published temperature.
    pub fn step(&mut self, now_ms: u32) -> f32 {
        let reading = self.thermocouple.read_celsius();
        if let Err(e) = reading {
            debug!("Thermocouple: {e}");
        }
        let was_faulted = self.supervisor.is_faulted();
        let published = self.supervisor.sample(reading.ok(), now_ms, &self.alerts);
        if self.supervisor.is_faulted() != was_faulted {
            self.notify.signal_sensor_fault(self.supervisor.is_faulted());
        }
        self.cache.publish(Ok(published));
        published
    }

    pub fn supervisor(&self) -> &SafetySupervisor {
        &self.supervisor
    }

    pub fn run(mut self, clock: impl Clock) -> ! {
        let period = self.period_ms;
        run_every(&clock, period, |now| {
            self.step(now);
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Heater task
// ───────────────────────────────────────────────────────────────

/// Feeds the published temperature to the heater session and drives the
/// relay.
pub struct HeaterTask<P> {
    heater: Arc<HeaterSession>,
    cache: Arc<TemperatureCache>,
    relay: P,
    level: Option<bool>,
    /// Published when nothing has been sampled yet; keeps the relay off.
    fallback_c: f32,
    period_ms: u32,
}

impl<P: OutputPin> HeaterTask<P> {
    pub fn new(relay: P, shared: &Shared) -> Self {
        Self {
            heater: Arc::clone(&shared.heater),
            cache: Arc::clone(&shared.temperature),
            relay,
            level: None,
            fallback_c: shared.config.max_allowed_temp_c,
            period_ms: shared.config.control_loop_interval_ms,
        }
    }

    /// One compute tick.  Returns the relay level.
    pub fn step(&mut self, now_ms: u32) -> bool {
        let temp = self.cache.latest().unwrap_or(self.fallback_c);
        let on = self.heater.tick(now_ms, temp);
        drive(&mut self.relay, &mut self.level, on, "relay");
        on
    }

    pub fn run(mut self, clock: impl Clock) -> ! {
        let period = self.period_ms;
        run_every(&clock, period, |now| {
            self.step(now);
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Alert task
// ───────────────────────────────────────────────────────────────

/// Evaluates the alert table and drives the buzzer.
pub struct AlertTask<P> {
    alerts: Arc<SharedAlerts>,
    buzzer: P,
    level: Option<bool>,
    period_ms: u32,
}

impl<P: OutputPin> AlertTask<P> {
    pub fn new(buzzer: P, shared: &Shared) -> Self {
        Self {
            alerts: Arc::clone(&shared.alerts),
            buzzer,
            level: None,
            period_ms: shared.config.alert_tick_ms,
        }
    }

    /// One evaluation.  A busy table keeps the previous level.
    pub fn step(&mut self, now_ms: u32) -> Option<bool> {
        let on = self.alerts.evaluate(now_ms)?;
        drive(&mut self.buzzer, &mut self.level, on, "buzzer");
        Some(on)
    }

    pub fn run(mut self, clock: impl Clock) -> ! {
        let period = self.period_ms;
        run_every(&clock, period, |now| {
            self.step(now);
        })
    }
}
