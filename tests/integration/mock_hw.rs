//! Simulated oven and recording adapters for integration tests.
//!
//! [`Rig`] wires the real tasks and [`AppService`] to a first-order
//! thermal model and steps everything on a synthetic 10 ms clock, the way
//! the firmware schedules them on hardware.

use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

use electricstove::adapters::nvs::StoredBake;
use electricstove::app::commands::AppCommand;
use electricstove::app::events::AppEvent;
use electricstove::app::ports::{
    Blink, ButtonGroup, DisplayPort, EventSink, Icon, OptionKey, OptionStore, RecipeStore,
    RemoteLog, StorageError, TemperatureSensor,
};
use electricstove::app::service::AppService;
use electricstove::config::SystemConfig;
use electricstove::error::SensorError;
use electricstove::recipe::RawStep;
use electricstove::tasks::{AlertTask, HeaterTask, SensorTask, Shared};
use embedded_hal::digital::{ErrorType, OutputPin};

pub const TICK_MS: u32 = 10;
pub const AMBIENT_C: f32 = 20.0;

// ── Thermal model ─────────────────────────────────────────────

/// °C gained per tick with the element on.
const HEAT_PER_TICK: f32 = 0.05;
/// Fraction of the excess over ambient lost per tick.
const LOSS_PER_TICK: f32 = 0.0001;

#[derive(Debug)]
pub struct OvenState {
    pub temp_c: f32,
    pub heating: bool,
    /// Forces what the thermocouple returns.
    pub reading_override: Option<Result<f32, SensorError>>,
}

pub type Oven = Rc<RefCell<OvenState>>;

pub struct SimThermocouple(pub Oven);

impl TemperatureSensor for SimThermocouple {
    fn read_celsius(&mut self) -> Result<f32, SensorError> {
        let oven = self.0.borrow();
        oven.reading_override.unwrap_or(Ok(oven.temp_c))
    }
}

pub struct SimRelay(pub Oven);

impl ErrorType for SimRelay {
    type Error = Infallible;
}

impl OutputPin for SimRelay {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().heating = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().heating = true;
        Ok(())
    }
}

// ── Buzzer ────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockBuzzer {
    level: Rc<RefCell<bool>>,
    /// Rising edges seen.
    beeps: Rc<RefCell<u32>>,
}

#[allow(dead_code)]
impl MockBuzzer {
    pub fn is_on(&self) -> bool {
        *self.level.borrow()
    }

    pub fn beeps(&self) -> u32 {
        *self.beeps.borrow()
    }
}

impl ErrorType for MockBuzzer {
    type Error = Infallible;
}

impl OutputPin for MockBuzzer {
    fn set_low(&mut self) -> Result<(), Infallible> {
        *self.level.borrow_mut() = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        *self.level.borrow_mut() = true;
        *self.beeps.borrow_mut() += 1;
        Ok(())
    }
}

// ── Display ───────────────────────────────────────────────────

/// Keeps the last value pushed for every field.
#[derive(Debug, Default)]
pub struct MockDisplay {
    pub current_temp: Option<u16>,
    pub target_temp: Option<u16>,
    pub current_time: Option<u32>,
    pub target_time: Option<u32>,
    pub buttons: Option<ButtonGroup>,
    pub editing: bool,
    pub blink_time: bool,
    pub blink_frame: bool,
    pub time_permille: u16,
    pub temp_percent: u8,
    pub recipe_name: String,
    pub icons: HashMap<&'static str, bool>,
    pub updates: u32,
}

#[allow(dead_code)]
impl MockDisplay {
    pub fn icon(&self, name: &str) -> bool {
        self.icons.get(name).copied().unwrap_or(false)
    }
}

impl DisplayPort for MockDisplay {
    fn set_current_temperature(&mut self, temp_c: Option<u16>) {
        self.current_temp = temp_c;
        self.updates += 1;
    }

    fn set_target_temperature(&mut self, temp_c: Option<u16>) {
        self.target_temp = temp_c;
        self.updates += 1;
    }

    fn set_current_time(&mut self, secs: Option<u32>) {
        self.current_time = secs;
        self.updates += 1;
    }

    fn set_target_time(&mut self, secs: Option<u32>) {
        self.target_time = secs;
        self.updates += 1;
    }

    fn set_button_group(&mut self, group: ButtonGroup) {
        self.buttons = Some(group);
        self.updates += 1;
    }

    fn set_editing_enabled(&mut self, enabled: bool) {
        self.editing = enabled;
        self.updates += 1;
    }

    fn set_blink(&mut self, which: Blink, on: bool) {
        match which {
            Blink::CurrentTime => self.blink_time = on,
            Blink::Frame => self.blink_frame = on,
        }
        self.updates += 1;
    }

    fn set_time_progress(&mut self, permille: u16) {
        self.time_permille = permille;
        self.updates += 1;
    }

    fn set_temperature_progress(&mut self, percent: u8) {
        self.temp_percent = percent;
        self.updates += 1;
    }

    fn set_recipe_name(&mut self, name: &str) {
        self.recipe_name = name.to_owned();
        self.updates += 1;
    }

    fn set_icon(&mut self, icon: Icon, on: bool) {
        let name = match icon {
            Icon::Power => "power",
            Icon::Sound => "sound",
            Icon::Network => "network",
        };
        self.icons.insert(name, on);
        self.updates += 1;
    }
}

// ── Recipe + option store ─────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockStore {
    pub bakes: Vec<StoredBake>,
    pub options: HashMap<OptionKey, i32>,
    /// Times the list was persisted.
    pub stores: u32,
}

#[allow(dead_code)]
impl MockStore {
    pub fn with_bake(mut self, name: &str, steps: &[RawStep]) -> Self {
        self.bakes.push(StoredBake {
            name: name.to_owned(),
            steps: steps.to_vec(),
        });
        self
    }

    pub fn with_option(mut self, key: OptionKey, value: i32) -> Self {
        self.options.insert(key, value);
        self
    }
}

impl RecipeStore for MockStore {
    fn bake_count(&self) -> usize {
        self.bakes.len()
    }

    fn bake_step_count(&self, curve: usize) -> usize {
        self.bakes.get(curve).map_or(0, |b| b.steps.len())
    }

    fn bake_step_temp(&self, curve: usize, step: usize) -> u16 {
        self.bake_step(curve, step).temperature
    }

    fn bake_step_time(&self, curve: usize, step: usize) -> i32 {
        self.bake_step(curve, step).duration
    }

    fn bake_step(&self, curve: usize, step: usize) -> RawStep {
        self.bakes
            .get(curve)
            .and_then(|b| b.steps.get(step))
            .copied()
            .unwrap_or(RawStep::END)
    }

    fn bake_name(&self, curve: usize) -> Option<String> {
        self.bakes.get(curve).map(|b| b.name.clone())
    }

    fn bake_names(&self) -> Vec<String> {
        self.bakes.iter().map(|b| b.name.clone()).collect()
    }

    fn remove_bakes(&mut self, indices: &[usize]) -> Result<(), StorageError> {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        for i in sorted {
            if i >= self.bakes.len() {
                return Err(StorageError::NotFound);
            }
            self.bakes.remove(i);
        }
        Ok(())
    }

    fn swap_bakes(&mut self, a: usize, b: usize) -> Result<(), StorageError> {
        if a.max(b) >= self.bakes.len() {
            return Err(StorageError::NotFound);
        }
        self.bakes.swap(a, b);
        Ok(())
    }

    fn add_bakes_from_file(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        let incoming: Vec<StoredBake> =
            serde_json::from_slice(data).map_err(|_| StorageError::Corrupted)?;
        let n = incoming.len();
        self.bakes.extend(incoming);
        Ok(n)
    }

    fn store_bake_list(&mut self) -> Result<(), StorageError> {
        self.stores += 1;
        Ok(())
    }
}

impl OptionStore for MockStore {
    fn get_option(&self, key: OptionKey) -> Option<i32> {
        self.options.get(&key).copied()
    }

    fn set_option(&mut self, key: OptionKey, value: i32) -> Result<(), StorageError> {
        self.options.insert(key, value);
        Ok(())
    }
}

// ── Sinks ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

#[derive(Default)]
pub struct RemoteLines {
    pub lines: Vec<String>,
}

#[allow(dead_code)]
impl RemoteLines {
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

impl RemoteLog for RemoteLines {
    fn log_write(&mut self, line: &str) {
        self.lines.push(line.to_owned());
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub struct Rig {
    pub oven: Oven,
    pub shared: Shared,
    pub app: AppService,
    pub buzzer: MockBuzzer,
    pub display: MockDisplay,
    pub remote: RemoteLines,
    pub sink: RecordingSink,
    pub store: MockStore,
    pub now: u32,
    sensor: SensorTask<SimThermocouple>,
    heater: HeaterTask<SimRelay>,
    alerts: AlertTask<MockBuzzer>,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(store: MockStore) -> Self {
        Self::with_config(SystemConfig::default(), store)
    }

    /// Build the rig and run the first tick at t = 0.
    pub fn with_config(config: SystemConfig, store: MockStore) -> Self {
        let oven = Rc::new(RefCell::new(OvenState {
            temp_c: AMBIENT_C,
            heating: false,
            reading_override: None,
        }));
        let shared = Shared::new(config);
        let buzzer = MockBuzzer::default();
        let mut rig = Self {
            sensor: SensorTask::new(SimThermocouple(Rc::clone(&oven)), &shared),
            heater: HeaterTask::new(SimRelay(Rc::clone(&oven)), &shared),
            alerts: AlertTask::new(buzzer.clone(), &shared),
            app: AppService::new(&shared),
            oven,
            shared,
            buzzer,
            display: MockDisplay::default(),
            remote: RemoteLines::default(),
            sink: RecordingSink::default(),
            store,
            now: 0,
        };
        rig.app.start(&rig.store, &mut rig.sink);
        rig.step();
        rig
    }

    pub fn cmd(&mut self, cmd: AppCommand) {
        self.app
            .handle_command(cmd, self.now, &mut self.store, &mut self.sink);
    }

    /// Run every task due at `self.now`.
    fn step(&mut self) {
        let sensor_period = self.shared.config.sensor_read_interval_ms;
        if self.now % sensor_period == 0 {
            self.sensor.step(self.now);
        }
        self.heater.step(self.now);
        self.alerts.step(self.now);
        self.app.tick(
            self.now,
            &mut self.display,
            &mut self.remote,
            &mut self.sink,
        );

        let mut oven = self.oven.borrow_mut();
        if oven.heating {
            oven.temp_c += HEAT_PER_TICK;
        }
        oven.temp_c -= (oven.temp_c - AMBIENT_C) * LOSS_PER_TICK;
    }

    pub fn run_ms(&mut self, ms: u32) {
        for _ in 0..ms / TICK_MS {
            self.now += TICK_MS;
            self.step();
        }
    }

    /// Step until `done` holds or `limit_ms` passes.  Returns whether it held.
    pub fn run_until(&mut self, limit_ms: u32, done: impl Fn(&Self) -> bool) -> bool {
        let deadline = self.now + limit_ms;
        while self.now < deadline {
            if done(self) {
                return true;
            }
            self.now += TICK_MS;
            self.step();
        }
        done(self)
    }

    pub fn remaining_ms(&self) -> u32 {
        self.shared
            .heater
            .time_remaining_ms(self.now)
            .unwrap_or_default()
    }

    pub fn relay_on(&self) -> bool {
        self.oven.borrow().heating
    }
}
