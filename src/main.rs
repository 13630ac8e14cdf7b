//! ElectricStove Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Max6675 (input)   LogEventSink   NvsAdapter      SystemClock  │
//! │  relay / buzzer    LogDisplay     (Config+Recipe  (Clock)      │
//! │  PinDriver         ConsoleRemote   +Options)                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  Core 1:  SensorTask · HeaterTask · AlertTask                  │
//! │  Core 0:  ┌──────────────────────────────────────────────┐     │
//! │           │  AppService (FSM · Sequencer · Display)      │     │
//! │           └──────────────────────────────────────────────┘     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use esp_idf_svc::hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::spi::{SpiDeviceDriver, SpiDriver, SpiDriverConfig, config::Config};
use esp_idf_svc::hal::units::Hertz;
use log::{info, warn};

use electricstove::adapters::log_sink::{ConsoleRemoteLog, LogDisplay, LogEventSink};
use electricstove::adapters::nvs::NvsAdapter;
use electricstove::adapters::time::SystemClock;
use electricstove::app::commands::AppCommand;
use electricstove::app::ports::{Clock, ConfigPort};
use electricstove::app::service::AppService;
use electricstove::config::SystemConfig;
use electricstove::drivers::task_pin::{ALERT_TASK, HEATER_TASK, SENSOR_TASK, spawn_on_core};
use electricstove::pins;
use electricstove::sensors::thermocouple::Max6675;
use electricstove::tasks::{AlertTask, HeaterTask, SensorTask, Shared};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ElectricStove v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = NvsAdapter::new().unwrap_or_else(|e| {
        warn!("NVS init failed ({}), running without persistence", e);
        NvsAdapter::default()
    });
    let config = match nvs.load() {
        Ok(cfg) if cfg.validate().is_ok() => cfg,
        Ok(_) => {
            warn!("Stored config out of range, using defaults");
            SystemConfig::default()
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take().context("peripherals already taken")?;

    // SAFETY: each GPIO number is claimed exactly once, here.
    let (sclk, miso, cs, relay, buzzer) = unsafe {
        (
            AnyOutputPin::new(pins::TC_SCLK_GPIO),
            AnyIOPin::new(pins::TC_MISO_GPIO),
            AnyOutputPin::new(pins::TC_CS_GPIO),
            AnyOutputPin::new(pins::RELAY_GPIO),
            AnyOutputPin::new(pins::BUZZER_GPIO),
        )
    };

    let spi = SpiDriver::new_without_sdo(peripherals.spi2, sclk, miso, &SpiDriverConfig::new())
        .context("SPI bus init")?;
    let spi = SpiDeviceDriver::new(
        spi,
        Some(cs),
        &Config::new().baudrate(Hertz(pins::TC_SPI_FREQ_HZ)),
    )
    .context("MAX6675 device init")?;
    let mut relay = PinDriver::output(relay).context("relay pin")?;
    relay.set_low().context("relay off")?;
    let buzzer = PinDriver::output(buzzer).context("buzzer pin")?;

    // ── 4. Tasks ──────────────────────────────────────────────
    let shared = Shared::new(config);
    let clock = SystemClock::new();

    let sensor = SensorTask::new(Max6675::new(spi), &shared);
    spawn_on_core(SENSOR_TASK, move || sensor.run(clock)).context("sensor task")?;
    let heater = HeaterTask::new(relay, &shared);
    spawn_on_core(HEATER_TASK, move || heater.run(clock)).context("heater task")?;
    let alerts = AlertTask::new(buzzer, &shared);
    spawn_on_core(ALERT_TASK, move || alerts.run(clock)).context("alert task")?;

    // Serial console → command channel.
    let (tx, rx) = mpsc::channel::<AppCommand>();
    std::thread::Builder::new()
        .name("console".into())
        .stack_size(4 * 1024)
        .spawn(move || {
            for line in std::io::stdin().lock().lines().map_while(std::result::Result::ok) {
                match line.parse() {
                    Ok(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("console: {e}: '{}'", line.trim()),
                }
            }
        })
        .context("console thread")?;

    // ── 5. Controller ─────────────────────────────────────────
    let mut app = AppService::new(&shared);
    let mut sink = LogEventSink::new();
    let mut display = LogDisplay;
    let mut remote = ConsoleRemoteLog::default();
    app.start(&nvs, &mut sink);

    info!("System ready. Entering controller loop.");
    let period = Duration::from_millis(u64::from(shared.config.control_loop_interval_ms));

    loop {
        let now = clock.now_ms();
        while let Ok(cmd) = rx.try_recv() {
            app.handle_command(cmd, now, &mut nvs, &mut sink);
        }
        app.tick(now, &mut display, &mut remote, &mut sink);
        std::thread::sleep(period);
    }
}
