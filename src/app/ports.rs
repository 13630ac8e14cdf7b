//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (thermocouple, display, recipe storage, remote log,
//! event sinks) implement these traits.  The
//! [`AppService`](super::service::AppService) consumes them via generics,
//! so the controller never touches hardware directly.
//!
//! The relay and buzzer are plain `embedded_hal::digital::OutputPin`s and
//! need no port of their own.

use crate::config::SystemConfig;
use crate::error::SensorError;
use crate::recipe::RawStep;

// ───────────────────────────────────────────────────────────────
// Temperature sensor (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One blocking thermocouple conversion.
pub trait TemperatureSensor {
    fn read_celsius(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.  Wraps at `u32::MAX`; consumers compare
/// differences, never absolute values.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Display port (driven adapter: domain → front-end)
// ───────────────────────────────────────────────────────────────

/// Which pair of action buttons the front-end shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonGroup {
    Start,
    PauseStop,
    ContinueStop,
}

/// Independent blink indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blink {
    CurrentTime,
    Frame,
}

/// Status-bar icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Power,
    Sound,
    Network,
}

/// Outbound calls to the display front-end.
///
/// Temperatures are whole °C, times whole seconds.  `None` renders as an
/// unset / unbounded field.
pub trait DisplayPort {
    fn set_current_temperature(&mut self, temp_c: Option<u16>);
    fn set_target_temperature(&mut self, temp_c: Option<u16>);
    fn set_current_time(&mut self, secs: Option<u32>);
    fn set_target_time(&mut self, secs: Option<u32>);
    fn set_button_group(&mut self, group: ButtonGroup);
    /// Enable or disable the time/temperature edit fields.
    fn set_editing_enabled(&mut self, enabled: bool);
    fn set_blink(&mut self, which: Blink, on: bool);
    /// Elapsed share of the step, 0–1000.
    fn set_time_progress(&mut self, permille: u16);
    /// Current temperature as a share of target, 0–100.
    fn set_temperature_progress(&mut self, percent: u8);
    fn set_recipe_name(&mut self, name: &str);
    fn set_icon(&mut self, icon: Icon, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Write-only remote log line sink (telnet-style console).
pub trait RemoteLog {
    fn log_write(&mut self, line: &str);
}

// ───────────────────────────────────────────────────────────────
// Recipe store (driven adapter: domain ↔ bake-curve storage)
// ───────────────────────────────────────────────────────────────

/// Bake curves owned by the storage collaborator.
///
/// Steps come back in their stored encoding; see [`crate::recipe`] for
/// the meaning of a signed duration.  Out-of-range indices read as the
/// curve terminator.
pub trait RecipeStore {
    fn bake_count(&self) -> usize;
    fn bake_step_count(&self, curve: usize) -> usize;
    fn bake_step_temp(&self, curve: usize, step: usize) -> u16;
    fn bake_step_time(&self, curve: usize, step: usize) -> i32;
    fn bake_name(&self, curve: usize) -> Option<String>;
    fn bake_names(&self) -> Vec<String>;

    /// Remove the listed curves.  Indices refer to the list before removal.
    fn remove_bakes(&mut self, indices: &[usize]) -> Result<(), StorageError>;
    fn swap_bakes(&mut self, a: usize, b: usize) -> Result<(), StorageError>;
    /// Append curves parsed from an uploaded file.  Returns how many.
    fn add_bakes_from_file(&mut self, data: &[u8]) -> Result<usize, StorageError>;
    /// Persist the in-memory list.
    fn store_bake_list(&mut self) -> Result<(), StorageError>;

    fn bake_step(&self, curve: usize, step: usize) -> RawStep {
        RawStep {
            temperature: self.bake_step_temp(curve, step),
            duration: self.bake_step_time(curve, step),
        }
    }

    /// Every stored step of `curve`, terminator excluded.
    fn bake_steps(&self, curve: usize) -> Vec<RawStep> {
        (0..self.bake_step_count(curve))
            .map(|i| self.bake_step(curve, i))
            .collect()
    }
}

// ───────────────────────────────────────────────────────────────
// Option store
// ───────────────────────────────────────────────────────────────

/// User options, addressed by stable numeric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OptionKey {
    /// Click on every button press.
    MenuSound = 0,
    /// Alerts while heating.  Off mutes the alert scheduler.
    HeatingSound = 1,
    /// Accept firmware/recipe updates over the network.
    RemoteUpdate = 2,
}

impl OptionKey {
    pub const ALL: [Self; 3] = [Self::MenuSound, Self::HeatingSound, Self::RemoteUpdate];

    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| *k as u8 == raw)
    }

    /// Value used when nothing is stored.
    pub fn default_value(self) -> i32 {
        match self {
            Self::MenuSound | Self::HeatingSound => 1,
            Self::RemoteUpdate => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::MenuSound => "menu_sound",
            Self::HeatingSound => "heat_sound",
            Self::RemoteUpdate => "remote_upd",
        }
    }
}

pub trait OptionStore {
    fn get_option(&self, key: OptionKey) -> Option<i32>;
    fn set_option(&mut self, key: OptionKey, value: i32) -> Result<(), StorageError>;

    fn option_or_default(&self, key: OptionKey) -> i32 {
        self.get_option(key).unwrap_or_else(|| key.default_value())
    }

    fn option_enabled(&self, key: OptionKey) -> bool {
        self.option_or_default(key) != 0
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// Keys are namespaced to prevent collisions between subsystems.  Write
/// operations MUST be atomic; the ESP-IDF NVS API guarantees this natively.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from storage-backed ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key or index does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// A stored blob or uploaded file could not be decoded.
    Corrupted,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "data corrupted"),
        }
    }
}
