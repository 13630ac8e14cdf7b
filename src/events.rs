//! Cross-task notifications into the controller.
//!
//! Producers run in other tasks (heater completion callback, safety
//! supervisor, network link watcher) and must never call into controller
//! state directly.  Each notification is a single-slot signal: the latest
//! value wins, and the controller takes it at most once per tick.
//!
//! ```text
//! ┌──────────────┐ heater_done   ┌──────────────┐
//! │ Heater task  │──────────────▶│              │
//! │              │ sensor_fault  │  Controller  │
//! │              │──────────────▶│  (one take   │
//! └──────────────┘               │   per tick)  │
//! ┌──────────────┐ link_state    │              │
//! │ Link watcher │──────────────▶│              │
//! └──────────────┘               └──────────────┘
//! ```
//!
//! The signals lock through `critical-section`: esp-idf-hal provides the
//! implementation on the device, its `std` one serves host builds.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

pub struct Notifications {
    heater_done: Signal<CriticalSectionRawMutex, ()>,
    sensor_fault: Signal<CriticalSectionRawMutex, bool>,
    link_state: Signal<CriticalSectionRawMutex, bool>,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifications {
    pub const fn new() -> Self {
        Self {
            heater_done: Signal::new(),
            sensor_fault: Signal::new(),
            link_state: Signal::new(),
        }
    }

    /// The heater session completed.  Safe to call from the completion
    /// callback.
    pub fn signal_heater_done(&self) {
        self.heater_done.signal(());
    }

    pub fn take_heater_done(&self) -> bool {
        self.heater_done.try_take().is_some()
    }

    /// The sensor failsafe latched (`true`) or cleared (`false`).
    pub fn signal_sensor_fault(&self, faulted: bool) {
        self.sensor_fault.signal(faulted);
    }

    pub fn take_sensor_fault(&self) -> Option<bool> {
        self.sensor_fault.try_take()
    }

    /// Remote link came up or went down.
    pub fn signal_link_state(&self, up: bool) {
        self.link_state.signal(up);
    }

    pub fn take_link_state(&self) -> Option<bool> {
        self.link_state.try_take()
    }
}
