//! Core-pinned thread spawning.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::spawn` creates a
//! FreeRTOS task pinned to a specific CPU core with explicit priority and
//! stack size.  On non-ESP targets, falls back to a plain named thread.
//!
//! `esp_pthread_set_cfg()` sets thread-local configuration for the *next*
//! `pthread_create()` from the calling thread, so the config→spawn pair
//! must not be interleaved with other thread creation on that thread.

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0: protocol stacks, display, controller.
    Pro = 0,
    /// Core 1: sensor, heater and alert loops.
    App = 1,
}

/// How a controller task is placed.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    /// Null-terminated task name, e.g. `"heater\0"`.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

pub const SENSOR_TASK: TaskSpec = TaskSpec {
    name: "sensor\0",
    core: Core::App,
    priority: 5,
    stack_kb: 4,
};

pub const HEATER_TASK: TaskSpec = TaskSpec {
    name: "heater\0",
    core: Core::App,
    priority: 6,
    stack_kb: 4,
};

pub const ALERT_TASK: TaskSpec = TaskSpec {
    name: "alerts\0",
    core: Core::App,
    priority: 4,
    stack_kb: 3,
};

impl TaskSpec {
    fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

/// Spawn a thread placed per `spec`.
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(
    spec: TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    // SAFETY: the config struct is fully initialised by the IDF default
    // and `spec.name` is a 'static null-terminated string.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr() as *const _;
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .spawn(f)
}

/// Simulation fallback; ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(
    spec: TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    log::info!(
        "Spawning '{}' (sim, no core pinning, stack={}KB)",
        spec.display_name(),
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(spec.stack_kb.max(64) * 1024)
        .spawn(f)
}
