//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                |
//! |------------|--------------------|----------------------------|
//! | `log_sink` | EventSink          | Serial log output          |
//! |            | RemoteLog          | Serial log output          |
//! |            | DisplayPort        | Serial log (headless)      |
//! | `nvs`      | ConfigPort         | NVS / in-memory store      |
//! |            | StoragePort        |                            |
//! |            | RecipeStore        |                            |
//! |            | OptionStore        |                            |
//! | `time`     | Clock              | ESP32 system timer         |
//!
//! The thermocouple driver lives in [`crate::sensors::thermocouple`].

pub mod log_sink;
pub mod nvs;
pub mod time;
