//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the controller's business rules: command
//! handling, step sequencing through the FSM, display refresh and
//! telemetry.  All interaction with hardware and storage happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod display;
pub mod events;
pub mod ports;
pub mod service;
