//! ElectricStove firmware library.
//!
//! Closed-loop oven/kiln controller: a thermocouple is sampled and
//! supervised, a PID-driven time-proportioning relay holds the target
//! temperature, and a step sequencer walks bake curves made of heating
//! steps and special events (preheat, pause, chime, end alarm, timer).
//!
//! Exposes the pure-logic modules for integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod alerts;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod events;
pub mod fsm;
pub mod heater;
pub mod pins;
pub mod recipe;
pub mod safety;
pub mod sensors;
pub mod sequencer;
pub mod sync;
pub mod tasks;
