//! Platform helpers for task placement.

pub mod task_pin;
