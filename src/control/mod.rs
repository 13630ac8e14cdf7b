//! Closed-loop heating control.
//!
//! - [`pid`]: the PID law itself.
//! - [`relay`]: time-proportioning of the PID output onto an on/off relay.

pub mod pid;
pub mod relay;
