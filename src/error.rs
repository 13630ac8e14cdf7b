//! Unified error types for the ElectricStove firmware.
//!
//! Each subsystem owns a small `Copy` error type.  Command handling in the
//! application service funnels recipe and storage failures into [`Error`]
//! so every rejected command is reported through one path.

use core::fmt;

use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Command-level error
// ---------------------------------------------------------------------------

/// Failure of one front-end command.  Subsystem errors convert into it with
/// `?` so the service can report every failed command the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A bake curve could not be loaded or decoded.
    Recipe(RecipeError),
    /// Recipe or option storage failed.
    Storage(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recipe(e) => write!(f, "recipe: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Command-level `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// SPI transfer to the converter failed.
    BusFailed,
    /// The converter flagged an open thermocouple input.
    OpenCircuit,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFailed => write!(f, "SPI transfer failed"),
            Self::OpenCircuit => write!(f, "thermocouple open"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

// ---------------------------------------------------------------------------
// Recipe errors
// ---------------------------------------------------------------------------

/// Reasons a bake curve is rejected at pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeError {
    /// The requested curve index does not exist in the store.
    UnknownCurve(usize),
    /// The curve has no runnable step before its terminator.
    Empty,
    /// A step has neither a positive duration nor a known event code.
    UnknownEvent { index: usize, code: i32 },
    /// A terminator appears mid-curve without a usable temperature,
    /// or a heat step targets a temperature outside device limits.
    InvalidStep { index: usize },
    /// The curve has more steps than a loaded curve can hold.
    TooLong,
}

impl fmt::Display for RecipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCurve(i) => write!(f, "no bake curve at index {i}"),
            Self::Empty => write!(f, "bake curve has no steps"),
            Self::UnknownEvent { index, code } => {
                write!(f, "step {index}: unknown event code {code}")
            }
            Self::InvalidStep { index } => write!(f, "step {index}: malformed"),
            Self::TooLong => write!(f, "bake curve too long"),
        }
    }
}

impl From<RecipeError> for Error {
    fn from(e: RecipeError) -> Self {
        Self::Recipe(e)
    }
}

// ---------------------------------------------------------------------------
// Lock timeout
// ---------------------------------------------------------------------------

/// A bounded-wait lock acquisition exceeded its deadline.
///
/// Carries the name of the guarded component for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeout(pub &'static str);

impl fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lock busy", self.0)
    }
}
