//! GPIO / peripheral pin assignments for the controller board.
//!
//! Single source of truth; every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Heater
// ---------------------------------------------------------------------------

/// Solid-state relay driving the heating element.  HIGH = energised.
pub const RELAY_GPIO: i32 = 35;

// ---------------------------------------------------------------------------
// Thermocouple amplifier (MAX6675, read-only SPI)
// ---------------------------------------------------------------------------

pub const TC_SCLK_GPIO: i32 = 18;
/// MAX6675 SO → MCU MISO.
pub const TC_MISO_GPIO: i32 = 19;
pub const TC_CS_GPIO: i32 = 9;
/// MAX6675 tops out at 4.3 MHz; stay well below.
pub const TC_SPI_FREQ_HZ: u32 = 1_000_000;

// ---------------------------------------------------------------------------
// Audible alerts
// ---------------------------------------------------------------------------

/// Active buzzer.  HIGH = sounding.
pub const BUZZER_GPIO: i32 = 21;
