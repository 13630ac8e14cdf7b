//! Bake curves: ordered lists of heating steps and special events.
//!
//! Stored curves use a compact numeric encoding shared with the recipe
//! files:
//!
//! | `duration` | meaning                                             |
//! |------------|-----------------------------------------------------|
//! | `> 0`      | heat to `temperature` °C for `duration` seconds     |
//! | `0`        | end of curve                                        |
//! | `< 0`      | special event; `temperature` carries its parameter  |
//!
//! [`BakeCurve::decode`] turns that encoding into the tagged [`Step`]
//! enum once, when a curve is loaded, so nothing downstream ever
//! reinterprets a temperature as an event parameter by accident.

use core::fmt;

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use crate::error::RecipeError;

/// Longest curve that can be loaded.
pub const MAX_STEPS: usize = 32;
/// Longest stored recipe name.
pub const MAX_NAME_LEN: usize = 32;

/// Recipe name shown while the user edits the setpoint by hand.
pub const MANUAL_NAME: &str = "Manual";

// ═══════════════════════════════════════════════════════════════
//  Encoded form
// ═══════════════════════════════════════════════════════════════

/// One step exactly as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStep {
    pub temperature: u16,
    pub duration: i32,
}

impl RawStep {
    pub const fn heat(temperature: u16, secs: i32) -> Self {
        Self {
            temperature,
            duration: secs,
        }
    }

    pub const fn event(code: EventCode, param: u16) -> Self {
        Self {
            temperature: param,
            duration: code as i32,
        }
    }

    pub const END: Self = Self {
        temperature: 0,
        duration: 0,
    };
}

// ═══════════════════════════════════════════════════════════════
//  Decoded form
// ═══════════════════════════════════════════════════════════════

/// Special event codes carried in a negative duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EventCode {
    /// Heat to the parameter temperature, then wait for the user.
    Preheating = -1,
    /// Hold the current target and wait for the user.
    Pause = -2,
    /// Play a chime and continue.
    Sound = -3,
    /// Sound the end alarm until the user stops it.
    End = -4,
    /// Count down the parameter in seconds without heating.
    Timer = -5,
}

impl TryFrom<i32> for EventCode {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, i32> {
        match code {
            -1 => Ok(Self::Preheating),
            -2 => Ok(Self::Pause),
            -3 => Ok(Self::Sound),
            -4 => Ok(Self::End),
            -5 => Ok(Self::Timer),
            other => Err(other),
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preheating => "PREHEATING",
            Self::Pause => "PAUSE",
            Self::Sound => "SOUND",
            Self::End => "END",
            Self::Timer => "TIMER",
        };
        f.write_str(name)
    }
}

/// A special event and its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialEvent {
    pub code: EventCode,
    pub param: u16,
}

/// A decoded curve step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Heat { temperature: u16, secs: u32 },
    Event(SpecialEvent),
    End,
}

/// A curve decoded and validated at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakeCurve {
    name: String<MAX_NAME_LEN>,
    steps: Vec<Step, MAX_STEPS>,
}

impl BakeCurve {
    /// Decode raw steps.
    ///
    /// Decoding stops at the first terminator.  A terminator with a
    /// non-zero temperature that is not the last stored step is treated
    /// as corruption, as is an unknown event code or a heat step whose
    /// temperature is outside the device limits.
    pub fn decode(name: &str, raw: &[RawStep], config: &SystemConfig) -> Result<Self, RecipeError> {
        let mut steps = Vec::new();
        for (index, r) in raw.iter().enumerate() {
            let step = match r.duration {
                d if d > 0 => {
                    let limits = config.target_temp_min_c..=config.target_temp_max_c;
                    if !limits.contains(&r.temperature) {
                        return Err(RecipeError::InvalidStep { index });
                    }
                    Step::Heat {
                        temperature: r.temperature,
                        secs: config.clamp_duration(d as u32),
                    }
                }
                0 => {
                    let last = index + 1 == raw.len();
                    if r.temperature != 0 && !last {
                        return Err(RecipeError::InvalidStep { index });
                    }
                    break;
                }
                code => {
                    let code = EventCode::try_from(code)
                        .map_err(|code| RecipeError::UnknownEvent { index, code })?;
                    Step::Event(SpecialEvent {
                        code,
                        param: r.temperature,
                    })
                }
            };
            steps.push(step).map_err(|_| RecipeError::TooLong)?;
        }
        if steps.is_empty() {
            return Err(RecipeError::Empty);
        }

        let mut n = String::new();
        for c in name.chars() {
            if n.push(c).is_err() {
                break;
            }
        }
        Ok(Self { name: n, steps })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at `index`, [`Step::End`] past the last one.
    pub fn step(&self, index: usize) -> Step {
        self.steps.get(index).copied().unwrap_or(Step::End)
    }
}
