//! Inbound commands to the application service.
//!
//! These are the display/input collaborator's callbacks, marshalled into
//! one enum that the [`AppService`](super::service::AppService)
//! interprets on the controller task.
//!
//! For headless bring-up the same commands can be typed on the serial
//! console; see the [`FromStr`] impl for the syntax.

use core::str::FromStr;

use super::ports::OptionKey;

/// Commands that the front-end can send into the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Edit the manual target temperature (°C).  Idle only.
    SetTemperature(u16),

    /// Edit the manual duration (seconds).  Idle only.
    SetTime(u32),

    Start,

    /// Pause button.  Resumes when already paused.
    Pause,

    Stop,

    /// Acknowledge a waiting special event.
    Continue,

    /// Recipe list pick.  A long press also starts the curve.
    PickRecipe { index: usize, long_press: bool },

    /// ± minutes: edits the setpoint while idle, the running session
    /// otherwise.
    AdjustTime { minutes: i32 },

    RemoveRecipes(Vec<usize>),

    SwapRecipes(usize, usize),

    /// Append curves from an uploaded recipe file.
    ImportRecipes(Vec<u8>),

    SetOption(OptionKey, i32),
}

impl AppCommand {
    /// True for commands that come from a button press.
    pub fn is_button(&self) -> bool {
        matches!(
            self,
            Self::Start | Self::Pause | Self::Stop | Self::Continue | Self::PickRecipe { .. }
        )
    }

    /// Short name for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SetTemperature(_) => "set temperature",
            Self::SetTime(_) => "set time",
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Continue => "continue",
            Self::PickRecipe { .. } => "recipe pick",
            Self::AdjustTime { .. } => "time adjust",
            Self::RemoveRecipes(_) => "recipe remove",
            Self::SwapRecipes(..) => "recipe swap",
            Self::ImportRecipes(_) => "recipe import",
            Self::SetOption(..) => "option",
        }
    }
}

/// Console syntax, one command per line:
///
/// ```text
/// temp 180 | time 600 | start | pause | stop | continue
/// pick 2 [long] | adjust -5 | remove 0 3 | swap 1 2
/// option 1 0 | import [{"name":"A","steps":[...]}]
/// ```
impl FromStr for AppCommand {
    type Err = &'static str;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let mut args = rest.split_whitespace();
        let mut num = |what: &'static str| -> Result<i64, &'static str> {
            args.next().ok_or(what)?.parse().map_err(|_| what)
        };

        let cmd = match verb {
            "temp" => Self::SetTemperature(
                u16::try_from(num("temperature")?).map_err(|_| "temperature")?,
            ),
            "time" => Self::SetTime(u32::try_from(num("seconds")?).map_err(|_| "seconds")?),
            "start" => Self::Start,
            "pause" => Self::Pause,
            "stop" => Self::Stop,
            "continue" => Self::Continue,
            "pick" => {
                let index = usize::try_from(num("index")?).map_err(|_| "index")?;
                Self::PickRecipe {
                    index,
                    long_press: rest.ends_with("long"),
                }
            }
            "adjust" => Self::AdjustTime {
                minutes: i32::try_from(num("minutes")?).map_err(|_| "minutes")?,
            },
            "remove" => {
                let indices = rest
                    .split_whitespace()
                    .map(str::parse)
                    .collect::<Result<Vec<usize>, _>>()
                    .map_err(|_| "index list")?;
                if indices.is_empty() {
                    return Err("index list");
                }
                Self::RemoveRecipes(indices)
            }
            "swap" => {
                let a = usize::try_from(num("index")?).map_err(|_| "index")?;
                let b = usize::try_from(num("index")?).map_err(|_| "index")?;
                Self::SwapRecipes(a, b)
            }
            "option" => {
                let key = u8::try_from(num("option key")?)
                    .ok()
                    .and_then(OptionKey::from_u8)
                    .ok_or("option key")?;
                let value = i32::try_from(num("option value")?).map_err(|_| "option value")?;
                Self::SetOption(key, value)
            }
            "import" if !rest.is_empty() => Self::ImportRecipes(rest.as_bytes().to_vec()),
            _ => return Err("unknown command"),
        };
        Ok(cmd)
    }
}
