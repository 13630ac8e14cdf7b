//! Display model.
//!
//! The service rebuilds a [`DisplayModel`] every tick from the controller
//! view state and a heater snapshot, then pushes only the fields that
//! changed since the last tick through the [`DisplayPort`].

use heapless::String;

use super::ports::{Blink, ButtonGroup, DisplayPort, Icon};
use crate::recipe::MAX_NAME_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayModel {
    pub current_temp: Option<u16>,
    pub target_temp: Option<u16>,
    pub current_time: Option<u32>,
    pub target_time: Option<u32>,
    pub buttons: ButtonGroup,
    pub editing: bool,
    pub blink_time: bool,
    pub blink_frame: bool,
    pub time_permille: u16,
    pub temp_percent: u8,
    pub recipe_name: String<MAX_NAME_LEN>,
    pub power: bool,
    pub sound: bool,
    pub network: bool,
}

impl DisplayModel {
    /// Push every field that differs from `prev` (all of them if `None`).
    pub fn apply(&self, prev: Option<&Self>, d: &mut impl DisplayPort) {
        let changed = |f: &dyn Fn(&Self) -> bool| prev.is_none_or(|p| f(p));

        if changed(&|p| p.current_temp != self.current_temp) {
            d.set_current_temperature(self.current_temp);
        }
        if changed(&|p| p.target_temp != self.target_temp) {
            d.set_target_temperature(self.target_temp);
        }
        if changed(&|p| p.current_time != self.current_time) {
            d.set_current_time(self.current_time);
        }
        if changed(&|p| p.target_time != self.target_time) {
            d.set_target_time(self.target_time);
        }
        if changed(&|p| p.buttons != self.buttons) {
            d.set_button_group(self.buttons);
        }
        if changed(&|p| p.editing != self.editing) {
            d.set_editing_enabled(self.editing);
        }
        if changed(&|p| p.blink_time != self.blink_time) {
            d.set_blink(Blink::CurrentTime, self.blink_time);
        }
        if changed(&|p| p.blink_frame != self.blink_frame) {
            d.set_blink(Blink::Frame, self.blink_frame);
        }
        if changed(&|p| p.time_permille != self.time_permille) {
            d.set_time_progress(self.time_permille);
        }
        if changed(&|p| p.temp_percent != self.temp_percent) {
            d.set_temperature_progress(self.temp_percent);
        }
        if changed(&|p| p.recipe_name != self.recipe_name) {
            d.set_recipe_name(&self.recipe_name);
        }
        if changed(&|p| p.power != self.power) {
            d.set_icon(Icon::Power, self.power);
        }
        if changed(&|p| p.sound != self.sound) {
            d.set_icon(Icon::Sound, self.sound);
        }
        if changed(&|p| p.network != self.network) {
            d.set_icon(Icon::Network, self.network);
        }
    }
}

/// Elapsed share of a step in permille, 0 for an unset duration.
pub fn time_permille(elapsed_ms: u32, duration_ms: u32) -> u16 {
    if duration_ms == 0 {
        return 0;
    }
    let p = u64::from(elapsed_ms) * 1000 / u64::from(duration_ms);
    p.min(1000) as u16
}

/// Current temperature as a percentage of target, 0 with no target.
pub fn temp_percent(current_c: f32, target_c: Option<u16>) -> u8 {
    match target_c {
        Some(t) if t > 0 && current_c.is_finite() => {
            (current_c / f32::from(t) * 100.0).clamp(0.0, 100.0) as u8
        }
        _ => 0,
    }
}

/// Whole degrees for display; `None` for a failed reading.
pub fn whole_degrees(c: f32) -> Option<u16> {
    c.is_finite().then(|| c.round().clamp(0.0, f32::from(u16::MAX)) as u16)
}
