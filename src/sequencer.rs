//! Bake-curve sequencer.
//!
//! Pure accessor over one decoded [`BakeCurve`] plus a step cursor.  It
//! does no timing; the controller asks for the current step, advances on
//! completion and rewinds on stop.  With no curve loaded the controller
//! runs in manual mode and [`Sequencer::current`] reads as [`Step::End`].

use log::info;

use crate::app::ports::RecipeStore;
use crate::config::SystemConfig;
use crate::error::RecipeError;
use crate::recipe::{BakeCurve, Step};

#[derive(Debug, Default)]
pub struct Sequencer {
    loaded: Option<Loaded>,
    index: usize,
}

#[derive(Debug)]
struct Loaded {
    curve_index: usize,
    curve: BakeCurve,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode curve `curve_index` from `store` and arm it at step 0.
    ///
    /// On error the previously loaded curve and cursor are left untouched.
    pub fn load(
        &mut self,
        store: &impl RecipeStore,
        curve_index: usize,
        config: &SystemConfig,
    ) -> Result<(), RecipeError> {
        if curve_index >= store.bake_count() {
            return Err(RecipeError::UnknownCurve(curve_index));
        }
        let name = store.bake_name(curve_index).unwrap_or_default();
        let curve = BakeCurve::decode(&name, &store.bake_steps(curve_index), config)?;
        info!(
            "Sequencer: loaded '{}' ({} steps) from slot {}",
            curve.name(),
            curve.len(),
            curve_index
        );
        self.loaded = Some(Loaded { curve_index, curve });
        self.index = 0;
        Ok(())
    }

    /// Drop the curve (manual mode).
    pub fn clear(&mut self) {
        self.loaded = None;
        self.index = 0;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn curve_index(&self) -> Option<usize> {
        self.loaded.as_ref().map(|l| l.curve_index)
    }

    pub fn name(&self) -> Option<&str> {
        self.loaded.as_ref().map(|l| l.curve.name())
    }

    /// Cursor position.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Step {
        self.loaded
            .as_ref()
            .map_or(Step::End, |l| l.curve.step(self.index))
    }

    /// Move to the next step and return it.  Saturates past the end.
    pub fn advance(&mut self) -> Step {
        if let Some(l) = &self.loaded {
            if self.index < l.curve.len() {
                self.index += 1;
            }
        }
        self.current()
    }

    /// Re-arm at the first step.
    pub fn rewind(&mut self) {
        self.index = 0;
    }
}
