//! Function-pointer finite state machine engine.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                    │
//! │  ┌───────────────┬───────────┬──────────┬───────────────────┐  │
//! │  │ StateId       │ on_enter  │ on_exit  │ on_update         │  │
//! │  ├───────────────┼───────────┼──────────┼───────────────────┤  │
//! │  │ Idle          │ fn(ctx)   │    -     │ fn(ctx)->Option<> │  │
//! │  │ Heating       │ fn(ctx)   │    -     │ fn(ctx)->Option<> │  │
//! │  │ HeatingPaused │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ SpecialEvent  │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  └───────────────┴───────────┴──────────┴───────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  Returning the current state re-enters it.
//!
//! A request the current state did not consume is discarded at the end of
//! the tick, so no intent outlives the tick it was seen in.

pub mod context;
pub mod states;

use context::FsmContext;
use log::{debug, info};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all controller states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    Heating = 1,
    HeatingPaused = 2,
    SpecialEvent = 3,
}

impl StateId {
    /// Total number of states: used to size the table array.
    pub const COUNT: usize = 4;

    /// Convert an index back to `StateId`.  Out-of-range indices assert in
    /// debug builds and fall back to `Idle` (heater off) in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Heating,
            2 => Self::HeatingPaused,
            3 => Self::SpecialEvent,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }

    /// True while a heater session or special event is in progress.
    pub fn is_busy(self) -> bool {
        self != Self::Idle
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    /// 3. Discard any request left unconsumed.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }

        if let Some(stale) = ctx.request.take() {
            debug!(
                "FSM: {:?} not applicable in {}",
                stale, self.table[self.current].name
            );
        }
    }

    pub fn current_state(&self) -> StateId {
        self.table[self.current].id
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
