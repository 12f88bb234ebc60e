//! Function-pointer finite state machine engine for the puzzle.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                      │
//! │  ┌────────────────┬───────────┬──────────┬───────────────────┐   │
//! │  │ PuzzleState    │ on_enter  │ on_exit  │ on_update         │   │
//! │  ├────────────────┼───────────┼──────────┼───────────────────┤   │
//! │  │ Idle           │ fn(ctx)   │ -        │ fn(ctx)->Option<> │   │
//! │  │ ReadyCountdown │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  │ Active         │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  │ Completed      │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  └────────────────┴───────────┴──────────┴───────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the current state.  If it
//! returns `Some(next)`, the engine runs `on_exit` for the current state,
//! then `on_enter` for the next.  Commands enter through
//! [`machine::PuzzleMachine`], which forces transitions.

pub mod context;
pub mod machine;
pub mod predicate;
pub mod states;

use context::PuzzleContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Puzzle lifecycle.  Must stay in sync with [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PuzzleState {
    Idle = 0,
    ReadyCountdown = 1,
    Active = 2,
    Completed = 3,
}

impl PuzzleState {
    pub const COUNT: usize = 4;

    /// Convert an index back to `PuzzleState`.  Out-of-range indices fall
    /// back to `Idle` in release builds.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::ReadyCountdown,
            2 => Self::Active,
            3 => Self::Completed,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ReadyCountdown => "ready-countdown",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut PuzzleContext);

/// Per-tick handler.  `Some(next)` requests a transition.
pub type StateUpdateFn = fn(&mut PuzzleContext) -> Option<PuzzleState>;

/// One row in the state table.
pub struct StateDescriptor {
    pub id: PuzzleState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    table: [StateDescriptor; PuzzleState::COUNT],
    current: usize,
    tick_count: u64,
    state_entry_tick: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; PuzzleState::COUNT], initial: PuzzleState) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut PuzzleContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.entered_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Call `on_update` for the current state and follow its answer.
    pub fn tick(&mut self, ctx: &mut PuzzleContext) {
        self.tick_count += 1;
        if let Some(next) = (self.table[self.current].on_update)(ctx) {
            self.transition(next, ctx);
        }
    }

    /// Transition unless already in `next`.
    pub fn force_transition(&mut self, next: PuzzleState, ctx: &mut PuzzleContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// Exit and re-enter the current state, restarting its timer.
    pub fn reenter(&mut self, ctx: &mut PuzzleContext) {
        self.transition(self.current_state(), ctx);
    }

    pub fn current_state(&self) -> PuzzleState {
        PuzzleState::from_index(self.current)
    }

    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    fn transition(&mut self, next: PuzzleState, ctx: &mut PuzzleContext) {
        let next_idx = next as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.entered_ms = ctx.now_ms;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
