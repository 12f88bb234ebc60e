//! Shared mutable context threaded through every puzzle state handler.
//!
//! `PuzzleContext` is the "blackboard": state handlers read the latest
//! snapshot and timing from it and write indicator requests and the
//! completion flag back.

use super::predicate::CompletionPredicate;
use crate::sensors::Snapshot;

// ---------------------------------------------------------------------------
// Outputs (written by state handlers; applied by the scheduler)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PuzzleOutputs {
    /// Lit for the whole ReadyCountdown.
    pub ready_lamp: bool,
    /// Lit while Completed.
    pub solved_lamp: bool,
    /// Sensor evaluation enabled.  Only true while Active.
    pub sampling: bool,
}

// ---------------------------------------------------------------------------
// PuzzleContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PuzzleContext {
    /// Loop time of the current tick (milliseconds).
    pub now_ms: u64,
    /// Time the current state was entered.
    pub entered_ms: u64,
    pub ready_delay_ms: u32,
    pub predicate: CompletionPredicate,
    /// Latest debounced sensor snapshot.
    pub snapshot: Snapshot,
    pub outputs: PuzzleOutputs,
    /// Set on entering Completed; taken once by the scheduler.
    pub completion_pending: bool,
}

impl PuzzleContext {
    pub fn new(predicate: CompletionPredicate, ready_delay_ms: u32) -> Self {
        Self {
            now_ms: 0,
            entered_ms: 0,
            ready_delay_ms,
            predicate,
            snapshot: Snapshot::new(),
            outputs: PuzzleOutputs::default(),
            completion_pending: false,
        }
    }

    /// Milliseconds spent in the current state.
    pub fn ms_in_state(&self) -> u64 {
        self.now_ms.saturating_sub(self.entered_ms)
    }
}
