//! State handler functions and the table that wires them to [`PuzzleState`]s.
//!
//! Transitions driven from inside the table:
//!
//! ```text
//!   ReadyCountdown ──(ms_in_state ≥ ready_delay)──▶ Active
//!   Active ──────────(predicate holds)────────────▶ Completed
//! ```
//!
//! Idle and Completed never leave on their own; commands move them.

use log::info;

use super::PuzzleState;
use super::StateDescriptor;
use super::context::PuzzleContext;

/// Build the state table, indexed by `PuzzleState as usize`.
pub fn build_state_table() -> [StateDescriptor; PuzzleState::COUNT] {
    [
        StateDescriptor {
            id: PuzzleState::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: PuzzleState::ReadyCountdown,
            name: "ReadyCountdown",
            on_enter: Some(countdown_enter),
            on_exit: Some(countdown_exit),
            on_update: countdown_update,
        },
        StateDescriptor {
            id: PuzzleState::Active,
            name: "Active",
            on_enter: Some(active_enter),
            on_exit: Some(active_exit),
            on_update: active_update,
        },
        StateDescriptor {
            id: PuzzleState::Completed,
            name: "Completed",
            on_enter: Some(completed_enter),
            on_exit: Some(completed_exit),
            on_update: completed_update,
        },
    ]
}

// ── Idle ──────────────────────────────────────────────────────

fn idle_enter(ctx: &mut PuzzleContext) {
    ctx.outputs = Default::default();
}

fn idle_update(_ctx: &mut PuzzleContext) -> Option<PuzzleState> {
    None
}

// ── ReadyCountdown ────────────────────────────────────────────

fn countdown_enter(ctx: &mut PuzzleContext) {
    ctx.outputs.ready_lamp = true;
    ctx.outputs.sampling = false;
    ctx.outputs.solved_lamp = false;
    info!("Ready countdown: {} ms", ctx.ready_delay_ms);
}

fn countdown_exit(ctx: &mut PuzzleContext) {
    ctx.outputs.ready_lamp = false;
}

fn countdown_update(ctx: &mut PuzzleContext) -> Option<PuzzleState> {
    (ctx.ms_in_state() >= u64::from(ctx.ready_delay_ms)).then_some(PuzzleState::Active)
}

// ── Active ────────────────────────────────────────────────────

fn active_enter(ctx: &mut PuzzleContext) {
    ctx.outputs.sampling = true;
    ctx.outputs.solved_lamp = false;
}

fn active_exit(ctx: &mut PuzzleContext) {
    ctx.outputs.sampling = false;
}

fn active_update(ctx: &mut PuzzleContext) -> Option<PuzzleState> {
    ctx.predicate
        .evaluate(&ctx.snapshot)
        .then_some(PuzzleState::Completed)
}

// ── Completed (latched) ───────────────────────────────────────

fn completed_enter(ctx: &mut PuzzleContext) {
    ctx.outputs.solved_lamp = true;
    ctx.completion_pending = true;
    info!("Puzzle completed");
}

fn completed_exit(ctx: &mut PuzzleContext) {
    ctx.outputs.solved_lamp = false;
}

fn completed_update(_ctx: &mut PuzzleContext) -> Option<PuzzleState> {
    None
}
