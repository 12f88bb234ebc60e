//! `PuzzleMachine`: command and snapshot facade over the table FSM.
//!
//! | Command   | From            | To                                      |
//! |-----------|-----------------|-----------------------------------------|
//! | `start`   | any             | ReadyCountdown (delay > 0) or Active    |
//! | `stop`    | any but Idle    | Idle                                    |
//! | `restart` | any             | Idle or re-armed, per [`RestartPolicy`] |
//!
//! Arming always replaces the context snapshot with the caller's freshly
//! reset one, so stale channel values can never complete a new round.

use log::info;

use super::context::{PuzzleContext, PuzzleOutputs};
use super::predicate::CompletionPredicate;
use super::states::build_state_table;
use super::{Fsm, PuzzleState};
use crate::app::commands::ControlCommand;
use crate::config::{PropConfig, RestartPolicy};
use crate::sensors::Snapshot;

/// `(from, to)`; equal when a state was re-entered.
pub type Transition = (PuzzleState, PuzzleState);

pub struct PuzzleMachine {
    fsm: Fsm,
    ctx: PuzzleContext,
    restart_policy: RestartPolicy,
}

impl PuzzleMachine {
    /// Builds the machine in Idle; call [`boot`](Self::boot) next.
    pub fn new(
        predicate: CompletionPredicate,
        ready_delay_ms: u32,
        restart_policy: RestartPolicy,
    ) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), PuzzleState::Idle),
            ctx: PuzzleContext::new(predicate, ready_delay_ms),
            restart_policy,
        }
    }

    pub fn from_config(config: &PropConfig) -> Self {
        Self::new(
            CompletionPredicate::from_config(config),
            config.ready_delay_ms,
            config.restart_policy,
        )
    }

    pub fn boot(&mut self, now_ms: u64) {
        self.ctx.now_ms = now_ms;
        self.fsm.start(&mut self.ctx);
    }

    /// Apply a remote command.  `fresh` is the just-reset sensor snapshot.
    pub fn apply(
        &mut self,
        command: ControlCommand,
        now_ms: u64,
        fresh: &Snapshot,
    ) -> Option<Transition> {
        self.ctx.now_ms = now_ms;
        match command {
            ControlCommand::Start => Some(self.arm(fresh)),
            ControlCommand::Stop => self.to_idle(),
            ControlCommand::Restart => match self.restart_policy {
                RestartPolicy::ToIdle => self.to_idle(),
                RestartPolicy::Rearm => Some(self.arm(fresh)),
            },
        }
    }

    /// Advance timers (countdown expiry) and re-check the predicate.
    pub fn advance(&mut self, now_ms: u64) -> Option<Transition> {
        self.ctx.now_ms = now_ms;
        let from = self.state();
        self.fsm.tick(&mut self.ctx);
        let to = self.state();
        (from != to).then_some((from, to))
    }

    /// Feed a new snapshot.  Ignored unless Active.
    pub fn observe(&mut self, snapshot: &Snapshot, now_ms: u64) -> Option<Transition> {
        if !self.is_sampling() {
            return None;
        }
        self.ctx.snapshot.clone_from(snapshot);
        self.advance(now_ms)
    }

    /// `true` exactly once per entry into Completed.
    pub fn take_completion(&mut self) -> bool {
        core::mem::take(&mut self.ctx.completion_pending)
    }

    pub fn state(&self) -> PuzzleState {
        self.fsm.current_state()
    }

    pub fn is_sampling(&self) -> bool {
        self.ctx.outputs.sampling
    }

    pub fn outputs(&self) -> PuzzleOutputs {
        self.ctx.outputs
    }

    /// Countdown time left, `None` outside ReadyCountdown.
    pub fn countdown_remaining_ms(&self) -> Option<u64> {
        (self.state() == PuzzleState::ReadyCountdown).then(|| {
            u64::from(self.ctx.ready_delay_ms).saturating_sub(self.ctx.ms_in_state())
        })
    }

    fn arm(&mut self, fresh: &Snapshot) -> Transition {
        let from = self.state();
        self.ctx.snapshot.clone_from(fresh);
        self.ctx.completion_pending = false;

        let target = if self.ctx.ready_delay_ms > 0 {
            PuzzleState::ReadyCountdown
        } else {
            PuzzleState::Active
        };
        if from == target {
            self.fsm.reenter(&mut self.ctx);
        } else {
            self.fsm.force_transition(target, &mut self.ctx);
        }
        info!("Puzzle armed: {:?} -> {:?}", from, target);
        (from, target)
    }

    fn to_idle(&mut self) -> Option<Transition> {
        let from = self.state();
        if from == PuzzleState::Idle {
            return None;
        }
        self.fsm.force_transition(PuzzleState::Idle, &mut self.ctx);
        Some((from, PuzzleState::Idle))
    }
}
