//! Outbound application events.
//!
//! The [`PropService`](super::service::PropService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters decide where they
//! go (log line, test recorder, nowhere).

use crate::app::commands::ControlCommand;
use crate::fsm::PuzzleState;
use crate::link::reporter::ReportKind;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service booted (carries initial puzzle state).
    Started(PuzzleState),

    /// The puzzle machine changed state.
    StateChanged { from: PuzzleState, to: PuzzleState },

    /// A remote command was accepted.
    CommandApplied(ControlCommand),

    /// An inbound request was answered with a client error.
    RequestRejected(&'static str),

    /// A `/Ping` probe was answered.
    ProbeAnswered { elapsed_us: u64 },

    /// Debounced channel value changed.
    ChannelChanged { channel: usize, on: bool },

    /// Completion detected and queued for delivery.
    Completed,

    /// Handshake accepted; link is up.
    LinkUp,

    /// Link declared down.
    LinkDown,

    /// Next reconnect attempt scheduled.
    ReconnectScheduled { delay_ms: u32 },

    /// Network peripheral reinitialised after repeated failures.
    PeripheralReset,

    /// An outbound report was written.
    ReportSent(ReportKind),

    /// An outbound report could not be written.
    ReportFailed(ReportKind),
}
