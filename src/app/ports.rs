//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PropService (domain)
//! ```
//!
//! Driven adapters (channel inputs, indicator lamps, sockets, clocks, event
//! sinks) implement these traits.  The [`PropService`](super::service::PropService)
//! consumes them via generics, so the domain core never touches hardware
//! or sockets directly.
//!
//! Every port is non-blocking: a call returns what is available now.

use core::net::IpAddr;

use crate::error::CommsError;
use crate::http::transport::Transport;
use crate::sensors::ChannelReading;

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Monotonic time since boot.  Never goes backwards.
pub trait Clock {
    fn now_ms(&self) -> u64;
    fn now_us(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: one reading per channel per call.
pub trait SensorPort {
    fn channel_count(&self) -> usize;

    /// Out-of-range indices read as [`ChannelReading::Unavailable`].
    fn read_channel(&mut self, index: usize) -> ChannelReading;
}

// ───────────────────────────────────────────────────────────────
// Indicator port (driven adapter: domain → lamps)
// ───────────────────────────────────────────────────────────────

/// Coarse status shown on the prop's status lamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIndicator {
    /// Orchestrator link down.
    Offline,
    /// Linked; puzzle idle or counting down.
    Waiting,
    /// Linked; puzzle active.
    Running,
    /// Puzzle completed.
    Latched,
}

/// Write-side port.  Mapping to actual LEDs is the adapter's business.
pub trait IndicatorPort {
    fn set_status(&mut self, status: StatusIndicator);
    fn set_ready_lamp(&mut self, on: bool);
    fn set_solved_lamp(&mut self, on: bool);
    /// Mirror of a boolean channel's debounced value.
    fn set_channel_lamp(&mut self, channel: usize, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&mut self, _event: &super::events::AppEvent) {}
}

// ───────────────────────────────────────────────────────────────
// Network ports
// ───────────────────────────────────────────────────────────────

/// Local command socket.  At most one connection is handed out per call;
/// the service closes it before asking again.
pub trait InboundListener {
    type Stream: Transport;

    /// A pending connection, if any.  Never blocks.
    fn accept(&mut self) -> Option<Self::Stream>;
}

/// Outbound connections to the orchestrator.
pub trait OutboundLink {
    type Stream: Transport;

    /// Open a fresh connection within `timeout_ms`.
    fn open(&mut self, timeout_ms: u32) -> Result<Self::Stream, CommsError>;

    /// Address announced in the `/connect` handshake.
    fn local_ip(&self) -> Option<IpAddr>;

    /// Hard-reset the network peripheral after repeated failures.
    fn reinitialize(&mut self);
}
