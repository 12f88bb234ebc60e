//! Outbound reports to the orchestrator.
//!
//! ```text
//!   enqueue ──▶ pending (≤ 4) ──flush──▶ send_now ──▶ in_flight ──poll──▶ closed
//!                                          │            (drain window)
//!                                          └─ fire-and-forget: closed at once
//! ```
//!
//! Only one report owns the outbound slot at a time.  An await-brief
//! report keeps its stream open until the drain window ends or the
//! orchestrator closes; [`poll`](ReportingClient::poll) retires it
//! without blocking, and nothing new is written until then.
//!
//! Dispatches go through the pending queue.  A newer state-change
//! snapshot replaces a queued one; completions are never evicted.  A
//! completion arriving at a queue full of completions takes the place of
//! the newest one, so every queued completion still reaches the
//! orchestrator as part of a later one.  A dispatch that fails mid-write
//! goes back to the front of the queue.

use heapless::Deque;
use log::{debug, warn};

use super::payload::{self, DispatchData};
use crate::app::ports::{Clock, OutboundLink};
use crate::config::PropConfig;
use crate::error::CommsError;
use crate::http::outbound::{encode_keepalive_get, encode_post};
use crate::http::transport::{Transport, drain_available, drain_within, write_all_within};
use crate::scheduler::Deadline;

pub const PENDING_CAPACITY: usize = 4;

/// Drain window for the pong side channel.
pub const PONG_DRAIN_MS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Connect,
    Heartbeat,
    StateChange,
    Completion,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Heartbeat => "heartbeat",
            Self::StateChange => "state-change",
            Self::Completion => "completion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Write, close, forget.
    FireAndForget,
    /// Write, then discard any response for up to `drain_ms`.
    AwaitBrief { drain_ms: u32 },
}

impl DeliveryMode {
    /// A zero window means fire-and-forget.
    pub fn from_drain_ms(drain_ms: u32) -> Self {
        if drain_ms == 0 {
            Self::FireAndForget
        } else {
            Self::AwaitBrief { drain_ms }
        }
    }
}

/// A serialised report ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub kind: ReportKind,
    pub path: &'static str,
    pub body: String,
}

impl Report {
    pub fn connect(device_id: &str, ip: &str, port: u16) -> Result<Self, CommsError> {
        Ok(Self {
            kind: ReportKind::Connect,
            path: payload::CONNECT_PATH,
            body: payload::connect_body(device_id, ip, port)?,
        })
    }

    pub fn heartbeat(device_id: &str) -> Result<Self, CommsError> {
        Ok(Self {
            kind: ReportKind::Heartbeat,
            path: payload::HEARTBEAT_PATH,
            body: payload::heartbeat_body(device_id)?,
        })
    }

    /// `/dispatch`; the kind follows the `completed` flag in `data`.
    pub fn dispatch(
        device_id: &str,
        event: &str,
        data: DispatchData,
        completed: bool,
    ) -> Result<Self, CommsError> {
        Ok(Self {
            kind: if completed {
                ReportKind::Completion
            } else {
                ReportKind::StateChange
            },
            path: payload::DISPATCH_PATH,
            body: payload::dispatch_body(device_id, event, data)?,
        })
    }
}

struct InFlight<S> {
    stream: S,
    deadline: Deadline,
    kind: ReportKind,
}

pub struct ReportingClient<S: Transport> {
    host: String,
    connect_timeout_ms: u32,
    write_timeout_ms: u32,
    in_flight: Option<InFlight<S>>,
    pending: Deque<Report, PENDING_CAPACITY>,
    keepalive: Option<S>,
}

impl<S: Transport> ReportingClient<S> {
    pub fn new(host: String, connect_timeout_ms: u32, write_timeout_ms: u32) -> Self {
        Self {
            host,
            connect_timeout_ms,
            write_timeout_ms,
            in_flight: None,
            pending: Deque::new(),
            keepalive: None,
        }
    }

    pub fn from_config(config: &PropConfig) -> Self {
        Self::new(
            format!("{}:{}", config.server_host, config.server_port),
            config.connect_timeout_ms,
            config.write_timeout_ms,
        )
    }

    /// Retire the in-flight report once its drain window is over or the
    /// peer closed.  Returns its kind when the slot frees up.
    pub fn poll(&mut self, clock: &impl Clock) -> Option<ReportKind> {
        let flight = self.in_flight.as_mut()?;
        drain_available(&mut flight.stream);
        if flight.stream.is_open() && !flight.deadline.expired(clock.now_ms()) {
            return None;
        }
        let mut done = self.in_flight.take()?;
        done.stream.close();
        debug!("report: {} retired", done.kind.as_str());
        Some(done.kind)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Open a connection and write `report`.  Fails with
    /// [`CommsError::Busy`] while another report holds the slot.
    pub fn send_now<L>(
        &mut self,
        link: &mut L,
        report: &Report,
        mode: DeliveryMode,
        clock: &impl Clock,
    ) -> Result<(), CommsError>
    where
        L: OutboundLink<Stream = S>,
    {
        if self.is_busy() {
            return Err(CommsError::Busy);
        }
        let mut stream = link.open(self.connect_timeout_ms)?;
        let wire = encode_post(&self.host, report.path, &report.body);
        if let Err(e) = write_all_within(&mut stream, wire.as_bytes(), clock, self.write_timeout_ms) {
            stream.close();
            return Err(e);
        }
        debug!("report: {} → {}", report.kind.as_str(), report.path);

        match mode {
            DeliveryMode::FireAndForget => stream.close(),
            DeliveryMode::AwaitBrief { drain_ms } => {
                self.in_flight = Some(InFlight {
                    stream,
                    deadline: Deadline::after(clock.now_ms(), drain_ms),
                    kind: report.kind,
                });
            }
        }
        Ok(())
    }

    /// Queue a dispatch for the next free slot.
    pub fn enqueue(&mut self, report: Report) {
        if report.kind == ReportKind::StateChange {
            if let Some(back) = self.pending.back_mut() {
                if back.kind == ReportKind::StateChange {
                    *back = report;
                    return;
                }
            }
        }
        if self.pending.is_full() && !self.evict_stale_state_change() {
            if report.kind == ReportKind::StateChange {
                warn!("report: queue full of completions, state change dropped");
                return;
            }
            // Replaces the newest queued completion; older ones keep their place.
            if let Some(back) = self.pending.back_mut() {
                warn!("report: queue full of completions, coalescing into newest");
                *back = report;
                return;
            }
        }
        // Room was made above.
        let _ = self.pending.push_back(report);
    }

    /// Send the oldest queued dispatch if the slot is free.  A failed
    /// write requeues it at the front.
    pub fn flush_pending<L>(
        &mut self,
        link: &mut L,
        mode: DeliveryMode,
        clock: &impl Clock,
    ) -> Option<(ReportKind, Result<(), CommsError>)>
    where
        L: OutboundLink<Stream = S>,
    {
        if self.is_busy() {
            return None;
        }
        let report = self.pending.pop_front()?;
        let kind = report.kind;
        let result = self.send_now(link, &report, mode, clock);
        if result.is_err() {
            // Just popped, so there is room.
            let _ = self.pending.push_front(report);
        }
        Some((kind, result))
    }

    /// Latency side channel: `GET target` on a kept-alive connection.
    /// Skipped while a report is in flight.
    pub fn echo_pong<L>(&mut self, link: &mut L, target: &str, clock: &impl Clock) -> Result<(), CommsError>
    where
        L: OutboundLink<Stream = S>,
    {
        if self.is_busy() {
            return Err(CommsError::Busy);
        }
        let wire = encode_keepalive_get(&self.host, target);
        if let Some(stream) = self.keepalive.as_mut() {
            if stream.is_open()
                && write_all_within(stream, wire.as_bytes(), clock, self.write_timeout_ms).is_ok()
            {
                drain_within(stream, clock, PONG_DRAIN_MS);
                return Ok(());
            }
            debug!("pong: kept-alive stream failed, reopening");
            self.drop_keepalive();
        }

        let mut stream = link.open(self.connect_timeout_ms)?;
        if let Err(e) = write_all_within(&mut stream, wire.as_bytes(), clock, self.write_timeout_ms) {
            stream.close();
            return Err(e);
        }
        drain_within(&mut stream, clock, PONG_DRAIN_MS);
        self.keepalive = Some(stream);
        Ok(())
    }

    pub fn drop_keepalive(&mut self) {
        if let Some(mut stream) = self.keepalive.take() {
            stream.close();
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_kinds(&self) -> impl Iterator<Item = ReportKind> + '_ {
        self.pending.iter().map(|r| r.kind)
    }

    pub fn pending_front(&self) -> Option<&Report> {
        self.pending.front()
    }

    fn evict_stale_state_change(&mut self) -> bool {
        let Some(pos) = self.pending.iter().position(|r| r.kind == ReportKind::StateChange) else {
            return false;
        };
        let mut kept: Deque<Report, PENDING_CAPACITY> = Deque::new();
        for (i, r) in self.pending.iter().enumerate() {
            if i != pos {
                let _ = kept.push_back(r.clone());
            }
        }
        self.pending = kept;
        true
    }
}
