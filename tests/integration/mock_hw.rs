//! Mock adapters for integration tests.
//!
//! Every mock records what the service did to it so tests can assert on
//! the wire bytes, lamp writes, and emitted events without sockets.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::rc::Rc;

use scapeprop::app::events::AppEvent;
use scapeprop::app::ports::{Clock, EventSink, InboundListener, OutboundLink};
use scapeprop::error::CommsError;
use scapeprop::http::transport::Transport;

// ── Clock ─────────────────────────────────────────────────────

/// Hand-driven clock.  `drift_us` is added on every read so bounded
/// wait loops inside the service terminate.
pub struct ManualClock {
    now_us: Cell<u64>,
    drift_us: u64,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now_us: Cell::new(0),
            drift_us: 0,
        }
    }

    pub fn drifting(drift_us: u64) -> Self {
        Self {
            now_us: Cell::new(0),
            drift_us,
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_us.set(self.now_us.get() + ms * 1_000);
    }

    pub fn set_ms(&self, ms: u64) {
        self.now_us.set(ms * 1_000);
    }

    fn read(&self) -> u64 {
        let t = self.now_us.get();
        self.now_us.set(t + self.drift_us);
        t
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.read() / 1_000
    }

    fn now_us(&self) -> u64 {
        self.read()
    }
}

// ── Streams ───────────────────────────────────────────────────

/// Shared state of one scripted connection.
#[derive(Debug, Default)]
pub struct Wire {
    /// Bytes the peer will send, in chunks.
    pub incoming: VecDeque<Vec<u8>>,
    /// Everything written by the service.
    pub written: Vec<u8>,
    /// The service called `close`.
    pub closed: bool,
    /// The peer hangs up once its script is exhausted.
    pub peer_hangs_up: bool,
    /// The peer hangs up right after the service writes.
    pub close_after_write: bool,
    /// Writes fail with an error.
    pub broken: bool,
}

impl Wire {
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }

    fn peer_gone(&self) -> bool {
        (self.peer_hangs_up && self.incoming.is_empty())
            || (self.close_after_write && !self.written.is_empty())
    }
}

pub type WireHandle = Rc<RefCell<Wire>>;

pub struct MockStream(pub WireHandle);

impl Transport for MockStream {
    type Error = &'static str;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, &'static str> {
        let mut wire = self.0.borrow_mut();
        let Some(chunk) = wire.incoming.front_mut() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        chunk.drain(..n);
        if chunk.is_empty() {
            wire.incoming.pop_front();
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, &'static str> {
        let mut wire = self.0.borrow_mut();
        if wire.broken {
            return Err("broken pipe");
        }
        wire.written.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), &'static str> {
        Ok(())
    }

    fn available(&self) -> bool {
        !self.0.borrow().incoming.is_empty()
    }

    fn is_open(&self) -> bool {
        let wire = self.0.borrow();
        !wire.closed && !wire.peer_gone()
    }

    fn close(&mut self) {
        self.0.borrow_mut().closed = true;
    }
}

// ── Inbound ───────────────────────────────────────────────────

/// Hands out queued client connections, one per `accept`.
#[derive(Default)]
pub struct MockListener {
    queue: VecDeque<WireHandle>,
}

#[allow(dead_code)]
impl MockListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a client that sends `raw` in one piece and then waits.
    pub fn push_request(&mut self, raw: &str) -> WireHandle {
        self.push_chunks(&[raw.as_bytes()], false)
    }

    pub fn push_chunks(&mut self, chunks: &[&[u8]], hang_up: bool) -> WireHandle {
        let wire = Rc::new(RefCell::new(Wire {
            incoming: chunks.iter().map(|c| c.to_vec()).collect(),
            peer_hangs_up: hang_up,
            ..Wire::default()
        }));
        self.queue.push_back(Rc::clone(&wire));
        wire
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl InboundListener for MockListener {
    type Stream = MockStream;

    fn accept(&mut self) -> Option<MockStream> {
        self.queue.pop_front().map(MockStream)
    }
}

// ── Outbound ──────────────────────────────────────────────────

/// Orchestrator stand-in.  Records every connection it opens.
pub struct MockLink {
    pub refuse: bool,
    /// Orchestrator closes each connection after reading the request.
    pub peer_closes: bool,
    pub opened: Vec<WireHandle>,
    pub open_attempts: u32,
    pub reinit_count: u32,
}

#[allow(dead_code)]
impl MockLink {
    pub fn new() -> Self {
        Self {
            refuse: false,
            peer_closes: true,
            opened: Vec::new(),
            open_attempts: 0,
            reinit_count: 0,
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new()
        }
    }

    /// Every request written so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.opened
            .iter()
            .map(|w| w.borrow().written_text())
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn requests_to(&self, path: &str) -> Vec<String> {
        let prefix = format!("POST {path} ");
        self.requests()
            .into_iter()
            .filter(|r| r.starts_with(&prefix))
            .collect()
    }
}

impl OutboundLink for MockLink {
    type Stream = MockStream;

    fn open(&mut self, _timeout_ms: u32) -> Result<MockStream, CommsError> {
        self.open_attempts += 1;
        if self.refuse {
            return Err(CommsError::ConnectFailed);
        }
        let wire = Rc::new(RefCell::new(Wire {
            close_after_write: self.peer_closes,
            ..Wire::default()
        }));
        self.opened.push(Rc::clone(&wire));
        Ok(MockStream(wire))
    }

    fn local_ip(&self) -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)))
    }

    fn reinitialize(&mut self) {
        self.reinit_count += 1;
    }
}

// ── Events ────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
