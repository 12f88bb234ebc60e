//! Transport abstraction: any non-blocking byte stream.
//!
//! Concrete implementations:
//! - TCP socket on the host (`adapters::net`)
//! - scripted in-memory streams in tests
//!
//! The listener and reporting client are generic over `Transport`; every
//! wait on a stream goes through the bounded helpers below, so no call in
//! the control loop can block past its window.

use log::debug;

use crate::app::ports::Clock;
use crate::error::CommsError;
use crate::scheduler::Deadline;

/// Non-blocking byte stream.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns 0 if no data is available right now.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write as much of `data` as fits right now.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Check if data is available for reading.
    fn available(&self) -> bool;

    /// `false` once the peer has closed its side.
    fn is_open(&self) -> bool;

    /// Shut the stream down.  Idempotent.
    fn close(&mut self);
}

/// A null transport that discards all writes and never reads.
pub struct NullTransport;

impl Transport for NullTransport {
    type Error = ();

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, ()> {
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn available(&self) -> bool {
        false
    }

    fn is_open(&self) -> bool {
        true
    }

    fn close(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Bounded helpers
// ───────────────────────────────────────────────────────────────

/// Write all of `data`, giving up after `timeout_ms`.
pub fn write_all_within<T: Transport>(
    stream: &mut T,
    data: &[u8],
    clock: &impl Clock,
    timeout_ms: u32,
) -> Result<(), CommsError> {
    let deadline = Deadline::after(clock.now_ms(), timeout_ms);
    let mut sent = 0;

    while sent < data.len() {
        match stream.write(&data[sent..]) {
            Ok(0) => {
                if !stream.is_open() {
                    return Err(CommsError::ConnectionLost);
                }
                if deadline.expired(clock.now_ms()) {
                    return Err(CommsError::WriteTimeout);
                }
                core::hint::spin_loop();
            }
            Ok(n) => sent += n,
            Err(e) => {
                debug!("transport write failed: {:?}", e);
                return Err(CommsError::ConnectionLost);
            }
        }
    }

    stream.flush().map_err(|e| {
        debug!("transport flush failed: {:?}", e);
        CommsError::ConnectionLost
    })
}

/// Most bytes a single [`drain_available`] call will discard.
pub const DRAIN_BUDGET: usize = 512;

/// Read and discard what is buffered right now, up to [`DRAIN_BUDGET`]
/// bytes.  Returns bytes dropped.
pub fn drain_available<T: Transport>(stream: &mut T) -> usize {
    let mut scratch = [0u8; 64];
    let mut total = 0;
    while total < DRAIN_BUDGET {
        match stream.read(&mut scratch) {
            Ok(0) | Err(_) => break,
            Ok(n) => total += n,
        }
    }
    total
}

/// Discard incoming bytes until `window_ms` elapses or the peer closes.
pub fn drain_within<T: Transport>(stream: &mut T, clock: &impl Clock, window_ms: u32) -> usize {
    let deadline = Deadline::after(clock.now_ms(), window_ms);
    let mut total = 0;
    while stream.is_open() && !deadline.expired(clock.now_ms()) {
        let n = drain_available(stream);
        if n == 0 {
            core::hint::spin_loop();
        }
        total += n;
    }
    total
}
