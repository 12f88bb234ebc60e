//! Command listener: one inbound request per call, every wait bounded.
//!
//! ```text
//!  accept ─▶ request line ─▶ headers ─▶ body ─▶ route ─▶ respond + close
//!            ≤ request_line_ms  ≤ header_ms  ≤ body_ms
//! ```
//!
//! Each phase has its own budget, measured from the moment the previous
//! phase completed.  A stalled phase aborts the read:
//!
//! | Stalled in   | Outcome                                           |
//! |--------------|---------------------------------------------------|
//! | request line | connection dropped without a response             |
//! | headers      | GET routed as-is; POST gets "Headers incomplete"  |
//! | body         | "Body incomplete"                                 |
//!
//! A POST without a positive `Content-Length` is refused before routing.

use log::debug;

use super::codec::{Phase, RequestDecoder};
use super::request::{Rejection, Route, route};
use super::response::Response;
use super::transport::{Transport, write_all_within};
use crate::app::ports::{Clock, InboundListener};
use crate::config::PropConfig;
use crate::error::{CommsError, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerTimeouts {
    pub request_line_ms: u32,
    pub header_ms: u32,
    pub body_ms: u32,
    pub write_ms: u32,
}

impl ListenerTimeouts {
    pub fn from_config(config: &PropConfig) -> Self {
        Self {
            request_line_ms: config.request_line_timeout_ms,
            header_ms: config.header_timeout_ms,
            body_ms: config.body_timeout_ms,
            write_ms: 100,
        }
    }

    fn for_phase(&self, phase: Phase) -> u64 {
        u64::from(match phase {
            Phase::RequestLine => self.request_line_ms,
            Phase::Headers => self.header_ms,
            Phase::Body => self.body_ms,
            Phase::Complete => 0,
        })
    }
}

impl Default for ListenerTimeouts {
    fn default() -> Self {
        Self::from_config(&PropConfig::default())
    }
}

enum Stall {
    Protocol(ProtocolError),
    TimedOut,
    Closed,
}

/// A decoded request awaiting its response.
pub struct Inbound<S: Transport> {
    stream: S,
    route: Route,
    received_us: u64,
    write_ms: u32,
}

impl<S: Transport> Inbound<S> {
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Uptime (µs) at which the request line arrived.
    pub fn received_us(&self) -> u64 {
        self.received_us
    }

    /// Write the response and close the connection.
    pub fn respond(mut self, response: &Response<'_>, clock: &impl Clock) -> Result<(), CommsError> {
        let wire = response.encode();
        let result = write_all_within(&mut self.stream, wire.as_bytes(), clock, self.write_ms);
        self.stream.close();
        if let Err(e) = result {
            debug!("response not delivered: {e}");
        }
        result
    }
}

pub struct CommandListener {
    decoder: RequestDecoder,
    timeouts: ListenerTimeouts,
}

impl CommandListener {
    pub fn new(timeouts: ListenerTimeouts, body_cap: usize) -> Self {
        Self {
            decoder: RequestDecoder::with_body_cap(body_cap),
            timeouts,
        }
    }

    pub fn from_config(config: &PropConfig) -> Self {
        Self::new(ListenerTimeouts::from_config(config), config.max_body_bytes)
    }

    /// Accept and decode at most one request.  `None` when nothing was
    /// pending or the client never sent a request line.
    pub fn poll<L: InboundListener>(
        &mut self,
        listener: &mut L,
        clock: &impl Clock,
    ) -> Option<Inbound<L::Stream>> {
        let mut stream = listener.accept()?;
        self.decoder.reset();

        let mut buf = [0u8; 128];
        let mut phase = Phase::RequestLine;
        let mut phase_started = clock.now_ms();
        let mut received_us = None;

        let outcome = loop {
            if phase == Phase::Complete {
                break Ok(());
            }
            let n = match stream.read(&mut buf) {
                Ok(n) => n,
                Err(e) => {
                    debug!("inbound read failed: {:?}", e);
                    break Err(Stall::Closed);
                }
            };
            if n > 0 {
                match self.decoder.feed(&buf[..n]) {
                    Ok(next) if next != phase => {
                        if phase == Phase::RequestLine {
                            received_us = Some(clock.now_us());
                        }
                        phase = next;
                        phase_started = clock.now_ms();
                    }
                    Ok(_) => {}
                    Err(e) => break Err(Stall::Protocol(e)),
                }
                continue;
            }
            if !stream.is_open() {
                break Err(Stall::Closed);
            }
            if clock.now_ms().saturating_sub(phase_started) >= self.timeouts.for_phase(phase) {
                break Err(Stall::TimedOut);
            }
            core::hint::spin_loop();
        };

        let route = match outcome {
            Ok(()) => match self.decoder.request_line() {
                None => Route::Reject(Rejection::MalformedRequest),
                // A POST carries its command in a sized body.
                Some(line)
                    if line.method == "POST"
                        && !self.decoder.content_length().is_some_and(|n| n > 0) =>
                {
                    Route::Reject(Rejection::InvalidContentLength)
                }
                Some(line) => route(&line, self.decoder.body()),
            },
            Err(Stall::Protocol(e)) => {
                debug!("inbound protocol error: {e}");
                Route::Reject(e.into())
            }
            Err(Stall::TimedOut | Stall::Closed) => match phase {
                Phase::RequestLine => {
                    debug!("inbound connection dropped before request line");
                    stream.close();
                    return None;
                }
                Phase::Headers => match self.decoder.request_line() {
                    Some(line) if line.method == "GET" => route(&line, &[]),
                    _ => Route::Reject(Rejection::HeadersIncomplete),
                },
                Phase::Body | Phase::Complete => Route::Reject(Rejection::BodyIncomplete),
            },
        };

        Some(Inbound {
            stream,
            route,
            received_us: received_us.unwrap_or_else(|| clock.now_us()),
            write_ms: self.timeouts.write_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::codec::MAX_BODY_SIZE;
    use core::cell::Cell;
    use std::collections::VecDeque;

    struct Ticking(Cell<u64>);

    impl Clock for Ticking {
        fn now_ms(&self) -> u64 {
            let t = self.0.get() + 1;
            self.0.set(t);
            t
        }

        fn now_us(&self) -> u64 {
            self.0.get() * 1_000
        }
    }

    /// Delivers queued chunks one per read, then stalls (or closes).
    struct Scripted {
        chunks: VecDeque<&'static [u8]>,
        close_when_empty: bool,
        open: bool,
        written: Vec<u8>,
    }

    impl Transport for Scripted {
        type Error = ();

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => {
                    if self.close_when_empty {
                        self.open = false;
                    }
                    Ok(0)
                }
            }
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
            self.written.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> Result<(), ()> {
            Ok(())
        }

        fn available(&self) -> bool {
            !self.chunks.is_empty()
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn close(&mut self) {
            self.open = false;
        }
    }

    struct OneShot(Option<Scripted>);

    impl InboundListener for OneShot {
        type Stream = Scripted;

        fn accept(&mut self) -> Option<Scripted> {
            self.0.take()
        }
    }

    fn pending(chunks: &[&'static [u8]], close_when_empty: bool) -> OneShot {
        OneShot(Some(Scripted {
            chunks: chunks.iter().copied().collect(),
            close_when_empty,
            open: true,
            written: Vec::new(),
        }))
    }

    fn listener() -> CommandListener {
        CommandListener::new(
            ListenerTimeouts {
                request_line_ms: 100,
                header_ms: 600,
                body_ms: 600,
                write_ms: 100,
            },
            MAX_BODY_SIZE,
        )
    }


    #[test]
    fn nothing_pending_is_none() {
        let clock = Ticking(Cell::new(0));
        assert!(listener().poll(&mut OneShot(None), &clock).is_none());
    }

    #[test]
    fn routes_complete_control_post() {
        let clock = Ticking(Cell::new(0));
        let mut src = pending(
            &[b"POST /control HTTP/1.1\r\n", b"Content-Length: 19\r\n\r\n", b"{\"command\":\"start\"}"],
            false,
        );
        let inbound = listener().poll(&mut src, &clock).unwrap();
        assert_eq!(
            inbound.route(),
            &Route::Control(crate::app::commands::ControlCommand::Start)
        );
    }

    #[test]
    fn post_needs_a_content_length() {
        let clock = Ticking(Cell::new(0));
        let mut src = pending(&[b"POST /control?command=start HTTP/1.1\r\n\r\n"], false);
        let inbound = listener().poll(&mut src, &clock).unwrap();
        assert_eq!(inbound.route(), &Route::Reject(Rejection::InvalidContentLength));

        let mut src = pending(
            &[b"POST /control?command=stop HTTP/1.1\r\nContent-Length: 0\r\n\r\n"],
            false,
        );
        let inbound = listener().poll(&mut src, &clock).unwrap();
        assert_eq!(inbound.route(), &Route::Reject(Rejection::InvalidContentLength));
    }

    #[test]
    fn silent_client_is_dropped() {
        let clock = Ticking(Cell::new(0));
        let mut src = pending(&[], false);
        assert!(listener().poll(&mut src, &clock).is_none());
        assert!(clock.0.get() >= 100);
    }

    #[test]
    fn partial_request_line_then_close_is_dropped() {
        let clock = Ticking(Cell::new(0));
        let mut src = pending(&[b"GET /Pi"], true);
        assert!(listener().poll(&mut src, &clock).is_none());
    }

    #[test]
    fn stalled_headers_still_route_get() {
        let clock = Ticking(Cell::new(0));
        let mut src = pending(&[b"GET /Ping?time=42 HTTP/1.1\r\nHost: x\r\n"], false);
        let inbound = listener().poll(&mut src, &clock).unwrap();
        assert!(matches!(inbound.route(), Route::Probe { time } if time.as_str() == "42"));
    }

    #[test]
    fn stalled_headers_reject_post() {
        let clock = Ticking(Cell::new(0));
        let mut src = pending(&[b"POST /control HTTP/1.1\r\nContent-Len"], false);
        let inbound = listener().poll(&mut src, &clock).unwrap();
        assert_eq!(inbound.route(), &Route::Reject(Rejection::HeadersIncomplete));
    }

    #[test]
    fn short_body_is_incomplete() {
        let clock = Ticking(Cell::new(0));
        let mut src = pending(
            &[b"POST /control HTTP/1.1\r\nContent-Length: 40\r\n\r\n{\"command\""],
            false,
        );
        let inbound = listener().poll(&mut src, &clock).unwrap();
        assert_eq!(inbound.route(), &Route::Reject(Rejection::BodyIncomplete));
    }

    #[test]
    fn oversized_body_is_rejected_before_reading_it() {
        let clock = Ticking(Cell::new(0));
        let mut src = pending(&[b"POST /control HTTP/1.1\r\nContent-Length: 9000\r\n\r\n"], false);
        let inbound = listener().poll(&mut src, &clock).unwrap();
        assert_eq!(inbound.route(), &Route::Reject(Rejection::BodyTooLarge));
    }

    #[test]
    fn respond_writes_and_closes() {
        let clock = Ticking(Cell::new(0));
        let mut src = pending(&[b"GET /nowhere HTTP/1.1\r\n\r\n"], false);
        let inbound = listener().poll(&mut src, &clock).unwrap();
        let message = match inbound.route() {
            Route::Reject(r) => r.message(),
            other => panic!("unexpected {other:?}"),
        };
        inbound.respond(&Response::BadRequest(message), &clock).unwrap();
    }
}
