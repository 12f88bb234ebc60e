//! Response encoding for the command listener.
//!
//! Every response carries `Connection: close`.  Timestamps come from
//! device uptime; the prop has no wall clock.

use core::fmt::{self, Write as _};

use serde::Serialize;

use super::request::ProbeTime;
use crate::app::commands::ControlCommand;

/// `1970-01-01THH:MM:SS.mmmZ` from uptime.  Hours wrap every 24 h.
pub fn uptime_timestamp(uptime_ms: u64) -> heapless::String<32> {
    let total_secs = uptime_ms / 1_000;
    let millis = uptime_ms % 1_000;
    let hours = (total_secs / 3_600) % 24;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;

    let mut out = heapless::String::new();
    // 24 chars, always fits.
    let _ = write!(
        out,
        "1970-01-01T{hours:02}:{minutes:02}:{seconds:02}.{millis:03}Z"
    );
    out
}

// ───────────────────────────────────────────────────────────────
// Probe echo
// ───────────────────────────────────────────────────────────────

/// Round-trip instrumentation for one `/Ping`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEcho {
    pub time: ProbeTime,
    /// Uptime at request receipt (µs).
    pub t1_us: u64,
    /// Uptime at response construction (µs).
    pub t2_us: u64,
}

fn ms(us: u64) -> f64 {
    us as f64 / 1_000.0
}

impl ProbeEcho {
    pub fn elapsed_us(&self) -> u64 {
        self.t2_us.saturating_sub(self.t1_us)
    }

    fn write_fields(&self, f: &mut impl fmt::Write, sep: char) -> fmt::Result {
        write!(
            f,
            "time={}{sep}t1_ms={:.3}{sep}t2_ms={:.3}{sep}dt_ms={:.3}",
            self.time,
            ms(self.t1_us),
            ms(self.t2_us),
            ms(self.elapsed_us()),
        )
    }

    /// `PONG SENT time=.. t1_ms=.. t2_ms=.. dt_ms=..`
    pub fn body(&self) -> String {
        let mut out = String::from("PONG SENT ");
        let _ = self.write_fields(&mut out, ' ');
        out
    }

    /// Target of the side-channel echo: `/Pong?time=..&t1_ms=..&..`
    pub fn pong_target(&self) -> String {
        let mut out = String::from("/Pong?");
        let _ = self.write_fields(&mut out, '&');
        out
    }
}

// ───────────────────────────────────────────────────────────────
// Responses
// ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ControlAck<'a> {
    status: &'a str,
    command: &'a str,
    timestamp: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response<'a> {
    /// 200 JSON acknowledging a control command.
    ControlOk {
        command: ControlCommand,
        uptime_ms: u64,
    },
    /// 200 text answer to a probe.
    Pong(&'a ProbeEcho),
    /// 400 text with a reason.
    BadRequest(&'static str),
}

impl Response<'_> {
    pub fn status(&self) -> u16 {
        match self {
            Self::ControlOk { .. } | Self::Pong(_) => 200,
            Self::BadRequest(_) => 400,
        }
    }

    /// Full wire bytes: status line, headers, body.
    pub fn encode(&self) -> String {
        let (content_type, body) = match self {
            Self::ControlOk { command, uptime_ms } => {
                let timestamp = uptime_timestamp(*uptime_ms);
                let ack = ControlAck {
                    status: "ok",
                    command: command.as_str(),
                    timestamp: &timestamp,
                };
                (
                    "application/json",
                    serde_json::to_string(&ack).unwrap_or_default(),
                )
            }
            Self::Pong(echo) => ("text/plain", echo.body()),
            Self::BadRequest(reason) => ("text/plain", (*reason).to_string()),
        };

        let reason = if self.status() == 200 {
            "OK"
        } else {
            "Bad Request"
        };
        format!(
            "HTTP/1.1 {} {reason}\r\nContent-Type: {content_type}\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{body}",
            self.status(),
            body.len(),
        )
    }
}
