//! Request routing.
//!
//! Maps a decoded request line (and body) onto one of three outcomes:
//!
//! | Method     | Path       | Needs                         | Route           |
//! |------------|------------|-------------------------------|-----------------|
//! | GET        | `/Ping`    | numeric `time=`               | `Probe`         |
//! | GET / POST | `/control` | `command` in query or JSON    | `Control`       |
//! | anything   | other      |                               | `Reject`        |
//!
//! Pure functions only, so the wire format is testable without sockets.

use serde::Deserialize;

use super::codec::RequestLine;
use crate::app::commands::ControlCommand;
use crate::error::ProtocolError;

pub const PROBE_PATH: &str = "/Ping";
pub const CONTROL_PATH: &str = "/control";

/// Longest accepted `time=` value (fits any u64).
pub const PROBE_TIME_LEN: usize = 20;

pub type ProbeTime = heapless::String<PROBE_TIME_LEN>;

/// Reasons for a 400 response.  No state changes for any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingTime,
    MissingCommand,
    UnknownCommand,
    InvalidJson,
    HeadersIncomplete,
    BodyIncomplete,
    InvalidContentLength,
    BodyTooLarge,
    MalformedRequest,
    UnknownEndpoint,
}

impl Rejection {
    /// Plain-text body of the 400 response.
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingTime => "Missing time= parameter in /Ping",
            Self::MissingCommand => "Missing command",
            Self::UnknownCommand => "Unknown command (use start, stop or restart)",
            Self::InvalidJson => "Invalid JSON body",
            Self::HeadersIncomplete => "Headers incomplete",
            Self::BodyIncomplete => "Body incomplete",
            Self::InvalidContentLength => "Invalid Content-Length",
            Self::BodyTooLarge => "Body too large",
            Self::MalformedRequest => "Malformed request line",
            Self::UnknownEndpoint => "Use POST /control or GET /Ping?time=123",
        }
    }
}

impl From<ProtocolError> for Rejection {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::MalformedRequestLine | ProtocolError::HeadTooLarge => {
                Self::MalformedRequest
            }
            ProtocolError::InvalidContentLength => Self::InvalidContentLength,
            ProtocolError::BodyTooLarge => Self::BodyTooLarge,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Round-trip probe; `time` is echoed verbatim.
    Probe { time: ProbeTime },
    Control(ControlCommand),
    Reject(Rejection),
}

#[derive(Deserialize)]
struct ControlBody {
    command: Option<String>,
}

/// `"/a?b=c"` → `("/a", Some("b=c"))`.
pub fn split_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

/// First value of `key` in the target's query string.
pub fn query_param<'a>(target: &'a str, key: &str) -> Option<&'a str> {
    let (_, query) = split_target(target);
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// Strip literal or `%22`-encoded double quotes around a query value.
fn unquote(value: &str) -> &str {
    let value = value
        .strip_prefix("%22")
        .or_else(|| value.strip_prefix('"'))
        .unwrap_or(value);
    value
        .strip_suffix("%22")
        .or_else(|| value.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_command(raw: &str) -> Route {
    match raw.parse::<ControlCommand>() {
        Ok(cmd) => Route::Control(cmd),
        Err(_) => Route::Reject(Rejection::UnknownCommand),
    }
}

fn route_control(target: &str, body: &[u8]) -> Route {
    if body.iter().any(|b| !b.is_ascii_whitespace()) {
        return match serde_json::from_slice::<ControlBody>(body) {
            Ok(ControlBody {
                command: Some(command),
            }) => parse_command(command.trim()),
            Ok(ControlBody { command: None }) => Route::Reject(Rejection::MissingCommand),
            Err(_) => Route::Reject(Rejection::InvalidJson),
        };
    }
    match query_param(target, "command") {
        Some(raw) if !unquote(raw).is_empty() => parse_command(unquote(raw)),
        _ => Route::Reject(Rejection::MissingCommand),
    }
}

fn route_probe(target: &str) -> Route {
    let time = query_param(target, "time").unwrap_or("");
    if time.is_empty() || !time.bytes().all(|b| b.is_ascii_digit()) {
        return Route::Reject(Rejection::MissingTime);
    }
    let mut echoed = ProbeTime::new();
    match echoed.push_str(time) {
        Ok(()) => Route::Probe { time: echoed },
        Err(()) => Route::Reject(Rejection::MissingTime),
    }
}

/// Decide what to do with a fully decoded request.
pub fn route(line: &RequestLine<'_>, body: &[u8]) -> Route {
    let (path, _) = split_target(line.target);

    if path.eq_ignore_ascii_case(PROBE_PATH) && line.method == "GET" {
        return route_probe(line.target);
    }
    if path == CONTROL_PATH && matches!(line.method, "GET" | "POST") {
        return route_control(line.target, body);
    }
    Route::Reject(Rejection::UnknownEndpoint)
}
