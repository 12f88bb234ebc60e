//! Streaming request decoder.
//!
//! Wire format (the subset of HTTP/1.x the props speak):
//! ```text
//! ┌──────────────────────────────┐
//! │ METHOD SP TARGET SP VERSION  │  request line
//! │ Name: value                  │  headers (only Content-Length used)
//! │ ...                          │
//! │ <empty line>                 │
//! │ body (Content-Length bytes)  │  capped at MAX_BODY_SIZE
//! └──────────────────────────────┘
//! ```
//!
//! The decoder accumulates bytes in fixed buffers and advances through
//! [`Phase`]s.  A single `Transport::read` may deliver part of a line or
//! the whole request; the decoder does not care.  It performs no I/O and
//! keeps no clock: timeouts per phase are the listener's job.

use heapless::Vec;

use crate::error::ProtocolError;

/// Request line plus headers.
pub const MAX_HEAD_SIZE: usize = 1024;

/// Largest body accepted.
pub const MAX_BODY_SIZE: usize = 512;

/// Decoder progress, reported after every `feed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RequestLine,
    Headers,
    Body,
    Complete,
}

#[derive(Debug, Clone, Copy)]
enum DecoderState {
    RequestLine,
    Headers { line_start: usize },
    Body { expected: usize },
    Complete,
}

/// Parsed request line, borrowed from the decoder's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLine<'a> {
    pub method: &'a str,
    pub target: &'a str,
    pub version: &'a str,
}

/// `METHOD TARGET [VERSION]`, surrounding whitespace ignored.
pub fn parse_request_line(line: &[u8]) -> Result<RequestLine<'_>, ProtocolError> {
    let text = core::str::from_utf8(line).map_err(|_| ProtocolError::MalformedRequestLine)?;
    let mut parts = text.split_whitespace();
    let method = parts.next().ok_or(ProtocolError::MalformedRequestLine)?;
    let target = parts.next().ok_or(ProtocolError::MalformedRequestLine)?;
    let version = parts.next().unwrap_or("");
    if parts.next().is_some() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ProtocolError::MalformedRequestLine);
    }
    Ok(RequestLine {
        method,
        target,
        version,
    })
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// `Some(n)` for a Content-Length header, `None` for any other header.
fn parse_content_length(line: &[u8], cap: usize) -> Result<Option<usize>, ProtocolError> {
    let Ok(text) = core::str::from_utf8(line) else {
        return Ok(None);
    };
    let Some((name, value)) = text.split_once(':') else {
        return Ok(None);
    };
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return Ok(None);
    }
    let n: usize = value
        .trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidContentLength)?;
    if n > cap {
        return Err(ProtocolError::BodyTooLarge);
    }
    Ok(Some(n))
}

/// Streaming request decoder.
pub struct RequestDecoder {
    state: DecoderState,
    head: Vec<u8, MAX_HEAD_SIZE>,
    line_end: usize,
    content_length: Option<usize>,
    body: Vec<u8, MAX_BODY_SIZE>,
    body_cap: usize,
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::with_body_cap(MAX_BODY_SIZE)
    }

    /// Decoder rejecting bodies above `cap` (clamped to [`MAX_BODY_SIZE`]).
    pub fn with_body_cap(cap: usize) -> Self {
        Self {
            state: DecoderState::RequestLine,
            head: Vec::new(),
            line_end: 0,
            content_length: None,
            body: Vec::new(),
            body_cap: cap.min(MAX_BODY_SIZE),
        }
    }

    /// Feed bytes into the decoder.  Bytes past a complete request are
    /// ignored.  After an error the decoder must be [`reset`](Self::reset).
    pub fn feed(&mut self, data: &[u8]) -> Result<Phase, ProtocolError> {
        for &b in data {
            match self.state {
                DecoderState::RequestLine => {
                    self.push_head(b)?;
                    if b == b'\n' {
                        self.line_end = self.head.len();
                        parse_request_line(trim_line_end(&self.head))?;
                        self.state = DecoderState::Headers {
                            line_start: self.head.len(),
                        };
                    }
                }

                DecoderState::Headers { line_start } => {
                    self.push_head(b)?;
                    if b == b'\n' {
                        let line = trim_line_end(&self.head[line_start..]);
                        if line.is_empty() {
                            self.state = match self.content_length {
                                Some(expected) if expected > 0 => DecoderState::Body { expected },
                                _ => DecoderState::Complete,
                            };
                        } else {
                            if let Some(n) = parse_content_length(line, self.body_cap)? {
                                self.content_length = Some(n);
                            }
                            self.state = DecoderState::Headers {
                                line_start: self.head.len(),
                            };
                        }
                    }
                }

                DecoderState::Body { expected } => {
                    self.body.push(b).map_err(|_| ProtocolError::BodyTooLarge)?;
                    if self.body.len() == expected {
                        self.state = DecoderState::Complete;
                    }
                }

                DecoderState::Complete => break,
            }
        }
        Ok(self.phase())
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            DecoderState::RequestLine => Phase::RequestLine,
            DecoderState::Headers { .. } => Phase::Headers,
            DecoderState::Body { .. } => Phase::Body,
            DecoderState::Complete => Phase::Complete,
        }
    }

    /// Available once the request line has been received.
    pub fn request_line(&self) -> Option<RequestLine<'_>> {
        if matches!(self.state, DecoderState::RequestLine) {
            return None;
        }
        parse_request_line(trim_line_end(&self.head[..self.line_end])).ok()
    }

    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Body bytes received so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Reset decoder state for the next connection.
    pub fn reset(&mut self) {
        self.state = DecoderState::RequestLine;
        self.head.clear();
        self.line_end = 0;
        self.content_length = None;
        self.body.clear();
    }

    fn push_head(&mut self, b: u8) -> Result<(), ProtocolError> {
        self.head.push(b).map_err(|_| ProtocolError::HeadTooLarge)
    }
}
