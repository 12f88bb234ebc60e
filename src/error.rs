//! Unified error types for the prop controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the supervisor and listener without allocation.
//!
//! Nothing here is fatal: comms errors feed the reconnect cycle, protocol
//! errors become client-error responses, sensor errors become non-matching
//! readings.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A channel could not be read.
    Sensor(SensorError),
    /// The orchestrator link failed.
    Comms(CommsError),
    /// An inbound request could not be parsed.
    Protocol(ProtocolError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error.
    AdcReadFailed,
    /// GPIO read returned an error.
    GpioReadFailed,
    /// Tag reader did not answer.
    ReaderUnresponsive,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
            Self::ReaderUnresponsive => write!(f, "tag reader unresponsive"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// TCP connect to the orchestrator was refused or timed out.
    ConnectFailed,
    /// Writing the request did not complete inside its window.
    WriteTimeout,
    /// The peer closed or reset the connection mid-write.
    ConnectionLost,
    /// The payload could not be serialised.
    Encode,
    /// Another report still holds the outbound slot.
    Busy,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::WriteTimeout => write!(f, "write timed out"),
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::Encode => write!(f, "payload encoding failed"),
            Self::Busy => write!(f, "report already in flight"),
        }
    }
}

impl std::error::Error for CommsError {}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors (inbound request parsing)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Request line is not `METHOD TARGET VERSION`.
    MalformedRequestLine,
    /// Request line plus headers exceed the head buffer.
    HeadTooLarge,
    /// `Content-Length` is not a non-negative integer.
    InvalidContentLength,
    /// `Content-Length` exceeds the body cap.
    BodyTooLarge,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRequestLine => write!(f, "malformed request line"),
            Self::HeadTooLarge => write!(f, "request head too large"),
            Self::InvalidContentLength => write!(f, "invalid Content-Length"),
            Self::BodyTooLarge => write!(f, "body too large"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.  The message names the field.
    Invalid(&'static str),
    /// Variant name not recognised.
    UnknownVariant,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "validation failed: {msg}"),
            Self::UnknownVariant => write!(
                f,
                "unknown variant (expected button-panel, cable-panel, simultaneous-press or tag-reader)"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
