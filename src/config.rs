//! Prop configuration parameters
//!
//! All tunable parameters for one prop.  Each physical variant has a
//! preset ([`PropConfig::for_variant`]); a JSON file or CLI flags may
//! override individual fields on the host runner.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::http::codec::MAX_BODY_SIZE;
use crate::sensors::MAX_CHANNELS;

// ───────────────────────────────────────────────────────────────
// Variant and policy enums
// ───────────────────────────────────────────────────────────────

/// Physical prop family.  Selects channel kind, predicate and payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    ButtonPanel,
    CablePanel,
    SimultaneousPress,
    TagReader,
}

impl Variant {
    /// Event name carried in `/dispatch` payloads.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::ButtonPanel => "buttons:state-changed",
            Self::CablePanel => "connections:state-changed",
            Self::SimultaneousPress => "pelotas:state-changed",
            Self::TagReader => "rfid:state-changed",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ButtonPanel => "button-panel",
            Self::CablePanel => "cable-panel",
            Self::SimultaneousPress => "simultaneous-press",
            Self::TagReader => "tag-reader",
        }
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "button-panel" | "buttons" => Ok(Self::ButtonPanel),
            "cable-panel" | "cables" | "connections" => Ok(Self::CablePanel),
            "simultaneous-press" | "pelotas" => Ok(Self::SimultaneousPress),
            "tag-reader" | "rfid" => Ok(Self::TagReader),
            _ => Err(ConfigError::UnknownVariant),
        }
    }
}

/// How a boolean channel maps its physical level to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PressMode {
    /// Each accepted press edge flips the value.
    Toggle,
    /// The value follows the debounced level.
    Momentary,
}

/// Where `restart` leaves the puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    ToIdle,
    /// Reset channels and arm again (countdown or straight to Active).
    Rearm,
}

/// Which sensor changes produce a `/dispatch` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchPolicy {
    OnChange,
    OnCompletion,
}

/// Evidence used to keep the orchestrator link alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LivenessSource {
    /// Periodic `/heartbeat`; a failed send drops the link.
    Heartbeat { interval_ms: u32 },
    /// Inbound `/Ping` probes refresh the liveness timer.
    InboundProbe,
}

/// Delay schedule between failed handshakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReconnectPolicy {
    Fixed {
        delay_ms: u32,
    },
    Backoff {
        base_ms: u32,
        max_ms: u32,
        /// Reinitialise the network peripheral after this many consecutive
        /// failures.  0 disables.
        reinit_after: u8,
    },
}

/// Closed resistance interval accepted as "connected".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResistanceRange {
    pub min_ohms: f32,
    pub max_ohms: f32,
}

impl ResistanceRange {
    pub const fn new(min_ohms: f32, max_ohms: f32) -> Self {
        Self { min_ohms, max_ohms }
    }

    /// Range membership.  NaN never matches.
    pub fn contains(&self, ohms: f32) -> bool {
        ohms >= self.min_ohms && ohms <= self.max_ohms
    }
}

/// Divider parameters for continuity channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuityConfig {
    /// ADC reads averaged per sample.
    pub samples: u8,
    /// Reference resistor of the divider (ohms).
    pub reference_ohms: f32,
    /// ADC full-scale count (1023 for a 10-bit converter).
    pub adc_full_scale: u16,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            samples: 10,
            reference_ohms: 20_000.0,
            adc_full_scale: 1023,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// PropConfig
// ───────────────────────────────────────────────────────────────

/// Complete configuration of a single prop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropConfig {
    // --- Identity / network ---
    /// Device identity reported in every payload.
    pub device_id: String,
    pub variant: Variant,
    /// Local port of the command listener.
    pub listen_port: u16,
    /// Orchestrator host.
    pub server_host: String,
    pub server_port: u16,
    /// IP announced in `/connect`; the socket's local address when `None`.
    pub advertise_ip: Option<String>,

    // --- Sampling ---
    pub channel_count: usize,
    /// Minimum interval between two sampler passes (milliseconds).
    pub scan_interval_ms: u32,
    /// Minimum interval between two accepted transitions on one channel.
    pub debounce_ms: u32,
    pub press_mode: PressMode,
    /// Same-identifier re-reports inside this window are suppressed.
    pub tag_repeat_window_ms: u32,
    /// One range per continuity channel.
    pub ranges: Vec<ResistanceRange>,
    pub continuity: ContinuityConfig,

    // --- Puzzle ---
    /// 1-based channels that must be on (all others off).
    pub correct_channels: Vec<u8>,
    /// Channels that must be active at once.
    pub required_simultaneous: u8,
    /// ReadyCountdown duration; 0 skips the countdown.
    pub ready_delay_ms: u32,
    pub restart_policy: RestartPolicy,
    pub dispatch_policy: DispatchPolicy,
    /// Arm the puzzle at boot.
    pub start_armed: bool,
    /// Arm the puzzle after a successful handshake when Idle.
    pub auto_start_on_connect: bool,

    // --- Orchestrator link ---
    pub liveness: LivenessSource,
    /// Silence longer than this drops the link.
    pub liveness_timeout_ms: u32,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout_ms: u32,
    /// Await-brief window after the `/connect` handshake.
    pub handshake_drain_ms: u32,
    /// Await-brief window after `/dispatch`; 0 means fire-and-forget.
    pub dispatch_drain_ms: u32,
    pub write_timeout_ms: u32,
    /// Echo `/Ping` probes back as `GET /Pong` on a kept-alive connection.
    pub pong_echo: bool,

    // --- Command listener ---
    pub request_line_timeout_ms: u32,
    pub header_timeout_ms: u32,
    pub body_timeout_ms: u32,
    /// Largest accepted request body (bytes).
    pub max_body_bytes: usize,
}

impl Default for PropConfig {
    fn default() -> Self {
        Self::for_variant(Variant::ButtonPanel)
    }
}

impl PropConfig {
    /// Preset matching the deployed hardware of each variant.
    pub fn for_variant(variant: Variant) -> Self {
        let base = Self {
            device_id: String::new(),
            variant,
            listen_port: 8080,
            server_host: "192.168.18.164".into(),
            server_port: 3001,
            advertise_ip: None,

            channel_count: 0,
            scan_interval_ms: 5,
            debounce_ms: 50,
            press_mode: PressMode::Momentary,
            tag_repeat_window_ms: 800,
            ranges: Vec::new(),
            continuity: ContinuityConfig::default(),

            correct_channels: Vec::new(),
            required_simultaneous: 0,
            ready_delay_ms: 0,
            restart_policy: RestartPolicy::Rearm,
            dispatch_policy: DispatchPolicy::OnCompletion,
            start_armed: true,
            auto_start_on_connect: false,

            liveness: LivenessSource::InboundProbe,
            liveness_timeout_ms: 8_000,
            reconnect: ReconnectPolicy::Fixed { delay_ms: 1_000 },
            connect_timeout_ms: 1_000,
            handshake_drain_ms: 50,
            dispatch_drain_ms: 50,
            write_timeout_ms: 150,
            pong_echo: false,

            request_line_timeout_ms: 100,
            header_timeout_ms: 600,
            body_timeout_ms: 600,
            max_body_bytes: MAX_BODY_SIZE,
        };

        match variant {
            Variant::ButtonPanel => Self {
                device_id: "buttons-arduino".into(),
                channel_count: 10,
                press_mode: PressMode::Toggle,
                correct_channels: vec![1, 3],
                ready_delay_ms: 10_000,
                restart_policy: RestartPolicy::ToIdle,
                dispatch_policy: DispatchPolicy::OnChange,
                start_armed: false,
                liveness: LivenessSource::Heartbeat { interval_ms: 5_000 },
                liveness_timeout_ms: 15_000,
                pong_echo: true,
                ..base
            },
            Variant::CablePanel => Self {
                device_id: "connections".into(),
                channel_count: 5,
                scan_interval_ms: 200,
                debounce_ms: 0,
                ranges: vec![
                    ResistanceRange::new(3_250.0, 3_390.0),
                    ResistanceRange::new(4_750.0, 4_880.0),
                    ResistanceRange::new(6_750.0, 6_850.0),
                    ResistanceRange::new(9_800.0, 10_200.0),
                    ResistanceRange::new(15_100.0, 15_300.0),
                ],
                handshake_drain_ms: 3_000,
                ..base
            },
            Variant::SimultaneousPress => Self {
                device_id: "pelotas".into(),
                channel_count: 6,
                debounce_ms: 25,
                required_simultaneous: 6,
                ..base
            },
            Variant::TagReader => Self {
                device_id: "rfid".into(),
                channel_count: 5,
                scan_interval_ms: 20,
                debounce_ms: 0,
                dispatch_policy: DispatchPolicy::OnChange,
                start_armed: false,
                auto_start_on_connect: true,
                reconnect: ReconnectPolicy::Backoff {
                    base_ms: 1_000,
                    max_ms: 20_000,
                    reinit_after: 3,
                },
                handshake_drain_ms: 800,
                dispatch_drain_ms: 0,
                write_timeout_ms: 500,
                ..base
            },
        }
    }

    /// Reject values the control loop cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.is_empty() {
            return Err(ConfigError::Invalid("device_id must not be empty"));
        }
        if self.channel_count == 0 || self.channel_count > MAX_CHANNELS {
            return Err(ConfigError::Invalid("channel_count must be 1..=16"));
        }
        if self.server_host.is_empty() {
            return Err(ConfigError::Invalid("server_host must not be empty"));
        }
        if self.max_body_bytes > MAX_BODY_SIZE {
            return Err(ConfigError::Invalid("max_body_bytes must not exceed 512"));
        }

        match self.variant {
            Variant::ButtonPanel => {
                if self.correct_channels.is_empty() {
                    return Err(ConfigError::Invalid("correct_channels must not be empty"));
                }
                if self
                    .correct_channels
                    .iter()
                    .any(|&c| c == 0 || c as usize > self.channel_count)
                {
                    return Err(ConfigError::Invalid(
                        "correct_channels entries must be 1..=channel_count",
                    ));
                }
            }
            Variant::CablePanel => {
                if self.ranges.len() != self.channel_count {
                    return Err(ConfigError::Invalid("ranges must have one entry per channel"));
                }
                if self.ranges.iter().any(|r| {
                    matches!(
                        r.min_ohms.partial_cmp(&r.max_ohms),
                        None | Some(core::cmp::Ordering::Greater)
                    )
                }) {
                    return Err(ConfigError::Invalid("ranges need min_ohms <= max_ohms"));
                }
                if self.continuity.samples == 0 {
                    return Err(ConfigError::Invalid("continuity.samples must be at least 1"));
                }
            }
            Variant::SimultaneousPress => {
                if self.required_simultaneous == 0
                    || self.required_simultaneous as usize > self.channel_count
                {
                    return Err(ConfigError::Invalid(
                        "required_simultaneous must be 1..=channel_count",
                    ));
                }
            }
            Variant::TagReader => {}
        }

        if let LivenessSource::Heartbeat { interval_ms } = self.liveness {
            if interval_ms == 0 {
                return Err(ConfigError::Invalid("heartbeat interval_ms must be positive"));
            }
            if self.liveness_timeout_ms <= interval_ms {
                return Err(ConfigError::Invalid(
                    "liveness_timeout_ms must exceed the heartbeat interval",
                ));
            }
        }
        if self.liveness_timeout_ms == 0 {
            return Err(ConfigError::Invalid("liveness_timeout_ms must be positive"));
        }

        match self.reconnect {
            ReconnectPolicy::Fixed { delay_ms } if delay_ms == 0 => {
                return Err(ConfigError::Invalid("reconnect delay_ms must be positive"));
            }
            ReconnectPolicy::Backoff { base_ms, max_ms, .. } if base_ms == 0 || max_ms < base_ms => {
                return Err(ConfigError::Invalid("reconnect backoff needs 0 < base_ms <= max_ms"));
            }
            _ => {}
        }

        Ok(())
    }
}
