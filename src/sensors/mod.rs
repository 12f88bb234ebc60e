//! Sensor subsystem: channel sources and the rate-limited [`SensorSampler`].
//!
//! ```text
//!  ChannelSource ─▶ SensorBank (SensorPort) ─▶ SensorSampler ─▶ Snapshot
//!   digital / continuity / tag      read_channel()    debounce      ▲
//!                                                                    │
//!                                            PuzzleMachine reads ────┘
//! ```
//!
//! The sampler owns one [`Channel`] filter per input and produces a
//! canonical [`Snapshot`] plus a changed mask and a "last changed channel"
//! marker.  Storage is fixed-capacity; nothing allocates per tick.

pub mod channel;
pub mod continuity;
pub mod digital;
pub mod tag;

use heapless::Vec;

use crate::app::ports::SensorPort;
use crate::config::PropConfig;
use crate::scheduler::Interval;
use channel::{Channel, ChannelKind, FilterTiming};

/// Upper bound on channels per prop.  Changed masks are `u32`.
pub const MAX_CHANNELS: usize = 16;

/// Longest rendered tag identifier (10-byte UID as `AA:BB:..`).
pub const TAG_ID_LEN: usize = 32;

pub type TagId = heapless::String<TAG_ID_LEN>;

/// One raw observation from a channel source.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelReading {
    /// Digital level, already normalised so `true` means pressed/active.
    Level(bool),
    /// Derived physical quantity (ohms for continuity channels).
    Analog(f32),
    /// Identifier currently in the reader field, if any.
    Tag(Option<TagId>),
    /// No signal or read failure.  Never matches.
    Unavailable,
}

/// Debounced per-channel value as seen by the puzzle logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelValue {
    Flag(bool),
    Tag(Option<TagId>),
}

impl ChannelValue {
    /// Pressed, connected, or holding an identifier.
    pub fn is_on(&self) -> bool {
        match self {
            Self::Flag(on) => *on,
            Self::Tag(id) => id.is_some(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Tag(Some(id)) => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Canonical channel → value map, indexed by channel number (0-based).
pub type Snapshot = Vec<ChannelValue, MAX_CHANNELS>;

// ───────────────────────────────────────────────────────────────
// Channel sources
// ───────────────────────────────────────────────────────────────

/// Read capability implemented once per channel kind.
pub trait ChannelSource {
    fn read(&mut self) -> ChannelReading;
}

/// A homogeneous set of channel sources exposed as a [`SensorPort`].
pub struct SensorBank<S> {
    sources: Vec<S, MAX_CHANNELS>,
}

impl<S: ChannelSource> SensorBank<S> {
    /// Sources past [`MAX_CHANNELS`] are dropped.
    pub fn new(sources: impl IntoIterator<Item = S>) -> Self {
        Self {
            sources: sources.into_iter().take(MAX_CHANNELS).collect(),
        }
    }
}

impl<S: ChannelSource> SensorPort for SensorBank<S> {
    fn channel_count(&self) -> usize {
        self.sources.len()
    }

    fn read_channel(&mut self, index: usize) -> ChannelReading {
        self.sources
            .get_mut(index)
            .map_or(ChannelReading::Unavailable, ChannelSource::read)
    }
}

// ───────────────────────────────────────────────────────────────
// Sampler
// ───────────────────────────────────────────────────────────────

/// Result of one sampler pass.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub snapshot: &'a Snapshot,
    /// Bit `i` set when channel `i` changed in this pass.
    pub changed_mask: u32,
    /// Highest-numbered channel that changed most recently, if any.
    pub last_changed: Option<usize>,
}

impl Sample<'_> {
    pub fn changed(&self) -> bool {
        self.changed_mask != 0
    }
}

/// Polls every channel on a fixed cadence and debounces the readings.
pub struct SensorSampler {
    channels: Vec<Channel, MAX_CHANNELS>,
    timing: FilterTiming,
    interval: Interval,
    snapshot: Snapshot,
    last_changed: Option<usize>,
}

impl SensorSampler {
    /// Channels past [`MAX_CHANNELS`] are ignored.
    pub fn new(kinds: &[ChannelKind], scan_interval_ms: u32, timing: FilterTiming) -> Self {
        let channels: Vec<Channel, MAX_CHANNELS> = kinds
            .iter()
            .take(MAX_CHANNELS)
            .map(|&k| Channel::new(k))
            .collect();
        let snapshot = channels.iter().map(|c| c.value().clone()).collect();
        Self {
            channels,
            timing,
            interval: Interval::new(scan_interval_ms),
            snapshot,
            last_changed: None,
        }
    }

    pub fn from_config(config: &PropConfig) -> Self {
        let count = config.channel_count.min(MAX_CHANNELS);
        let kinds: Vec<ChannelKind, MAX_CHANNELS> = (0..count)
            .map(|i| ChannelKind::for_channel(config, i))
            .collect();
        Self::new(
            &kinds,
            config.scan_interval_ms,
            FilterTiming {
                debounce_ms: config.debounce_ms,
                repeat_window_ms: config.tag_repeat_window_ms,
            },
        )
    }

    /// Read every channel once, unless the previous pass was less than one
    /// scan interval ago (then `None`).
    pub fn sample(&mut self, now_ms: u64, port: &mut impl SensorPort) -> Option<Sample<'_>> {
        if !self.interval.ready(now_ms) {
            return None;
        }

        let mut changed_mask = 0u32;
        for (i, ch) in self.channels.iter_mut().enumerate() {
            let reading = port.read_channel(i);
            if ch.update(reading, now_ms, self.timing) {
                changed_mask |= 1 << i;
                self.last_changed = Some(i);
                if let Some(slot) = self.snapshot.get_mut(i) {
                    slot.clone_from(ch.value());
                }
            }
        }

        Some(Sample {
            snapshot: &self.snapshot,
            changed_mask,
            last_changed: self.last_changed,
        })
    }

    /// Every channel back to empty/false; the next call to
    /// [`sample`](Self::sample) runs immediately.
    pub fn reset(&mut self) {
        for (ch, slot) in self.channels.iter_mut().zip(self.snapshot.iter_mut()) {
            ch.reset();
            slot.clone_from(ch.value());
        }
        self.last_changed = None;
        self.interval.reset();
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn last_changed(&self) -> Option<usize> {
        self.last_changed
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
