//! Per-channel debounce filter.
//!
//! One [`Channel`] per physical input.  The filter turns raw
//! [`ChannelReading`]s into a debounced [`ChannelValue`]:
//!
//! | Kind                 | Raw reading        | Value                         |
//! |----------------------|--------------------|-------------------------------|
//! | Binary / Toggle      | `Level`            | flips on each accepted press  |
//! | Binary / Momentary   | `Level`            | follows the level             |
//! | Range                | `Analog` (ohms)    | `true` while inside the range |
//! | Identifier           | `Tag`              | last accepted identifier      |
//!
//! Every kind shares one rule: a transition is accepted only if the
//! debounce interval has elapsed since the previous accepted transition
//! on the same channel.  Identifier channels additionally suppress a
//! re-read of the current identifier inside the repeat window.

use super::{ChannelReading, ChannelValue};
use crate::config::{PressMode, PropConfig, ResistanceRange, Variant};

/// How a channel interprets its readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelKind {
    Binary(PressMode),
    Range(ResistanceRange),
    Identifier,
}

impl ChannelKind {
    /// Kind of channel `index` for the configured variant.
    pub fn for_channel(config: &PropConfig, index: usize) -> Self {
        match config.variant {
            Variant::ButtonPanel => Self::Binary(config.press_mode),
            Variant::SimultaneousPress => Self::Binary(PressMode::Momentary),
            Variant::CablePanel => config
                .ranges
                .get(index)
                .copied()
                // Empty range: never connected.
                .map_or(Self::Range(ResistanceRange::new(1.0, 0.0)), Self::Range),
            Variant::TagReader => Self::Identifier,
        }
    }

    fn empty_value(self) -> ChannelValue {
        match self {
            Self::Identifier => ChannelValue::Tag(None),
            _ => ChannelValue::Flag(false),
        }
    }
}

/// Filter timing shared by every channel of a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterTiming {
    pub debounce_ms: u32,
    pub repeat_window_ms: u32,
}

/// One debounced input.
#[derive(Debug, Clone)]
pub struct Channel {
    kind: ChannelKind,
    raw: ChannelReading,
    value: ChannelValue,
    /// Last raw level, for press-edge detection.  `None` until the first
    /// reading after a reset.
    level: Option<bool>,
    last_transition_ms: Option<u64>,
}

impl Channel {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            raw: ChannelReading::Unavailable,
            value: kind.empty_value(),
            level: Some(false),
            last_transition_ms: None,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn value(&self) -> &ChannelValue {
        &self.value
    }

    /// Most recent raw reading, filtered or not.
    pub fn raw(&self) -> &ChannelReading {
        &self.raw
    }

    pub fn last_transition_ms(&self) -> Option<u64> {
        self.last_transition_ms
    }

    /// Back to empty/false with no transition history.  The next reading
    /// only seeds the press level, so a button held across the reset does
    /// not count as a press.
    pub fn reset(&mut self) {
        self.value = self.kind.empty_value();
        self.raw = ChannelReading::Unavailable;
        self.level = None;
        self.last_transition_ms = None;
    }

    /// Feed one reading.  Returns `true` when the debounced value changed.
    pub fn update(&mut self, reading: ChannelReading, now_ms: u64, timing: FilterTiming) -> bool {
        let settled = self.settled(now_ms, timing.debounce_ms);

        let changed = match self.kind {
            ChannelKind::Binary(PressMode::Toggle) => {
                let pressed = matches!(reading, ChannelReading::Level(true));
                let edge = pressed && self.level == Some(false);
                self.level = Some(pressed);
                if edge && settled {
                    self.value = ChannelValue::Flag(!self.value.is_on());
                    true
                } else {
                    false
                }
            }
            ChannelKind::Binary(PressMode::Momentary) => {
                let level = matches!(reading, ChannelReading::Level(true));
                self.follow(level, settled)
            }
            ChannelKind::Range(range) => {
                // Anything but an in-range analog value reads as open.
                let connected = match reading {
                    ChannelReading::Analog(ohms) => range.contains(ohms),
                    _ => false,
                };
                self.follow(connected, settled)
            }
            ChannelKind::Identifier => match &reading {
                ChannelReading::Tag(Some(id)) => {
                    let repeat = self.value.tag() == Some(id.as_str())
                        && !self.settled(now_ms, timing.repeat_window_ms);
                    if repeat || !settled {
                        false
                    } else {
                        self.value = ChannelValue::Tag(Some(id.clone()));
                        true
                    }
                }
                // No card in the field keeps the slot.
                _ => false,
            },
        };

        if changed {
            self.last_transition_ms = Some(now_ms);
        }
        self.raw = reading;
        changed
    }

    fn follow(&mut self, level: bool, settled: bool) -> bool {
        self.level = Some(level);
        if level != self.value.is_on() && settled {
            self.value = ChannelValue::Flag(level);
            true
        } else {
            false
        }
    }

    fn settled(&self, now_ms: u64, window_ms: u32) -> bool {
        self.last_transition_ms
            .is_none_or(|t| now_ms.saturating_sub(t) >= u64::from(window_ms))
    }
}
