//! Completion predicates.
//!
//! Pure functions over a channel snapshot: identical snapshots always
//! yield identical verdicts.  An empty snapshot never completes.

use crate::config::{PropConfig, Variant};
use crate::sensors::ChannelValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPredicate {
    /// Channels in `mask` on, every other channel off.
    CorrectSubset { mask: u32 },
    /// At least `required` channels on at once.
    SimultaneousCount { required: u8 },
    /// Every slot holds an identifier and no two are equal.
    DistinctIdentifiers,
    /// Every channel on (within its range).
    AllInRange,
}

impl CompletionPredicate {
    /// Build a correct-subset predicate from 1-based channel numbers.
    /// Numbers outside 1..=32 are ignored.
    pub fn correct_subset(channels: &[u8]) -> Self {
        let mask = channels
            .iter()
            .filter(|&&c| (1..=32).contains(&c))
            .fold(0u32, |m, &c| m | 1 << (c - 1));
        Self::CorrectSubset { mask }
    }

    pub fn from_config(config: &PropConfig) -> Self {
        match config.variant {
            Variant::ButtonPanel => Self::correct_subset(&config.correct_channels),
            Variant::CablePanel => Self::AllInRange,
            Variant::SimultaneousPress => Self::SimultaneousCount {
                required: config.required_simultaneous,
            },
            Variant::TagReader => Self::DistinctIdentifiers,
        }
    }

    pub fn evaluate(&self, snapshot: &[ChannelValue]) -> bool {
        if snapshot.is_empty() {
            return false;
        }
        match *self {
            Self::CorrectSubset { mask } => {
                // A required channel past the end can never be on.
                let covered = snapshot.len() >= 32 || mask >> snapshot.len() == 0;
                covered
                    && snapshot
                        .iter()
                        .enumerate()
                        .all(|(i, v)| v.is_on() == (mask & (1 << i) != 0))
            }
            Self::SimultaneousCount { required } => {
                required > 0 && snapshot.iter().filter(|v| v.is_on()).count() >= required as usize
            }
            Self::DistinctIdentifiers => {
                let mut seen = heapless::Vec::<&str, { crate::sensors::MAX_CHANNELS }>::new();
                for v in snapshot {
                    let Some(id) = v.tag() else {
                        return false;
                    };
                    if seen.contains(&id) || seen.push(id).is_err() {
                        return false;
                    }
                }
                true
            }
            Self::AllInRange => snapshot.iter().all(ChannelValue::is_on),
        }
    }
}
