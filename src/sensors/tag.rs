//! Contactless tag reader channel source.
//!
//! A reader yields the UID of a newly presented card, or nothing.  UIDs
//! are rendered as uppercase hex pairs joined by `:` (`04:A3:1F:7B`),
//! the form carried as the badge `name` in dispatch payloads.

use core::fmt::Write;

use log::debug;

use super::{ChannelReading, ChannelSource, TagId};
use crate::error::SensorError;

/// Longest UID a reader may report (ISO 14443 triple-size).
pub const MAX_UID_LEN: usize = 10;

pub type Uid = heapless::Vec<u8, MAX_UID_LEN>;

/// One reader on the bus.
pub trait TagReader {
    /// UID of a card newly presented since the last poll.
    fn poll_uid(&mut self) -> Result<Option<Uid>, SensorError>;
}

/// `[0x04, 0xA3]` → `"04:A3"`.
pub fn uid_to_hex(uid: &[u8]) -> TagId {
    let mut out = TagId::new();
    for (i, b) in uid.iter().take(MAX_UID_LEN).enumerate() {
        if i > 0 {
            let _ = out.push(':');
        }
        // 10 bytes render to 29 chars, inside TAG_ID_LEN.
        let _ = write!(out, "{b:02X}");
    }
    out
}

pub struct TagSlot<R> {
    reader: R,
}

impl<R: TagReader> TagSlot<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: TagReader> ChannelSource for TagSlot<R> {
    fn read(&mut self) -> ChannelReading {
        match self.reader.poll_uid() {
            Ok(Some(uid)) => ChannelReading::Tag(Some(uid_to_hex(&uid))),
            Ok(None) => ChannelReading::Tag(None),
            Err(e) => {
                debug!("tag reader: {e}");
                ChannelReading::Unavailable
            }
        }
    }
}
