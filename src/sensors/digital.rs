//! Digital channel source over an `embedded-hal` input pin.
//!
//! Buttons and pads are wired active-low with pull-ups, so the default
//! polarity reports `Level(true)` while the pin reads low.

use embedded_hal::digital::InputPin;
use log::debug;

use super::{ChannelReading, ChannelSource};

pub struct DigitalInput<P> {
    pin: P,
    active_low: bool,
}

impl<P: InputPin> DigitalInput<P> {
    /// Pressed when the pin is pulled low.
    pub fn active_low(pin: P) -> Self {
        Self {
            pin,
            active_low: true,
        }
    }

    pub fn active_high(pin: P) -> Self {
        Self {
            pin,
            active_low: false,
        }
    }
}

impl<P: InputPin> ChannelSource for DigitalInput<P> {
    fn read(&mut self) -> ChannelReading {
        let level = if self.active_low {
            self.pin.is_low()
        } else {
            self.pin.is_high()
        };
        match level {
            Ok(active) => ChannelReading::Level(active),
            Err(e) => {
                debug!("GPIO read failed: {:?}", e);
                ChannelReading::Unavailable
            }
        }
    }
}
