//! Continuity (cable) channel source.
//!
//! Each cable closes a voltage divider against a reference resistor.  The
//! ADC count is averaged over several reads and converted to ohms:
//!
//! ```text
//!   R = Rref · adc / (full_scale − adc)
//! ```
//!
//! A count of 0 is a short (0 Ω); full scale is an open circuit, reported
//! as 1 TΩ so it never lands in a configured range.

use log::debug;

use super::{ChannelReading, ChannelSource};
use crate::config::ContinuityConfig;
use crate::error::SensorError;

/// Resistance reported for an open circuit.
pub const OPEN_CIRCUIT_OHMS: f32 = 1e12;

/// Raw ADC access for one analog pin.
pub trait AnalogInput {
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

/// Divider formula with the short/open clamps.
pub fn adc_to_ohms(adc: f32, full_scale: u16, reference_ohms: f32) -> f32 {
    let full_scale = f32::from(full_scale);
    if adc <= 0.0 {
        0.0
    } else if adc >= full_scale {
        OPEN_CIRCUIT_OHMS
    } else {
        reference_ohms * adc / (full_scale - adc)
    }
}

pub struct ContinuityProbe<A> {
    adc: A,
    config: ContinuityConfig,
}

impl<A: AnalogInput> ContinuityProbe<A> {
    pub fn new(adc: A, config: ContinuityConfig) -> Self {
        Self { adc, config }
    }

    fn average_count(&mut self) -> Result<f32, SensorError> {
        let samples = self.config.samples.max(1);
        let mut sum = 0u32;
        for _ in 0..samples {
            sum += u32::from(self.adc.read_raw()?);
        }
        Ok(sum as f32 / f32::from(samples))
    }
}

impl<A: AnalogInput> ChannelSource for ContinuityProbe<A> {
    fn read(&mut self) -> ChannelReading {
        match self.average_count() {
            Ok(adc) => ChannelReading::Analog(adc_to_ohms(
                adc,
                self.config.adc_full_scale,
                self.config.reference_ohms,
            )),
            Err(e) => {
                debug!("continuity read failed: {e}");
                ChannelReading::Unavailable
            }
        }
    }
}
