//! Panel adapters: bridge channel inputs and lamps to the domain ports.
//!
//! [`PanelAdapter`] pairs any [`SensorPort`] (usually a
//! [`SensorBank`](crate::sensors::SensorBank) of real channel sources) with
//! any [`IndicatorPort`], so the service sees one `hw` value.
//! [`SimulatedPanel`] is a self-contained stand-in for host runs and tests:
//! readings are set directly and lamp writes are recorded.

use log::info;

use crate::app::ports::{IndicatorPort, SensorPort, StatusIndicator};
use crate::config::{PropConfig, Variant};
use crate::sensors::{ChannelReading, MAX_CHANNELS, TagId};

// ───────────────────────────────────────────────────────────────
// PanelAdapter
// ───────────────────────────────────────────────────────────────

pub struct PanelAdapter<S, I> {
    sensors: S,
    indicators: I,
}

impl<S: SensorPort, I: IndicatorPort> PanelAdapter<S, I> {
    pub fn new(sensors: S, indicators: I) -> Self {
        Self {
            sensors,
            indicators,
        }
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    pub fn indicators(&self) -> &I {
        &self.indicators
    }
}

impl<S: SensorPort, I> SensorPort for PanelAdapter<S, I> {
    fn channel_count(&self) -> usize {
        self.sensors.channel_count()
    }

    fn read_channel(&mut self, index: usize) -> ChannelReading {
        self.sensors.read_channel(index)
    }
}

impl<S, I: IndicatorPort> IndicatorPort for PanelAdapter<S, I> {
    fn set_status(&mut self, status: StatusIndicator) {
        self.indicators.set_status(status);
    }

    fn set_ready_lamp(&mut self, on: bool) {
        self.indicators.set_ready_lamp(on);
    }

    fn set_solved_lamp(&mut self, on: bool) {
        self.indicators.set_solved_lamp(on);
    }

    fn set_channel_lamp(&mut self, channel: usize, on: bool) {
        self.indicators.set_channel_lamp(channel, on);
    }
}

// ───────────────────────────────────────────────────────────────
// SimulatedPanel
// ───────────────────────────────────────────────────────────────

/// In-memory panel: settable readings, recorded lamps.
#[derive(Debug, Clone)]
pub struct SimulatedPanel {
    readings: heapless::Vec<ChannelReading, MAX_CHANNELS>,
    status: Option<StatusIndicator>,
    ready_lamp: bool,
    solved_lamp: bool,
    channel_lamps: [bool; MAX_CHANNELS],
    /// Log lamp changes at info level.
    verbose: bool,
}

impl SimulatedPanel {
    /// `count` channels all reading `idle`.
    pub fn new(count: usize, idle: ChannelReading) -> Self {
        Self {
            readings: (0..count.min(MAX_CHANNELS)).map(|_| idle.clone()).collect(),
            status: None,
            ready_lamp: false,
            solved_lamp: false,
            channel_lamps: [false; MAX_CHANNELS],
            verbose: false,
        }
    }

    /// Idle panel shaped for the configured variant: levels low, cables
    /// open, readers empty.
    pub fn for_config(config: &PropConfig) -> Self {
        let idle = match config.variant {
            Variant::ButtonPanel | Variant::SimultaneousPress => ChannelReading::Level(false),
            Variant::CablePanel => ChannelReading::Analog(f32::INFINITY),
            Variant::TagReader => ChannelReading::Tag(None),
        };
        Self::new(config.channel_count, idle)
    }

    pub fn verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }

    pub fn set_reading(&mut self, index: usize, reading: ChannelReading) {
        if let Some(slot) = self.readings.get_mut(index) {
            *slot = reading;
        }
    }

    pub fn set_level(&mut self, index: usize, high: bool) {
        self.set_reading(index, ChannelReading::Level(high));
    }

    pub fn set_ohms(&mut self, index: usize, ohms: f32) {
        self.set_reading(index, ChannelReading::Analog(ohms));
    }

    /// `None` or an over-long identifier empties the slot.
    pub fn set_tag(&mut self, index: usize, tag: Option<&str>) {
        let id = tag.and_then(|t| {
            let mut id = TagId::new();
            id.push_str(t).ok().map(|()| id)
        });
        self.set_reading(index, ChannelReading::Tag(id));
    }

    pub fn status(&self) -> Option<StatusIndicator> {
        self.status
    }

    pub fn ready_lamp(&self) -> bool {
        self.ready_lamp
    }

    pub fn solved_lamp(&self) -> bool {
        self.solved_lamp
    }

    pub fn channel_lamp(&self, index: usize) -> bool {
        self.channel_lamps.get(index).copied().unwrap_or(false)
    }
}

impl SensorPort for SimulatedPanel {
    fn channel_count(&self) -> usize {
        self.readings.len()
    }

    fn read_channel(&mut self, index: usize) -> ChannelReading {
        self.readings
            .get(index)
            .cloned()
            .unwrap_or(ChannelReading::Unavailable)
    }
}

impl IndicatorPort for SimulatedPanel {
    fn set_status(&mut self, status: StatusIndicator) {
        if self.verbose {
            info!("LAMP | status={status:?}");
        }
        self.status = Some(status);
    }

    fn set_ready_lamp(&mut self, on: bool) {
        if self.verbose {
            info!("LAMP | ready={on}");
        }
        self.ready_lamp = on;
    }

    fn set_solved_lamp(&mut self, on: bool) {
        if self.verbose {
            info!("LAMP | solved={on}");
        }
        self.solved_lamp = on;
    }

    fn set_channel_lamp(&mut self, channel: usize, on: bool) {
        if let Some(lamp) = self.channel_lamps.get_mut(channel) {
            *lamp = on;
        }
    }
}
