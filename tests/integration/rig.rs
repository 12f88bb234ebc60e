//! One prop wired to mock adapters, driven tick by tick.

use scapeprop::adapters::hardware::SimulatedPanel;
use scapeprop::app::service::PropService;
use scapeprop::config::{PropConfig, Variant};

use crate::mock_hw::{ManualClock, MockLink, MockListener, RecordingSink, WireHandle};

pub struct Rig {
    pub svc: PropService<MockLink>,
    pub inbound: MockListener,
    pub link: MockLink,
    pub panel: SimulatedPanel,
    pub clock: ManualClock,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: PropConfig, clock: ManualClock) -> Self {
        let mut sink = RecordingSink::new();
        let svc = PropService::new(&config, 0, &mut sink);
        Self {
            panel: SimulatedPanel::for_config(&config),
            svc,
            inbound: MockListener::new(),
            link: MockLink::new(),
            clock,
            sink,
        }
    }

    pub fn variant(variant: Variant) -> Self {
        Self::new(PropConfig::for_variant(variant), ManualClock::new())
    }

    pub fn tick(&mut self) {
        self.svc.tick(
            &mut self.inbound,
            &mut self.link,
            &mut self.panel,
            &self.clock,
            &mut self.sink,
        );
    }

    /// Jump to `ms` and tick once.
    pub fn at(&mut self, ms: u64) {
        self.clock.set_ms(ms);
        self.tick();
    }

    /// Tick every `step_ms` for `total_ms`.
    pub fn run_for(&mut self, total_ms: u64, step_ms: u64) {
        let mut elapsed = 0;
        while elapsed < total_ms {
            self.clock.advance_ms(step_ms);
            self.tick();
            elapsed += step_ms;
        }
    }

    /// Queue `raw` as one inbound request and tick once.
    pub fn request(&mut self, raw: &str) -> WireHandle {
        let wire = self.inbound.push_request(raw);
        self.tick();
        wire
    }

    pub fn get(&mut self, target: &str) -> String {
        let wire = self.request(&format!("GET {target} HTTP/1.1\r\nHost: prop\r\n\r\n"));
        let text = wire.borrow().written_text();
        text
    }
}
