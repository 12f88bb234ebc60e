//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by rendering each [`AppEvent`] as one
//! `TAG | key=value` line through the `log` facade.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state.as_str());
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.as_str(), to.as_str());
            }
            AppEvent::CommandApplied(cmd) => {
                info!("CMD | command={cmd}");
            }
            AppEvent::RequestRejected(reason) => {
                warn!("HTTP | rejected reason=\"{reason}\"");
            }
            AppEvent::ProbeAnswered { elapsed_us } => {
                info!("PING | dt_us={elapsed_us}");
            }
            AppEvent::ChannelChanged { channel, on } => {
                info!("CHAN | channel={} on={on}", channel + 1);
            }
            AppEvent::Completed => {
                info!("GAME | completed");
            }
            AppEvent::LinkUp => {
                info!("LINK | up");
            }
            AppEvent::LinkDown => {
                warn!("LINK | down");
            }
            AppEvent::ReconnectScheduled { delay_ms } => {
                info!("LINK | retry_in_ms={delay_ms}");
            }
            AppEvent::PeripheralReset => {
                warn!("LINK | peripheral reinitialised");
            }
            AppEvent::ReportSent(kind) => {
                info!("SEND | report={} ok", kind.as_str());
            }
            AppEvent::ReportFailed(kind) => {
                warn!("SEND | report={} failed", kind.as_str());
            }
        }
    }
}
