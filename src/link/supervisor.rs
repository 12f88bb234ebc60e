//! Orchestrator link supervision.
//!
//! ```text
//!            ┌──────── liveness expired / send failed ───────┐
//!            ▼                                               │
//!     Disconnected ──attempt due──▶ Connecting ──ok──▶ Connected
//!            ▲                          │
//!            └──── failed, delay ◀──────┘
//! ```
//!
//! The supervisor owns no socket.  It tells the service what to do next
//! ([`SupervisorAction`]) and is told how it went.  A lost link is retried
//! on the next poll; after a failed handshake the next attempt waits
//! according to the [`ReconnectPolicy`].

use log::{info, warn};

use crate::config::{LivenessSource, PropConfig, ReconnectPolicy};
use crate::scheduler::{Deadline, Interval};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Handshake issued, result not yet reported.
    Connecting,
    Connected,
}

/// What the caller should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorAction {
    Idle,
    AttemptConnect,
    SendHeartbeat,
}

/// Last evidence of a live link plus a fixed timeout.
#[derive(Debug, Clone, Copy)]
pub struct LivenessTimer {
    last_contact_ms: u64,
    timeout_ms: u32,
}

impl LivenessTimer {
    pub const fn new(timeout_ms: u32) -> Self {
        Self {
            last_contact_ms: 0,
            timeout_ms,
        }
    }

    pub fn refresh(&mut self, now_ms: u64) {
        self.last_contact_ms = now_ms;
    }

    pub fn expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_contact_ms) >= u64::from(self.timeout_ms)
    }

    pub fn last_contact_ms(&self) -> u64 {
        self.last_contact_ms
    }
}

pub struct ConnectionSupervisor {
    state: ConnectionState,
    policy: ReconnectPolicy,
    liveness: LivenessTimer,
    heartbeat: Option<Interval>,
    next_attempt: Deadline,
    delay_ms: u32,
    consecutive_failures: u8,
}

impl ConnectionSupervisor {
    pub fn new(policy: ReconnectPolicy, source: LivenessSource, liveness_timeout_ms: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            policy,
            liveness: LivenessTimer::new(liveness_timeout_ms),
            heartbeat: match source {
                LivenessSource::Heartbeat { interval_ms } => Some(Interval::new(interval_ms)),
                LivenessSource::InboundProbe => None,
            },
            next_attempt: Deadline::at(0),
            delay_ms: base_delay(policy),
            consecutive_failures: 0,
        }
    }

    pub fn from_config(config: &PropConfig) -> Self {
        Self::new(config.reconnect, config.liveness, config.liveness_timeout_ms)
    }

    /// Decide the next link action.  Expires the link when liveness lapsed.
    pub fn poll(&mut self, now_ms: u64) -> SupervisorAction {
        match self.state {
            ConnectionState::Connected => {
                if self.liveness.expired(now_ms) {
                    warn!(
                        "link: no contact for {} ms, dropping",
                        now_ms.saturating_sub(self.liveness.last_contact_ms())
                    );
                    self.mark_down(now_ms);
                    return SupervisorAction::Idle;
                }
                match self.heartbeat.as_mut().map(|hb| hb.ready(now_ms)) {
                    Some(true) => SupervisorAction::SendHeartbeat,
                    _ => SupervisorAction::Idle,
                }
            }
            ConnectionState::Disconnected if self.next_attempt.expired(now_ms) => {
                SupervisorAction::AttemptConnect
            }
            _ => SupervisorAction::Idle,
        }
    }

    pub fn begin_attempt(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Record a handshake result.  Returns `true` when the network
    /// peripheral should be reinitialised.
    pub fn on_connect_result(&mut self, ok: bool, now_ms: u64) -> bool {
        if ok {
            info!("link: connected");
            self.state = ConnectionState::Connected;
            self.consecutive_failures = 0;
            self.delay_ms = base_delay(self.policy);
            self.liveness.refresh(now_ms);
            if let Some(hb) = self.heartbeat.as_mut() {
                hb.restart(now_ms);
            }
            return false;
        }

        self.state = ConnectionState::Disconnected;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let mut reinit = false;
        match self.policy {
            ReconnectPolicy::Fixed { delay_ms } => self.delay_ms = delay_ms,
            ReconnectPolicy::Backoff {
                max_ms,
                reinit_after,
                ..
            } => {
                self.delay_ms = self.delay_ms.saturating_mul(2).min(max_ms);
                if reinit_after > 0 && self.consecutive_failures >= reinit_after {
                    warn!(
                        "link: {} consecutive failures, reinitialising peripheral",
                        self.consecutive_failures
                    );
                    self.consecutive_failures = 0;
                    reinit = true;
                }
            }
        }
        self.next_attempt = Deadline::after(now_ms, self.delay_ms);
        info!("link: handshake failed, retry in {} ms", self.delay_ms);
        reinit
    }

    /// A failed heartbeat means the link is gone.
    pub fn on_heartbeat_result(&mut self, ok: bool, now_ms: u64) {
        if ok {
            self.liveness.refresh(now_ms);
        } else if self.state == ConnectionState::Connected {
            warn!("link: heartbeat failed");
            self.mark_down(now_ms);
        }
    }

    /// Inbound probe received: refreshes liveness, never connects.
    pub fn on_probe(&mut self, now_ms: u64) {
        if self.state == ConnectionState::Connected {
            self.liveness.refresh(now_ms);
        }
    }

    /// Any outbound write failed while connected.
    pub fn on_link_failure(&mut self, now_ms: u64) {
        if self.state == ConnectionState::Connected {
            self.mark_down(now_ms);
        }
    }

    /// Outbound slot was busy: keep the heartbeat due for the next poll.
    pub fn defer_heartbeat(&mut self) {
        if let Some(hb) = self.heartbeat.as_mut() {
            hb.reset();
        }
    }

    /// Restart command: next failure schedule starts from the base delay.
    pub fn reset_backoff(&mut self) {
        self.delay_ms = base_delay(self.policy);
        self.consecutive_failures = 0;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Delay applied after the most recent failure.
    pub fn current_delay_ms(&self) -> u32 {
        self.delay_ms
    }

    pub fn next_attempt_ms(&self) -> u64 {
        self.next_attempt.at_ms()
    }

    pub fn consecutive_failures(&self) -> u8 {
        self.consecutive_failures
    }

    fn mark_down(&mut self, now_ms: u64) {
        self.state = ConnectionState::Disconnected;
        self.next_attempt = Deadline::at(now_ms);
    }
}

fn base_delay(policy: ReconnectPolicy) -> u32 {
    match policy {
        ReconnectPolicy::Fixed { delay_ms } => delay_ms,
        ReconnectPolicy::Backoff { base_ms, .. } => base_ms,
    }
}
