//! Millisecond timers for the cooperative loop.
//!
//! Nothing here sleeps.  Callers pass the current monotonic time and ask
//! whether a timer is due; the loop keeps spinning in between.
//!
//! ```text
//!   now_ms ──▶ Interval::ready()   (rate limit: sampler, heartbeat)
//!   now_ms ──▶ Deadline::expired() (one-shot: reconnect attempt)
//! ```
//!
//! Elapsed time is computed with `saturating_sub`, so a clock read that
//! lands before the stored mark counts as "not yet".

// ═══════════════════════════════════════════════════════════════
//  Interval
// ═══════════════════════════════════════════════════════════════

/// Periodic rate limiter.
///
/// The first call to [`ready`](Self::ready) always fires; afterwards it
/// fires once per `period_ms`.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    period_ms: u32,
    last_ms: Option<u64>,
}

impl Interval {
    pub const fn new(period_ms: u32) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    /// Returns `true` and re-arms when at least one period has elapsed.
    pub fn ready(&mut self, now_ms: u64) -> bool {
        let due = match self.last_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= u64::from(self.period_ms),
        };
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }

    /// Restart the period from `now_ms` without firing.
    pub fn restart(&mut self, now_ms: u64) {
        self.last_ms = Some(now_ms);
    }

    /// Forget history so the next [`ready`](Self::ready) fires.
    pub fn reset(&mut self) {
        self.last_ms = None;
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }
}

// ═══════════════════════════════════════════════════════════════
//  Deadline
// ═══════════════════════════════════════════════════════════════

/// One-shot timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at_ms: u64,
}

impl Deadline {
    pub const fn at(at_ms: u64) -> Self {
        Self { at_ms }
    }

    pub fn after(now_ms: u64, delay_ms: u32) -> Self {
        Self {
            at_ms: now_ms.saturating_add(u64::from(delay_ms)),
        }
    }

    pub fn expired(&self, now_ms: u64) -> bool {
        now_ms >= self.at_ms
    }

    pub fn at_ms(&self) -> u64 {
        self.at_ms
    }

    /// Milliseconds left, 0 once expired.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.at_ms.saturating_sub(now_ms)
    }
}
