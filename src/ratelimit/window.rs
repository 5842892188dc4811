//! Fixed-window bookkeeping.

use std::time::{Duration, Instant};

use super::verdict::Decision;
use crate::error::{PingyError, Result};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parameters of one limiter class.
///
/// A single config is shared by every partition of its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    /// Permits handed out per window
    pub permit_limit: u32,
    /// Length of one window
    pub window: Duration,
    /// Requests allowed to wait once the permits are exhausted
    pub queue_limit: u32,
}

impl LimiterConfig {
    /// Create a new limiter config.
    pub fn new(permit_limit: u32, window: Duration, queue_limit: u32) -> Self {
        Self {
            permit_limit,
            window,
            queue_limit,
        }
    }

    /// Reject configs that could never admit anything.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.permit_limit == 0 {
            return Err(PingyError::Config(format!(
                "{} limiter: permit_limit must be positive",
                name
            )));
        }
        if self.window.is_zero() {
            return Err(PingyError::Config(format!(
                "{} limiter: window must be positive",
                name
            )));
        }
        Ok(())
    }
}

/// Mutable window state of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Start of the current window
    pub window_start: Instant,
    /// Permits left in the current window
    pub permits_remaining: u32,
    /// Queue slots taken in the current window
    pub queued_count: u32,
    /// Latest arrival time observed by this partition
    pub last_seen: Instant,
}

impl WindowState {
    /// Open a fresh window at `now` with a full permit budget.
    pub fn new(config: &LimiterConfig, now: Instant) -> Self {
        Self {
            window_start: now,
            permits_remaining: config.permit_limit,
            queued_count: 0,
            last_seen: now,
        }
    }

    /// Try to take a permit or a queue slot at `now`.
    ///
    /// An arrival earlier than one already observed is treated as happening
    /// at the latest observed time, so the window never moves backward.
    pub fn acquire(&mut self, config: &LimiterConfig, now: Instant) -> Decision {
        let now = now.max(self.last_seen);
        self.last_seen = now;
        self.roll(config, now);

        if self.permits_remaining > 0 {
            self.permits_remaining -= 1;
            return Decision::Admitted;
        }

        let retry_after = self.time_until_rollover(config, now);
        if self.queued_count < config.queue_limit {
            self.queued_count += 1;
            Decision::Queued { retry_after }
        } else {
            Decision::Rejected { retry_after }
        }
    }

    /// Time left in the current window as seen from `now`.
    pub fn time_until_rollover(&self, config: &LimiterConfig, now: Instant) -> Duration {
        match self.window_start.checked_add(config.window) {
            Some(window_end) => window_end.saturating_duration_since(now),
            None => config.window,
        }
    }

    /// Advance `window_start` by whole windows once the current one has expired.
    fn roll(&mut self, config: &LimiterConfig, now: Instant) {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < config.window {
            return;
        }

        // Landing on `now - (elapsed mod window)` skips every idle window at once.
        let into_window = elapsed.as_nanos() % config.window.as_nanos();
        self.window_start = now - duration_from_nanos(into_window);
        self.permits_remaining = config.permit_limit;
        self.queued_count = 0;
    }
}

fn duration_from_nanos(nanos: u128) -> Duration {
    Duration::new(
        (nanos / NANOS_PER_SEC) as u64,
        (nanos % NANOS_PER_SEC) as u32,
    )
}
