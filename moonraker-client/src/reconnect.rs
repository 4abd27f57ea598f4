//! Reconnection strategies
//!
//! When the WebSocket to Moonraker drops, the strategy decides how long to
//! wait before the next attempt and whether to keep trying at all. The
//! default matches the daemon-facing client this replaces: exponential
//! backoff from 200 ms to a 2 s cap with a 2x multiplier, retrying forever.
//!
//! The strategy resets after any successful connection so a later outage
//! starts again from the minimum delay.

use std::time::Duration;

/// Decides the delay before each reconnection attempt
///
/// `next_delay` is called with a 0-indexed attempt counter until either the
/// connection is re-established or the strategy returns `None` (give up).
/// `reset` is called after a successful connection.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before attempt `attempt`, or `None` to abandon reconnection.
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Clear accumulated state after a successful connection.
    fn reset(&mut self);
}

/// Exponential backoff with a configurable multiplier and cap
pub struct ExponentialBackoff {
    min_delay: Duration,
    max_delay: Duration,
    factor: f64,
    max_attempts: Option<u32>,
    jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            factor: 2.0,
            max_attempts: None,
            jitter: false,
        }
    }

    /// Set the multiplier applied after each failed attempt.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Give up after this many attempts (unbounded by default).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add random 0-25% jitter to each delay.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl Default for ExponentialBackoff {
    /// Moonraker client defaults: 200 ms to 2 s, 2x factor, retry forever.
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_millis(2000))
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }

        let base = self.min_delay.as_millis() as f64 * self.factor.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64) as u64;

        let millis = if self.jitter {
            use rand::Rng;
            capped + rand::thread_rng().gen_range(0..=(capped / 4).max(1))
        } else {
            capped
        };

        Some(Duration::from_millis(millis))
    }

    fn reset(&mut self) {
        // Delay is a pure function of the attempt counter, which the
        // connection manager resets; nothing stored here.
    }
}

/// Constant delay between attempts
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }
        Some(self.delay)
    }

    fn reset(&mut self) {}
}

/// Never reconnect; the first disconnect is final.
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}
