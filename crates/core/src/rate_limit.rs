//! Token-bucket rate limiter for outbound sends.
//!
//! The bucket is a plain value; callers supply the clock so the arithmetic
//! is testable and the async waiting lives with the dispatcher.

use std::time::{Duration, Instant};

/// Default sustained sends per second for one campaign.
pub const DEFAULT_RATE_PER_SEC: f64 = 20.0;

/// Default bucket capacity.
pub const DEFAULT_BURST: u32 = 20;

#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// A non-positive or non-finite `refill_per_sec` disables limiting:
    /// every take succeeds.
    pub fn new(burst: u32, refill_per_sec: f64, now: Instant) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: if refill_per_sec.is_finite() {
                refill_per_sec
            } else {
                0.0
            },
            last_refill: now,
        }
    }

    /// Take one token, or report how long until one is available.
    pub fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        if self.refill_per_sec <= 0.0 {
            return Ok(());
        }
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }

    /// Tokens currently available (after refilling to `now`).
    pub fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }
}
