//! In-memory per-source token bucket.

use std::time::{Duration, Instant};

/// A token bucket refilled continuously at `refill_rate_per_sec`, capped at
/// `capacity`. Adaptive halving scales
/// `refill_rate_per_sec` without ever touching the configured capacity.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate_per_sec: f64,
    last_refill: Instant,
    /// Minimum spacing enforced between two dispatched permits, independent
    /// of token availability.
    min_interval: Duration,
    last_dispatch: Option<Instant>,
}

impl TokenBucket {
    /// Construct a bucket starting full (`tokens == capacity`).
    #[must_use]
    pub fn new(capacity: f64, refill_rate_per_sec: f64, min_interval: Duration) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_rate_per_sec,
            last_refill: Instant::now(),
            min_interval,
            last_dispatch: None,
        }
    }

    /// Replace the effective refill rate (used by the adaptive cooldown).
    /// Never changes `capacity`.
    pub fn set_refill_rate(&mut self, rate_per_sec: f64) {
        self.refill_rate_per_sec = rate_per_sec.max(0.0);
    }

    /// Current configured refill rate.
    #[must_use]
    pub const fn refill_rate_per_sec(&self) -> f64 {
        self.refill_rate_per_sec
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_rate_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Try to consume a single token, respecting the minimum inter-request
    /// interval. Returns `true` and records the dispatch on success.
    pub fn try_consume(&mut self) -> bool {
        let now = Instant::now();
        self.refill(now);

        if let Some(last) = self.last_dispatch {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.last_dispatch = Some(now);
            true
        } else {
            false
        }
    }

    /// Estimated wait, in milliseconds, until the next token (and minimum
    /// interval) would be satisfied. Used only for diagnostics/backoff
    /// hints, not as a scheduling guarantee.
    #[must_use]
    pub fn estimated_wait_ms(&self) -> u64 {
        let token_wait = if self.refill_rate_per_sec > 0.0 {
            ((1.0 - self.tokens).max(0.0) / self.refill_rate_per_sec * 1000.0) as u64
        } else {
            u64::MAX
        };
        let interval_wait = self.last_dispatch.map_or(0, |last| {
            self.min_interval
            .saturating_sub(last.elapsed())
            .as_millis() as u64
        });
        token_wait.max(interval_wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full_and_drains() {
        let mut bucket = TokenBucket::new(2.0, 1.0, Duration::ZERO);
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
    }

    #[test]
    fn min_interval_blocks_even_with_tokens() {
        let mut bucket = TokenBucket::new(5.0, 100.0, Duration::from_secs(10));
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
    }
}
