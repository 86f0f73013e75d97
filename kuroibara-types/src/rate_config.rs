//! Rate Controller configuration.
//!
//! The controller never hardcodes its own limits; this struct is always
//! populated from the process config or a per-source configuration file
//! entry before use.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-source rate limiting configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    /// Requests allowed per `window`.
    pub rate: f64,
    /// Accounting window.
    #[serde(with = "duration_ms")]
    pub window: Duration,
    /// Maximum burst size (token bucket capacity).
    pub burst: u32,
    /// Minimum spacing between two dispatches, even with tokens available.
    #[serde(with = "duration_ms")]
    pub min_interval: Duration,
    /// Maximum depth of the priority wait queue.
    pub max_queue_depth: u32,
    /// Maximum time a caller will wait in queue before `RateLimited`.
    #[serde(with = "duration_ms")]
    pub max_wait: Duration,
}

impl Default for RateConfig {
    /// A conservative 5 req/s with burst 5, no forced minimum spacing, a
    /// 64-deep wait queue, and a 30s max wait before giving up.
    fn default() -> Self {
        Self {
            rate: 5.0,
            window: Duration::from_secs(1),
            burst: 5,
            min_interval: Duration::from_millis(0),
            max_queue_depth: 64,
            max_wait: Duration::from_secs(30),
        }
    }
}

impl RateConfig {
    /// Tokens added per second at the configured rate/window.
    #[must_use]
    pub fn tokens_per_second(&self) -> f64 {
        self.rate / self.window.as_secs_f64()
    }

    /// Adaptive cooldown window applied after a 429/5xx observation, 60s.
    #[must_use]
    pub const fn cooldown() -> Duration {
        Duration::from_secs(60)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
