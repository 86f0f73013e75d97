//! Runtime health tracking for a single configured proxy.

use std::time::{Duration, Instant};

use kuroibara_types::{ProxyEntry, ProxyHealth};

const DEAD_RETRY_COOLDOWN: Duration = Duration::from_secs(15 * 60);
const PROBE_INTERVAL: Duration = Duration::from_secs(5 * 60);
const CONSECUTIVE_PROBE_FAILURES_TO_DEAD: u32 = 3;
const CONSECUTIVE_DEGRADATIONS_TO_DEAD: u32 = 2;

/// Exponential moving average smoothing factor for observed latency.
const LATENCY_EMA_ALPHA: f64 = 0.3;

/// A proxy's static configuration plus the mutable health state tracked by
/// the pool.
#[derive(Debug)]
pub struct ProxyState {
    pub(crate) entry: ProxyEntry,
    health: ProxyHealth,
    latency_ema_ms: f64,
    last_checked: Option<Instant>,
    consecutive_probe_failures: u32,
    consecutive_degradations: u32,
    dead_until: Option<Instant>,
    successes: u64,
    failures: u64,
}

impl ProxyState {
    /// Construct tracking state for a freshly loaded entry, starting
    /// healthy with no observation history.
    #[must_use]
    pub fn new(entry: ProxyEntry) -> Self {
        Self {
            entry,
            health: ProxyHealth::Healthy,
            latency_ema_ms: 0.0,
            last_checked: None,
            consecutive_probe_failures: 0,
            consecutive_degradations: 0,
            dead_until: None,
            successes: 0,
            failures: 0,
        }
    }

    /// Whether this proxy is currently eligible for selection.
    #[must_use]
    pub fn is_admissible(&self) -> bool {
        match self.health {
            ProxyHealth::Healthy | ProxyHealth::Degraded => true,
            ProxyHealth::Dead => self
            .dead_until
            .is_none_or(|until| Instant::now() >= until),
        }
    }

    /// Current health classification.
    #[must_use]
    pub const fn health(&self) -> ProxyHealth {
        self.health
    }

    /// Latency EMA in milliseconds, used by health-weighted selection.
    #[must_use]
    pub const fn latency_ema_ms(&self) -> f64 {
        self.latency_ema_ms
    }

    /// Observed success rate in `[0, 1]`; defaults to 1.0 with no history
    /// so a never-probed proxy is not unfairly penalized.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            1.0
        } else {
            self.successes as f64 / total as f64
        }
    }

    /// Health-weighted score: `success_rate * 1/latency`, favoring fast,
    /// reliable proxies. A zero-latency (never measured) proxy is treated
    /// as maximally fast.
    #[must_use]
    pub fn score(&self) -> f64 {
        let latency_component = if self.latency_ema_ms <= 0.0 {
            1.0
        } else {
            1.0 / self.latency_ema_ms
        };
        self.success_rate() * latency_component
    }

    /// Record a periodic canary probe result.
    pub fn record_probe(&mut self, healthy: bool, latency: Duration) {
        self.last_checked = Some(Instant::now());
        if healthy {
            self.consecutive_probe_failures = 0;
            self.observe_latency(latency);
            if matches!(self.health, ProxyHealth::Dead) && self.is_admissible() {
                self.health = ProxyHealth::Healthy;
                self.consecutive_degradations = 0;
            }
        } else {
            self.consecutive_probe_failures += 1;
            if self.consecutive_probe_failures >= CONSECUTIVE_PROBE_FAILURES_TO_DEAD {
                self.mark_dead();
            }
        }
    }

    /// Record the outcome of real traffic routed through this proxy.
    pub fn record_traffic_outcome(&mut self, success: bool, latency: Option<Duration>) {
        if success {
            self.successes += 1;
            self.consecutive_degradations = 0;
            if let Some(latency) = latency {
                self.observe_latency(latency);
            }
            return;
        }

        self.failures += 1;
        self.consecutive_degradations += 1;
        if self.consecutive_degradations >= CONSECUTIVE_DEGRADATIONS_TO_DEAD {
            self.mark_dead();
        } else {
            self.health = ProxyHealth::Degraded;
        }
    }

    fn observe_latency(&mut self, latency: Duration) {
        let sample = latency.as_secs_f64() * 1000.0;
        self.latency_ema_ms = if self.latency_ema_ms <= 0.0 {
            sample
        } else {
            LATENCY_EMA_ALPHA * sample + (1.0 - LATENCY_EMA_ALPHA) * self.latency_ema_ms
        };
    }

    fn mark_dead(&mut self) {
        self.health = ProxyHealth::Dead;
        self.dead_until = Some(Instant::now() + DEAD_RETRY_COOLDOWN);
        self.consecutive_degradations = 0;
    }
}

/// How often the background probe loop checks each configured proxy.
#[must_use]
pub const fn probe_interval() -> Duration {
    PROBE_INTERVAL
}
