//! The Proxy Pool: per-source proxy lists with health-aware
//! selection and a background canary-probe loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kuroibara_types::{KuroibaraError, ProxyConfig, ProxyEntry, ProxySelectionStrategy};
use rand::Rng;
use tokio::sync::RwLock;

use crate::state::{ProxyState, probe_interval};

/// Outcome of routing real traffic through a selected proxy, reported back
/// via [`ProxyPool::report_proxy_outcome`].
#[derive(Debug, Clone, Copy)]
pub struct ProxyOutcome {
    /// Whether the request completed without a proxy-attributable failure.
    pub success: bool,
    /// Observed round-trip latency, when available.
    pub latency: Option<Duration>,
}

/// Performs the periodic canary check against a single proxy. Adapters
/// supply a concrete implementation (an HTTP HEAD/GET through the proxy);
/// the pool only needs pass/fail plus latency.
#[async_trait]
pub trait CanaryProbe: Send + Sync {
    /// Probe `entry`, returning the observed latency on success.
    async fn probe(&self, entry: &ProxyEntry) -> Result<Duration, KuroibaraError>;
}

struct SourceProxies {
    states: RwLock<Vec<ProxyState>>,
    strategy: ProxySelectionStrategy,
    round_robin_cursor: AtomicUsize,
}

/// Selects and health-tracks proxies for each registered source.
pub struct ProxyPool {
    sources: RwLock<HashMap<String, Arc<SourceProxies>>>,
    probe: Arc<dyn CanaryProbe>,
}

impl ProxyPool {
    /// Construct a pool that uses `probe` for its background canary checks.
    #[must_use]
    pub fn new(probe: Arc<dyn CanaryProbe>) -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            probe,
        }
    }

    /// Register (or replace) a source's proxy configuration. An empty
    /// `entries` list means the source is direct-only and
    /// [`get_proxy`](Self::get_proxy) always returns `Ok(None)`.
    pub async fn register_source(&self, source_id: &str, config: ProxyConfig) {
        let states = config.entries.into_iter().map(ProxyState::new).collect();
        let source = Arc::new(SourceProxies {
            states: RwLock::new(states),
            strategy: config.strategy,
            round_robin_cursor: AtomicUsize::new(0),
        });
        self.sources.write().await.insert(source_id.to_string(), source);
    }

    /// Select a proxy for `source_id` per its configured strategy.
    ///
    /// # Errors
    /// Returns [`KuroibaraError::NoProxyAvailable`] when the source has a
    /// non-empty proxy list but every entry is currently dead. Returns
    /// `Ok(None)` for unregistered or direct-only sources (no proxy use).
    pub async fn get_proxy(&self, source_id: &str) -> Result<Option<ProxyEntry>, KuroibaraError> {
        let Some(source) = self.sources.read().await.get(source_id).cloned() else {
            return Ok(None);
        };
        let states = source.states.read().await;
        if states.is_empty() {
            return Ok(None);
        }

        let admissible: Vec<usize> = states
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_admissible())
        .map(|(i, _)| i)
        .collect();

        if admissible.is_empty() {
            return Err(KuroibaraError::NoProxyAvailable {
                source: source_id.to_string(),
            });
        }

        let chosen = match source.strategy {
            ProxySelectionStrategy::RoundRobin => {
                let cursor = source.round_robin_cursor.fetch_add(1, Ordering::Relaxed);
                admissible[cursor % admissible.len()]
            }
            ProxySelectionStrategy::Random => {
                admissible[rand::rng().random_range(0..admissible.len())]
            }
            ProxySelectionStrategy::HealthWeighted => {
                select_health_weighted(&states, &admissible)
            }
        };

        Ok(Some(states[chosen].entry.clone()))
    }

    /// Report the outcome of traffic routed through `proxy_id` for
    /// `source_id`.
    pub async fn report_proxy_outcome(
        &self,
        source_id: &str,
        proxy_id: &str,
        outcome: ProxyOutcome,
    ) {
        let Some(source) = self.sources.read().await.get(source_id).cloned() else {
            return;
        };
        let mut states = source.states.write().await;
        if let Some(state) = states.iter_mut().find(|s| s.entry.id == proxy_id) {
            state.record_traffic_outcome(outcome.success, outcome.latency);
        }
    }

    /// Run the background canary-probe loop forever, checking every
    /// registered source's proxies every [`probe_interval`]. Intended to be
    /// spawned once at startup.
    pub async fn run_probe_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(probe_interval());
        loop {
            ticker.tick().await;
            let sources: Vec<Arc<SourceProxies>> =
            self.sources.read().await.values().cloned().collect();
            for source in sources {
                self.probe_all(&source).await;
            }
        }
    }

    /// Run one round of canary probes for `source_id` immediately, without
    /// waiting on the background loop's interval. Useful for tests and for
    /// an operator-triggered "recheck now" admin action.
    pub async fn probe_now(&self, source_id: &str) {
        let Some(source) = self.sources.read().await.get(source_id).cloned() else {
            return;
        };
        self.probe_all(&source).await;
    }

    async fn probe_all(&self, source: &SourceProxies) {
        let entries: Vec<ProxyEntry> = source
        .states
        .read()
        .await
        .iter()
        .map(|s| s.entry.clone())
        .collect();

        for entry in entries {
            let start = std::time::Instant::now();
            let result = self.probe.probe(&entry).await;
            let mut states = source.states.write().await;
            let Some(state) = states.iter_mut().find(|s| s.entry.id == entry.id) else {
                continue;
            };
            match result {
                Ok(latency) => state.record_probe(true, latency),
                Err(_) => state.record_probe(false, start.elapsed()),
            }
        }
    }
}

fn select_health_weighted(states: &[ProxyState], admissible: &[usize]) -> usize {
    let total: f64 = admissible.iter().map(|&i| states[i].score().max(0.0)).sum();
    if total <= 0.0 {
        return admissible[0];
    }
    let mut pick = rand::rng().random_range(0.0..total);
    for &idx in admissible {
        let weight = states[idx].score().max(0.0);
        if pick < weight {
            return idx;
        }
        pick -= weight;
    }
    admissible[admissible.len() - 1]
}
