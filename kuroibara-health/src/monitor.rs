//! The Health Monitor: a supervisor + bounded worker pool that keeps
//! one [`SourceStatus`] per registered source current via periodic probes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use kuroibara_core::source::Source;
use kuroibara_types::{HealthState, LastError, SourceDescriptor, SourceStatus};
use rand::Rng;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Hard timeout applied to every probe call.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
/// Initial-probe stagger between sources at startup.
const STARTUP_STAGGER: Duration = Duration::from_millis(200);
/// EMA smoothing factor applied to observed probe response times.
const RESPONSE_TIME_EMA_ALPHA: f64 = 0.3;
/// Default bound on concurrently in-flight probes.
const DEFAULT_WORKER_POOL_SIZE: usize = 5;

struct RegisteredSource {
    source: Arc<dyn Source>,
}

/// Notified when a source recovers from `Down` to an admissible state, so
/// dependents holding state keyed on admissibility (e.g. a cached search
/// result page) can invalidate it.
pub trait RecoveryObserver: Send + Sync {
    /// Called once per transition out of `Down` into `Active`/`Degraded`.
    fn on_recovered(&self, source_id: &str);
}

/// Maintains [`SourceStatus`] for every registered source, probing each on
/// a jittered schedule and exposing admissibility to the Search Engine (and,
/// via [`kuroibara_middleware::Admissibility`], to the middleware stack).
pub struct HealthMonitor {
    sources: RwLock<HashMap<String, RegisteredSource>>,
    statuses: RwLock<HashMap<String, SourceStatus>>,
    worker_pool: Arc<Semaphore>,
    recovery_observers: RwLock<Vec<Arc<dyn RecoveryObserver>>>,
}

impl HealthMonitor {
    /// Construct a monitor with the default worker pool size of 5.
    #[must_use]
    pub fn new() -> Self {
        Self::with_worker_pool_size(DEFAULT_WORKER_POOL_SIZE)
    }

    /// Construct a monitor bounding concurrent in-flight probes to `size`.
    #[must_use]
    pub fn with_worker_pool_size(size: usize) -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            statuses: RwLock::new(HashMap::new()),
            worker_pool: Arc::new(Semaphore::new(size.max(1))),
            recovery_observers: RwLock::new(Vec::new()),
        }
    }

    /// Register an observer notified whenever a source transitions from
    /// `Down` back to an admissible state.
    pub fn add_recovery_observer(&self, observer: Arc<dyn RecoveryObserver>) {
        self.recovery_observers.write().unwrap().push(observer);
    }

    /// Register a source for health tracking. Idempotent: re-registering
    /// replaces the probe target but preserves historical counters if the
    /// source id was already known.
    pub fn register_source(
        &self,
        descriptor: Arc<SourceDescriptor>,
        source: Arc<dyn Source>,
        check_interval_minutes: u32,
    ) {
        let id = descriptor.id.clone();
        self.sources
        .write()
        .unwrap()
        .insert(id.clone(), RegisteredSource { source });
        self.statuses
        .write()
        .unwrap()
        .entry(id)
        .or_insert_with(|| SourceStatus::initial(descriptor, check_interval_minutes));
    }

    /// A read-only snapshot of a source's current status.
    #[must_use]
    pub fn status(&self, source_id: &str) -> Option<SourceStatus> {
        self.statuses.read().unwrap().get(source_id).cloned()
    }

    /// All known source ids.
    #[must_use]
    pub fn source_ids(&self) -> Vec<String> {
        self.sources.read().unwrap().keys().cloned().collect()
    }

    /// Administratively disable a source: it is never probed again and is
    /// always inadmissible until re-enabled. Historical counters are kept.
    pub fn disable(&self, source_id: &str) {
        if let Some(status) = self.statuses.write().unwrap().get_mut(source_id) {
            status.enabled = false;
            status.state = HealthState::Disabled;
        }
    }

    /// Re-enable a previously disabled source; it resumes the normal probe
    /// schedule and its state reverts to `Unknown` until the next probe.
    pub fn enable(&self, source_id: &str) {
        if let Some(status) = self.statuses.write().unwrap().get_mut(source_id) {
            status.enabled = true;
            status.state = HealthState::Unknown;
        }
    }

    /// Probe every registered source once, staggered by [`STARTUP_STAGGER`]
    /// per source, then fall into each source's periodic re-probe loop.
    /// Intended to be spawned once at startup and run forever.
    pub async fn run(self: Arc<Self>) {
        let ids = self.source_ids();
        let mut handles = Vec::with_capacity(ids.len());
        for (index, id) in ids.into_iter().enumerate() {
            let monitor = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(STARTUP_STAGGER * index as u32).await;
                monitor.probe_loop(id).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn probe_loop(self: Arc<Self>, source_id: String) {
        loop {
            let interval_minutes = self
            .statuses
            .read()
            .unwrap()
            .get(&source_id)
            .map_or(60, |s| s.check_interval_minutes.max(1));
            let enabled = self
            .statuses
            .read()
            .unwrap()
            .get(&source_id)
            .is_some_and(|s| s.enabled);

            if enabled {
                self.probe_one(&source_id).await;
            }

            let base = Duration::from_secs(u64::from(interval_minutes) * 60);
            tokio::time::sleep(jittered(base)).await;
        }
    }

    /// Probe one source immediately, bounded by the worker pool and a 30s
    /// hard timeout, updating its status. Probe errors are never
    /// propagated — they only update status.
    pub async fn probe_one(&self, source_id: &str) {
        let Some(source) = self
        .sources
        .read()
        .unwrap()
        .get(source_id)
        .map(|r| Arc::clone(&r.source))
        else {
            return;
        };
        let Some(provider) = source.as_probe_provider() else {
            return;
        };

        let Ok(_permit) = self.worker_pool.clone().acquire_owned().await else {
            return;
        };

        let started = Instant::now();
        let result = tokio::time::timeout(PROBE_TIMEOUT, provider.probe()).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut statuses = self.statuses.write().unwrap();
        let Some(status) = statuses.get_mut(source_id) else {
            return;
        };
        if !status.enabled {
            return;
        }

        status.total_probes += 1;
        status.last_probe_at_ms = Some(now_ms());
        status.response_time_ms_ema = if status.total_probes == 1 {
            elapsed_ms
        } else {
            RESPONSE_TIME_EMA_ALPHA * elapsed_ms
            + (1.0 - RESPONSE_TIME_EMA_ALPHA) * status.response_time_ms_ema
        };

        let was_down = status.state == HealthState::Down;

        match result {
            Ok(Ok(())) => {
                status.consecutive_failures = 0;
                status.successful_probes += 1;
                status.last_success_at_ms = Some(now_ms());
                status.last_error = None;
                status.state = HealthState::Active;
            }
            Ok(Err(err)) => record_failure(status, err.kind(), &err.to_string()),
            Err(_elapsed) => record_failure(status, "deadline", "probe timed out after 30s"),
        }

        let recovered = was_down && status.state.is_admissible();
        drop(statuses);

        if recovered {
            for observer in self.recovery_observers.read().unwrap().iter() {
                observer.on_recovered(source_id);
            }
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl kuroibara_middleware::Admissibility for HealthMonitor {
    fn is_admissible(&self, source_id: &str) -> bool {
        self.statuses
        .read()
        .unwrap()
        .get(source_id)
        .is_some_and(SourceStatus::is_admissible)
    }
}

fn record_failure(status: &mut SourceStatus, kind: &str, message: &str) {
    status.consecutive_failures += 1;
    status.last_error = Some(LastError {
        kind: kind.to_string(),
        message: message.to_string(),
    });
    status.state = if status.consecutive_failures >= status.failure_threshold {
        HealthState::Down
    } else {
        HealthState::Degraded
    };
}

fn jittered(base: Duration) -> Duration {
    let jitter_fraction = rand::rng().random_range(-0.1..=0.1);
    let millis = base.as_millis() as f64 * (1.0 + jitter_fraction);
    Duration::from_millis(millis.max(0.0) as u64)
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis() as i64)
    .unwrap_or(0)
}
