//! The Rate Controller: one token bucket and priority wait queue per
//! source, driven by a single dispatcher task per source.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kuroibara_types::{KuroibaraError, RateConfig};
use tokio::sync::{Mutex as AsyncMutex, Notify, RwLock, oneshot};
use tokio::task::JoinHandle;

use crate::bucket::TokenBucket;
use crate::queue::{Priority, WaitQueue};

/// Outcome reported back to the controller after a dispatched request
/// completes, driving the adaptive cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The request succeeded.
    Ok,
    /// The source responded 429.
    RateLimited,
    /// The source responded 5xx.
    ServerError,
}

/// A granted admission to dispatch one request to a source. Carries the
/// deadline the caller's own request should be bounded by.
#[derive(Debug)]
pub struct RatePermit {
    deadline: Instant,
}

impl RatePermit {
    /// Deadline the caller's request must complete by.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Release the permit. Present for API symmetry with `Acquire`; the
    /// controller already accounted for the dispatch at grant time, so this
    /// is a no-op today but gives future concurrency accounting a hook.
    pub const fn release(self) {}
}

struct CooldownState {
    base_rate: f64,
    until: Option<Instant>,
    started_at: Option<Instant>,
}

struct SourceRuntime {
    bucket: AsyncMutex<TokenBucket>,
    queue: AsyncMutex<WaitQueue>,
    cooldown: AsyncMutex<CooldownState>,
    notify: Notify,
    config: RateConfig,
    request_timeout: Duration,
}

const COOLDOWN: Duration = Duration::from_secs(60);
const DISPATCH_TICK: Duration = Duration::from_millis(25);

/// Per-source token-bucket rate limiter with a priority wait queue and
/// adaptive, self-recovering cooldown on observed 429/5xx outcomes.
pub struct RateController {
    sources: RwLock<HashMap<String, Arc<SourceRuntime>>>,
    dispatchers: AsyncMutex<HashMap<String, JoinHandle<()>>>,
}

impl Default for RateController {
    fn default() -> Self {
        Self::new()
    }
}

impl RateController {
    /// Create an empty controller. Sources are registered lazily on first
    /// use via [`register_source`](Self::register_source).
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            dispatchers: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Register a source with its rate configuration, spawning its
    /// dispatcher task. Idempotent: re-registering replaces the
    /// configuration and restarts the dispatcher.
    pub async fn register_source(&self, source_id: &str, config: RateConfig) {
        let base_rate = config.tokens_per_second();
        let runtime = Arc::new(SourceRuntime {
            bucket: AsyncMutex::new(TokenBucket::new(
                f64::from(config.burst),
                base_rate,
                config.min_interval,
            )),
            queue: AsyncMutex::new(WaitQueue::new(
                config.max_queue_depth as usize,
                config.max_wait,
            )),
            cooldown: AsyncMutex::new(CooldownState {
                base_rate,
                until: None,
                started_at: None,
            }),
            notify: Notify::new(),
            request_timeout: config.max_wait,
            config,
        });

        self.sources
        .write()
        .await
        .insert(source_id.to_string(), runtime.clone());

        let handle = tokio::spawn(dispatch_loop(runtime));
        let mut dispatchers = self.dispatchers.lock().await;
        if let Some(old) = dispatchers.insert(source_id.to_string(), handle) {
            old.abort();
        }
    }

    async fn runtime(&self, source_id: &str) -> Option<Arc<SourceRuntime>> {
        self.sources.read().await.get(source_id).cloned()
    }

    /// Request admission to dispatch one request to `source_id`.
    ///
    /// # Errors
    /// Returns [`KuroibaraError::RateLimited`] when the wait queue is full
    /// or `timeout` elapses before a token becomes available, or
    /// [`KuroibaraError::Cancelled`] if the controller is shutting down.
    pub async fn acquire(
        &self,
        source_id: &str,
        priority: Priority,
        timeout: Duration,
    ) -> Result<RatePermit, KuroibaraError> {
        let Some(runtime) = self.runtime(source_id).await else {
            return Err(KuroibaraError::not_found(format!(
                "rate controller has no registration for source {source_id}"
            )));
        };

        {
            let mut bucket = runtime.bucket.lock().await;
            if bucket.try_consume() {
                return Ok(RatePermit {
                    deadline: Instant::now() + runtime.request_timeout,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut queue = runtime.queue.lock().await;
            if queue.push(priority, tx).is_err() {
                let wait_ms = runtime.bucket.lock().await.estimated_wait_ms();
                return Err(KuroibaraError::RateLimited {
                    source: source_id.to_string(),
                    retry_after_ms: wait_ms,
                });
            }
        }
        runtime.notify.notify_one();

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(()))) => Ok(RatePermit {
                deadline: Instant::now() + runtime.request_timeout,
            }),
            Ok(Ok(Err(err))) => Err(err),
            Ok(Err(_recv_dropped)) => Err(KuroibaraError::Cancelled {
                reason: format!("rate controller dropped waiter for {source_id}"),
            }),
            Err(_elapsed) => Err(KuroibaraError::RateLimited {
                source: source_id.to_string(),
                retry_after_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Report the outcome of a dispatched request, driving the adaptive
    /// cooldown. 429/5xx halve the effective rate for [`COOLDOWN`], after
    /// which the dispatcher linearly recovers it back to the configured
    /// base rate.
    pub async fn report_outcome(&self, source_id: &str, outcome: Outcome) {
        let Some(runtime) = self.runtime(source_id).await else {
            return;
        };
        if matches!(outcome, Outcome::Ok) {
            return;
        }

        let mut cooldown = runtime.cooldown.lock().await;
        let now = Instant::now();
        cooldown.until = Some(now + COOLDOWN);
        cooldown.started_at = Some(now);
        let halved = runtime.bucket.lock().await.refill_rate_per_sec() / 2.0;
        let floor = cooldown.base_rate * 0.1;
        runtime.bucket.lock().await.set_refill_rate(halved.max(floor));
    }
}

/// Background task owning one source's dispatch cadence: refills/consumes
/// the token bucket on behalf of queued waiters and linearly recovers the
/// rate after a cooldown.
async fn dispatch_loop(runtime: Arc<SourceRuntime>) {
    let mut ticker = tokio::time::interval(DISPATCH_TICK);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = runtime.notify.notified() => {}
        }

        recover_cooldown(&runtime).await;

        loop {
            let mut queue = runtime.queue.lock().await;
            if queue.is_empty() {
                break;
            }
            let mut bucket = runtime.bucket.lock().await;
            if !bucket.try_consume() {
                break;
            }
            drop(bucket);
            let Some(waiter) = queue.pop() else { break };
            drop(queue);
            waiter.resolve(Ok(()));
        }
    }
}

async fn recover_cooldown(runtime: &SourceRuntime) {
    let mut cooldown = runtime.cooldown.lock().await;
    let Some(until) = cooldown.until else { return };
    let Some(started) = cooldown.started_at else { return };
    let now = Instant::now();
    if now >= until {
        runtime.bucket.lock().await.set_refill_rate(cooldown.base_rate);
        cooldown.until = None;
        cooldown.started_at = None;
        return;
    }

    let total = until.saturating_duration_since(started).as_secs_f64();
    let elapsed = now.saturating_duration_since(started).as_secs_f64();
    if total <= 0.0 {
        return;
    }
    let floor = cooldown.base_rate / 2.0;
    let recovered = floor + (cooldown.base_rate - floor) * (elapsed / total);
    runtime.bucket.lock().await.set_refill_rate(recovered.min(cooldown.base_rate));
}
