//! The Download Scheduler: routes jobs to Download Clients or to a
//! Source's own page URLs, tracks progress, and reconciles state on
//! restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use kuroibara_core::source::Source;
use kuroibara_types::{
    DownloadConcurrency, DownloadJob, DownloadTarget, JobError, JobKind, JobStatus, KuroibaraError,
};
use tokio::sync::Semaphore;

use crate::client::DownloadClient;
use crate::store::JobStore;

const PROGRESS_POLL_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_HEALTH_INTERVAL: Duration = Duration::from_secs(60);
const IMAGE_RETRY_BACKOFFS: [Duration; 3] =
[Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// Fetches one page image and persists it, returning the local file path.
/// Kept as a seam so the scheduler never depends on a concrete HTTP stack.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch `url`, write it to local storage, and return its path.
    async fn fetch(&self, url: &str) -> Result<String, KuroibaraError>;
}

/// Invoked once a job reaches `completed`, with the local files produced.
/// A post-processing failure transitions the job to `failed`.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Handle a completed job's output.
    async fn process(&self, job: &DownloadJob, local_files: &[String]) -> Result<(), KuroibaraError>;
}

struct RegisteredClient {
    client: Arc<dyn DownloadClient>,
    kind: JobKind,
    healthy: AtomicBool,
}

/// Accepts jobs, routes them to the right backend, and keeps their
/// [`DownloadJob`] record current.
pub struct DownloadScheduler {
    store: Arc<JobStore>,
    sources: RwLock<HashMap<String, Arc<dyn Source>>>,
    clients: RwLock<HashMap<String, Arc<RegisteredClient>>>,
    defaults: RwLock<HashMap<JobKind, String>>,
    external_ids: RwLock<HashMap<String, String>>,
    semaphores: HashMap<JobKind, Arc<Semaphore>>,
    image_fetcher: Arc<dyn ImageFetcher>,
    post_processor: Arc<dyn PostProcessor>,
}

impl DownloadScheduler {
    /// Build a scheduler with the given per-kind worker pool sizes.
    #[must_use]
    pub fn new(
        concurrency: DownloadConcurrency,
        image_fetcher: Arc<dyn ImageFetcher>,
        post_processor: Arc<dyn PostProcessor>,
    ) -> Arc<Self> {
        let mut semaphores = HashMap::new();
        semaphores.insert(JobKind::Direct, Arc::new(Semaphore::new(concurrency.direct.max(1) as usize)));
        semaphores.insert(JobKind::Torrent, Arc::new(Semaphore::new(concurrency.torrent.max(1) as usize)));
        semaphores.insert(JobKind::Nzb, Arc::new(Semaphore::new(concurrency.nzb.max(1) as usize)));

        Arc::new(Self {
            store: Arc::new(JobStore::new()),
            sources: RwLock::new(HashMap::new()),
            clients: RwLock::new(HashMap::new()),
            defaults: RwLock::new(HashMap::new()),
            external_ids: RwLock::new(HashMap::new()),
            semaphores,
            image_fetcher,
            post_processor,
        })
    }

    /// Register a source so direct jobs can resolve its page URLs.
    pub fn register_source(&self, source: Arc<dyn Source>) {
        self.sources.write().unwrap().insert(source.name().to_string(), source);
    }

    /// Register a torrent/NZB client. The first client registered for a
    /// kind becomes that kind's default until overridden with
    /// [`set_default_client`](Self::set_default_client).
    pub fn register_client(&self, kind: JobKind, client: Arc<dyn DownloadClient>) {
        let id = client.id().to_string();
        self.clients.write().unwrap().insert(
            id.clone(),
            Arc::new(RegisteredClient { client, kind, healthy: AtomicBool::new(true) }),
        );
        self.defaults.write().unwrap().entry(kind).or_insert(id);
    }

    /// Declare the default client id used for `kind` when multiple clients
    /// are registered for it.
    pub fn set_default_client(&self, kind: JobKind, client_id: &str) {
        self.defaults.write().unwrap().insert(kind, client_id.to_string());
    }

    fn select_client(&self, kind: JobKind) -> Option<Arc<RegisteredClient>> {
        let clients = self.clients.read().unwrap();
        if let Some(default_id) = self.defaults.read().unwrap().get(&kind) {
            if let Some(registered) = clients.get(default_id) {
                if registered.healthy.load(Ordering::Relaxed) {
                    return Some(Arc::clone(registered));
                }
            }
        }
        clients
        .values()
        .find(|r| r.kind == kind && r.healthy.load(Ordering::Relaxed))
        .cloned()
    }

    /// Submit a new job and spawn the worker that will drive it to a
    /// terminal state.
    pub fn submit(self: &Arc<Self>, kind: JobKind, target: DownloadTarget) -> DownloadJob {
        let job = DownloadJob {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            target,
            client_id: None,
            status: JobStatus::Pending,
            bytes_total: 0,
            bytes_done: 0,
            started_at_ms: Some(now_ms()),
            updated_at_ms: now_ms(),
            completed_at_ms: None,
            attempts: 0,
            last_error: None,
        };
        self.store.insert(job.clone());

        let scheduler = Arc::clone(self);
        let job_id = job.id.clone();
        tokio::spawn(async move { scheduler.run_job(job_id).await });

        job
    }

    /// Current snapshot of a job.
    #[must_use]
    pub fn status(&self, job_id: &str) -> Option<DownloadJob> {
        self.store.get(job_id)
    }

    /// A snapshot of every known job, for the paged listing in
    /// `GET /downloads`. Filtering and pagination are the caller's job.
    #[must_use]
    pub fn list_jobs(&self) -> Vec<DownloadJob> {
        self.store.snapshot()
    }

    /// Cancel a non-terminal job. Idempotent: cancelling an already
    /// terminal job is a no-op.
    pub async fn cancel(&self, job_id: &str) {
        let Some(job) = self.store.mutate(job_id, |j| {
            j.transition(JobStatus::Cancelled, now_ms());
        }).await else { return };

        if job.status != JobStatus::Cancelled {
            return;
        }
        if let Some(client_id) = &job.client_id {
            let external_id = self.external_ids.read().unwrap().get(job_id).cloned();
            let registered = self.clients.read().unwrap().get(client_id).cloned();
            if let (Some(external_id), Some(registered)) = (external_id, registered) {
                let _ = registered.client.remove(&external_id, false).await;
            }
        }
    }

    async fn run_job(self: Arc<Self>, job_id: String) {
        let Some(job) = self.store.get(&job_id) else { return };
        let permit = self.semaphores[&job.kind].clone().acquire_owned().await;
        let Ok(_permit) = permit else { return };

        let current = self.store.mutate(&job_id, |j| {
            j.transition(JobStatus::Active, now_ms());
        }).await;
        let Some(job) = current else { return };
        if job.status != JobStatus::Active {
            return;
        }

        match job.kind {
            JobKind::Direct => self.run_direct(job).await,
            JobKind::Torrent | JobKind::Nzb => self.run_external(job).await,
        }
    }

    async fn run_direct(&self, job: DownloadJob) {
        let DownloadTarget::Chapter(chapter) = &job.target else {
            self.fail(&job.id, "invalid_target", "direct job without a chapter target").await;
            return;
        };

        let Some(source) = self.sources.read().unwrap().get(&chapter.source_id).cloned() else {
            self.fail(&job.id, "not_found", &format!("no registered source {}", chapter.source_id)).await;
            return;
        };
        let Some(provider) = source.as_pages_provider() else {
            self.fail(&job.id, "unsupported", "source does not support pages").await;
            return;
        };

        let pages = match provider.pages(&chapter.source_native_id).await {
            Ok(pages) => pages,
            Err(err) => {
                self.fail(&job.id, err.kind(), &err.to_string()).await;
                return;
            }
        };

        self.store.mutate(&job.id, |j| j.bytes_total = pages.len() as u64).await;

        let mut local_files = Vec::with_capacity(pages.len());
        for url in &pages {
            match self.store.get(&job.id) {
                Some(current) if current.status.is_terminal() => return,
                None => return,
                _ => {}
            }
            match self.fetch_with_retry(url).await {
                Ok(path) => {
                    local_files.push(path);
                    self.store.mutate(&job.id, |j| j.bytes_done += 1).await;
                }
                Err(err) => {
                    self.fail(&job.id, err.kind(), &err.to_string()).await;
                    return;
                }
            }
        }

        self.complete(&job.id, &local_files).await;
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, KuroibaraError> {
        let mut last_err = None;
        for backoff in [Duration::ZERO, IMAGE_RETRY_BACKOFFS[0], IMAGE_RETRY_BACKOFFS[1], IMAGE_RETRY_BACKOFFS[2]] {
            if backoff > Duration::ZERO {
                tokio::time::sleep(backoff).await;
            }
            match self.image_fetcher.fetch(url).await {
                Ok(path) => return Ok(path),
                Err(err) if err.retryable() => last_err = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| KuroibaraError::transport("direct", "image fetch exhausted retries")))
    }

    async fn run_external(&self, job: DownloadJob) {
        let DownloadTarget::External { descriptor,.. } = &job.target else {
            self.fail(&job.id, "invalid_target", "external job without a descriptor target").await;
            return;
        };

        let Some(registered) = self.select_client(job.kind) else {
            self.fail(&job.id, "client_error", "no healthy client configured for this job kind").await;
            return;
        };

        let external_id = match registered.client.add(descriptor).await {
            Ok(id) => id,
            Err(err) => {
                self.fail(&job.id, err.kind(), &err.to_string()).await;
                return;
            }
        };
        self.external_ids.write().unwrap().insert(job.id.clone(), external_id.clone());
        self.store.mutate(&job.id, |j| {
            j.client_id = Some(registered.client.id().to_string());
            j.transition(JobStatus::Queued, now_ms());
        }).await;

        self.poll_until_terminal(&job.id, &registered, &external_id).await;
    }

    async fn poll_until_terminal(&self, job_id: &str, registered: &RegisteredClient, external_id: &str) {
        loop {
            tokio::time::sleep(PROGRESS_POLL_INTERVAL).await;
            let Some(current) = self.store.get(job_id) else { return };
            if current.status.is_terminal() {
                return;
            }

            match registered.client.status(external_id).await {
                Ok(progress) => {
                    self.store.mutate(job_id, |j| {
                        j.bytes_done = progress.bytes_done;
                        j.bytes_total = progress.bytes_total;
                        if !progress.state.is_terminal() {
                            j.status = progress.state;
                        }
                    }).await;
                    if progress.state == JobStatus::Completed {
                        self.complete(job_id, &[]).await;
                        return;
                    }
                    if progress.state == JobStatus::Failed {
                        self.fail(job_id, "client_error", "client reported failure").await;
                        return;
                    }
                }
                Err(err) => {
                    self.fail(job_id, err.kind(), &err.to_string()).await;
                    return;
                }
            }
        }
    }

    async fn complete(&self, job_id: &str, local_files: &[String]) {
        let Some(job) = self.store.mutate(job_id, |j| {
            j.transition(JobStatus::Completed, now_ms());
        }).await else { return };

        // transition() refuses to leave an already-terminal state (e.g. a
        // job cancelled while this worker's fetch loop was in flight), so
        // `job.status` may still be `Cancelled` here — only post-process
        // work that actually reached `Completed`.
        if job.status != JobStatus::Completed {
            return;
        }

        if let Err(err) = self.post_processor.process(&job, local_files).await {
            self.fail(job_id, "post_processing", &err.to_string()).await;
        }
    }

    async fn fail(&self, job_id: &str, kind: &str, message: &str) {
        self.store.mutate(job_id, |j| {
            j.last_error = Some(JobError { kind: kind.to_string(), message: message.to_string() });
            j.transition(JobStatus::Failed, now_ms());
        }).await;
    }

    /// Poll every registered client's reachability every 60s, skipping
    /// unhealthy clients from selection until they recover.
    pub async fn run_client_health_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(CLIENT_HEALTH_INTERVAL);
        loop {
            ticker.tick().await;
            let clients: Vec<Arc<RegisteredClient>> = self.clients.read().unwrap().values().cloned().collect();
            for registered in clients {
                let healthy = registered.client.test_connection().await.is_ok();
                registered.healthy.store(healthy, Ordering::Relaxed);
            }
        }
    }

    /// Reconcile `active`/`queued` jobs against their clients at startup:
    /// jobs whose external id the client no longer recognizes are marked
    /// `failed` with kind `lost`.
    pub async fn reconcile_on_restart(&self) {
        let jobs: Vec<DownloadJob> = self
        .store
        .snapshot()
        .into_iter()
        .filter(|j| matches!(j.status, JobStatus::Active | JobStatus::Queued))
        .collect();

        for job in jobs {
            if job.kind == JobKind::Direct {
                self.fail(&job.id, "lost", "direct job was in flight at restart").await;
                continue;
            }
            let Some(client_id) = &job.client_id else {
                self.fail(&job.id, "lost", "no client recorded for in-flight job").await;
                continue;
            };
            let Some(registered) = self.clients.read().unwrap().get(client_id).cloned() else {
                self.fail(&job.id, "lost", "client no longer configured").await;
                continue;
            };
            let Some(external_id) = self.external_ids.read().unwrap().get(&job.id).cloned() else {
                self.fail(&job.id, "lost", "no external id recorded for in-flight job").await;
                continue;
            };
            if registered.client.status(&external_id).await.is_err() {
                self.fail(&job.id, "lost", "client no longer recognizes this job's external id").await;
            }
        }
    }
}
