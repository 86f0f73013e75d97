//! The `Kuroibara` container: wires every component behind one handle.
//!
//! Construction is leaves-first: Rate Controller and Proxy Pool have no
//! dependencies on anything else; the Health Monitor depends on neither;
//! the Search Engine and Download Scheduler sit on top and consult the
//! others through the registry-resolved sources. Each source is wrapped
//! twice from the same raw adapter per [`kuroibara_middleware::SourceBuilder`]'s
//! onion: once with the full stack (health gate, proxy, solver, rate
//! limit) for serving real requests, and once without the health gate for
//! the Health Monitor's own probes — a probed source must not be
//! health-gated by the very monitor whose status it is updating.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kuroibara_download::{DownloadClient, DownloadScheduler, ImageFetcher, PostProcessor};
use kuroibara_health::HealthMonitor;
use kuroibara_middleware::{Admissibility, ChallengeSolver, SourceBuilder};
use kuroibara_proxy::{CanaryProbe, ProxyPool};
use kuroibara_rate::RateController;
use kuroibara_registry::factory::CustomFactoryRegistry;
use kuroibara_search::SearchEngine;
use kuroibara_types::{
    DownloadJob, DownloadTarget, JobKind, KuroibaraConfig, KuroibaraError, SearchRequest,
    SearchResultPage, SourceStatus,
};

/// Re-probe interval applied to every registered source.
const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 60;

/// Everything needed to resolve and wrap sources at startup, gathered by
/// [`KuroibaraBuilder`] before [`KuroibaraBuilder::build`] is called.
pub struct KuroibaraBuilder {
    config: KuroibaraConfig,
    built_in_dir: PathBuf,
    community_dir: PathBuf,
    factories: CustomFactoryRegistry,
    solver: Option<Arc<dyn ChallengeSolver>>,
    canary_probe: Option<Arc<dyn CanaryProbe>>,
    image_fetcher: Option<Arc<dyn ImageFetcher>>,
    post_processor: Option<Arc<dyn PostProcessor>>,
    clients: Vec<(JobKind, Arc<dyn DownloadClient>)>,
}

/// A no-op canary probe used when the embedding application has no proxy
/// health check of its own: every probe trivially succeeds with zero
/// latency.
struct NoopCanaryProbe;

#[async_trait::async_trait]
impl CanaryProbe for NoopCanaryProbe {
    async fn probe(&self, _entry: &kuroibara_types::ProxyEntry) -> Result<Duration, KuroibaraError> {
        Ok(Duration::ZERO)
    }
}

/// A post-processor that does nothing, for embedders with no external hook.
struct NoopPostProcessor;

#[async_trait::async_trait]
impl PostProcessor for NoopPostProcessor {
    async fn process(&self, _job: &DownloadJob, _local_files: &[String]) -> Result<(), KuroibaraError> {
        Ok(())
    }
}

impl KuroibaraBuilder {
    /// Start a builder reading built-in and community source configuration
    /// from the given directories.
    #[must_use]
    pub fn new(built_in_dir: impl Into<PathBuf>, community_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: KuroibaraConfig::default().apply_env_overrides(),
            built_in_dir: built_in_dir.into(),
            community_dir: community_dir.into(),
            factories: CustomFactoryRegistry::new(),
            solver: None,
            canary_probe: None,
            image_fetcher: None,
            post_processor: None,
            clients: Vec::new(),
        }
    }

    /// Override the process-wide configuration (defaults plus any
    /// environment overrides already applied by the caller).
    #[must_use]
    pub fn config(mut self, config: KuroibaraConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a [`kuroibara_registry::factory::CustomFactory`] under a
    /// class name referenced by `adapter_kind: "custom"` entries.
    #[must_use]
    pub fn custom_factory(
        mut self,
        class_name: impl Into<String>,
        factory: Arc<dyn kuroibara_registry::factory::CustomFactory>,
    ) -> Self {
        self.factories.register(class_name, factory);
        self
    }

    /// Install the Challenge Solver used for `requires_solver` sources.
    /// Without one, such sources load but stay disabled.
    #[must_use]
    pub fn solver(mut self, solver: Arc<dyn ChallengeSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Install the canary probe the Proxy Pool uses for its background
    /// health checks. Defaults to a no-op probe when omitted.
    #[must_use]
    pub fn canary_probe(mut self, probe: Arc<dyn CanaryProbe>) -> Self {
        self.canary_probe = Some(probe);
        self
    }

    /// Install the image fetcher backing Direct download jobs.
    #[must_use]
    pub fn image_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.image_fetcher = Some(fetcher);
        self
    }

    /// Install the post-processor hook run on job completion. Defaults to
    /// a no-op when omitted.
    #[must_use]
    pub fn post_processor(mut self, processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = Some(processor);
        self
    }

    /// Register a Torrent/NZB Download Client.
    #[must_use]
    pub fn download_client(mut self, kind: JobKind, client: Arc<dyn DownloadClient>) -> Self {
        self.clients.push((kind, client));
        self
    }

    /// Resolve sources, build every component, and wire them together.
    ///
    /// # Errors
    /// - [`KuroibaraError::InvalidArgument`] if no `image_fetcher` was
    /// provided.
    /// - [`KuroibaraError::InvalidArgument`] in `strict_mode` when no
    /// source loaded successfully.
    pub async fn build(self) -> Result<Kuroibara, KuroibaraError> {
        let Self {
            config,
            built_in_dir,
            community_dir,
            factories,
            solver,
            canary_probe,
            image_fetcher,
            post_processor,
            clients,
        } = self;

        let (loaded, config_errors) =
        kuroibara_registry::load(&built_in_dir, &community_dir, &factories, solver.is_some());

        let rate = Arc::new(RateController::new());
        let proxies = Arc::new(ProxyPool::new(
            canary_probe.unwrap_or_else(|| Arc::new(NoopCanaryProbe) as Arc<dyn CanaryProbe>),
        ));
        let health = Arc::new(HealthMonitor::with_worker_pool_size(config.health_worker_pool as usize));
        let search = Arc::new(SearchEngine::with_fan_out(
            Arc::clone(&health) as Arc<dyn Admissibility>,
            config.search_fan_out as usize,
        ));
        health.add_recovery_observer(Arc::clone(&search) as Arc<dyn kuroibara_health::RecoveryObserver>);
        let downloads = DownloadScheduler::new(
            config.download_concurrency,
            image_fetcher.ok_or_else(|| {
                KuroibaraError::InvalidArgument(
                    "an image_fetcher is required to build Kuroibara".to_string(),
                )
            })?,
            post_processor.unwrap_or_else(|| Arc::new(NoopPostProcessor) as Arc<dyn PostProcessor>),
        );
        for (kind, client) in clients {
            downloads.register_client(kind, client);
        }

        let mut statuses = HashMap::new();
        let mut enabled_count = 0usize;

        for entry in &loaded {
            statuses.insert(entry.descriptor.id.clone(), entry.disabled_reason.clone());
            let Some(raw) = entry.source.clone() else { continue };
            enabled_count += 1;

            let rate_config = entry.rate.unwrap_or(config.default_rate);
            rate.register_source(&entry.descriptor.id, rate_config).await;
            proxies.register_source(&entry.descriptor.id, entry.proxy.clone()).await;

            let probe_source = {
                let mut b = SourceBuilder::new(Arc::clone(&raw))
                .with_proxy(Arc::clone(&proxies))
                .with_rate_limit(Arc::clone(&rate), rate_config.max_wait);
                if let Some(s) = &solver {
                    b = b.with_solver(Arc::clone(s));
                }
                b.build()?
            };
            health.register_source(Arc::clone(&entry.descriptor), probe_source, DEFAULT_CHECK_INTERVAL_MINUTES);

            let serving_source = {
                let mut b = SourceBuilder::new(raw)
                .with_health_gate(Arc::clone(&health) as Arc<dyn Admissibility>)
                .with_proxy(Arc::clone(&proxies))
                .with_rate_limit(Arc::clone(&rate), rate_config.max_wait);
                if let Some(s) = &solver {
                    b = b.with_solver(Arc::clone(s));
                }
                b.build()?
            };
            search.register_source(Arc::clone(&entry.descriptor), Arc::clone(&serving_source));
            downloads.register_source(serving_source);
        }

        if config.strict_mode && enabled_count == 0 {
            return Err(KuroibaraError::InvalidArgument(
                "strict_mode is set but no source loaded successfully".to_string(),
            ));
        }

        let health_handle = tokio::spawn(Arc::clone(&health).run());

        Ok(Kuroibara {
            config,
            rate,
            proxies,
            health,
            search,
            downloads,
            statuses,
            config_errors: config_errors.into_iter().map(|e| e.to_string()).collect(),
            health_handle,
        })
    }
}

/// The orchestrator: one handle to every wired component.
pub struct Kuroibara {
    config: KuroibaraConfig,
    #[allow(dead_code)]
    rate: Arc<RateController>,
    #[allow(dead_code)]
    proxies: Arc<ProxyPool>,
    health: Arc<HealthMonitor>,
    search: Arc<SearchEngine>,
    downloads: Arc<DownloadScheduler>,
    /// `None` means the source loaded and is enabled; `Some(reason)` means
    /// it loaded but is currently disabled.
    statuses: HashMap<String, Option<String>>,
    /// Human-readable parse/validation failures from source config loading,
    /// surfaced for admin diagnostics rather than failing startup.
    config_errors: Vec<String>,
    health_handle: tokio::task::JoinHandle<()>,
}

impl Kuroibara {
    /// Start building a `Kuroibara` instance from source configuration
    /// directories.
    #[must_use]
    pub fn builder(built_in_dir: impl Into<PathBuf>, community_dir: impl Into<PathBuf>) -> KuroibaraBuilder {
        KuroibaraBuilder::new(built_in_dir, community_dir)
    }

    /// The effective process configuration.
    #[must_use]
    pub fn config(&self) -> &KuroibaraConfig {
        &self.config
    }

    /// Source config files that failed to parse or validate at startup.
    #[must_use]
    pub fn config_errors(&self) -> &[String] {
        &self.config_errors
    }

    /// Every loaded source id, paired with its disable reason when
    /// currently disabled.
    pub fn source_ids(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.statuses.iter().map(|(id, reason)| (id.as_str(), reason.as_deref()))
    }

    /// A source's current health status, per `GET /sources/health`.
    #[must_use]
    pub fn source_status(&self, source_id: &str) -> Option<SourceStatus> {
        self.health.status(source_id)
    }

    /// Trigger an immediate probe of one source, per
    /// `POST /sources/{id}/probe`.
    pub async fn probe_source(&self, source_id: &str) {
        self.health.probe_one(source_id).await;
    }

    /// Administratively disable a source, per `PATCH /sources/{id}`.
    pub fn disable_source(&self, source_id: &str) {
        self.health.disable(source_id);
    }

    /// Administratively re-enable a previously disabled source.
    pub fn enable_source(&self, source_id: &str) {
        self.health.enable(source_id);
    }

    /// Execute a tiered, fused, cached search, per
    /// `POST /search/enhanced`.
    ///
    /// # Errors
    /// Returns [`KuroibaraError::InvalidArgument`] for an empty query, or
    /// whatever [`SearchEngine::search`] returns (including
    /// [`KuroibaraError::AllSourcesFailed`] when every admitted source's
    /// call failed).
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, KuroibaraError> {
        if request.query.trim().is_empty() {
            return Err(KuroibaraError::InvalidArgument("query must not be empty".to_string()));
        }
        self.search.search(request).await
    }

    /// Submit a new download job, per `POST /downloads`.
    #[must_use]
    pub fn submit_download(&self, kind: JobKind, target: DownloadTarget) -> DownloadJob {
        self.downloads.submit(kind, target)
    }

    /// Look up a download job's current snapshot, per
    /// `GET /downloads/{id}`.
    #[must_use]
    pub fn download_status(&self, job_id: &str) -> Option<DownloadJob> {
        self.downloads.status(job_id)
    }

    /// Cancel a download job, per `DELETE /downloads/{id}`. A no-op on
    /// an already-terminal or unknown job.
    pub async fn cancel_download(&self, job_id: &str) {
        self.downloads.cancel(job_id).await;
    }

    /// Every known download job, unfiltered and unpaginated. Pagination and
    /// filtering for `GET /downloads` are applied by
    /// [`crate::api::paginate_downloads`] over this snapshot.
    #[must_use]
    pub fn list_downloads(&self) -> Vec<DownloadJob> {
        self.downloads.list_jobs()
    }

    /// Health summary for every registered source, per
    /// `GET /sources/health`.
    #[must_use]
    pub fn sources_health(&self) -> crate::api::SourcesHealthResponse {
        let mut indexers = HashMap::new();
        let mut healthy = 0usize;
        for (id, _) in self.source_ids() {
            let status = self.health.status(id);
            let (is_healthy, message, tier) = match &status {
                Some(s) => (
                    s.is_admissible(),
                    s.last_error.as_ref().map_or_else(|| "ok".to_string(), |e| e.message.clone()),
                    s.descriptor.tier,
                ),
                None => (false, "not registered for health checks".to_string(), kuroibara_types::Tier::Tertiary),
            };
            if is_healthy {
                healthy += 1;
            }
            indexers.insert(id.to_string(), crate::api::SourceHealthEntry { healthy: is_healthy, message, tier });
        }
        let total = indexers.len();
        let overall_health = if total == 0 { 0.0 } else { healthy as f64 / total as f64 };
        crate::api::SourcesHealthResponse {
            indexers,
            summary: crate::api::HealthSummary { total, healthy, overall_health },
        }
    }

    /// Stop the background task this container spawned itself (the Health
    /// Monitor's probe loop). Dispatcher tasks owned by the Rate Controller
    /// and Proxy Pool live for their `Arc`'s lifetime and remain each
    /// crate's own responsibility.
    pub fn shutdown(self) {
        self.health_handle.abort();
    }
}

/// Load [`KuroibaraConfig`] from a JSON file at `path`, falling back to
/// defaults when `path` does not exist, then apply environment overrides.
///
/// # Errors
/// Returns [`KuroibaraError::ParseError`] if `path` exists but does not
/// parse as a `KuroibaraConfig`.
pub fn load_config(path: &Path) -> Result<KuroibaraConfig, KuroibaraError> {
    let config = match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
        .map_err(|e| KuroibaraError::parse("kuroibara-config", e.to_string()))?,
        Err(_) => KuroibaraConfig::default(),
    };
    Ok(config.apply_env_overrides())
}
