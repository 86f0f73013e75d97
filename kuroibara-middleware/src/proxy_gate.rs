//! Proxy-selecting middleware.
//!
//! `Source::search`/`details`/`chapters`/`pages` take no transport
//! parameter, so the selected proxy for the current call is threaded
//! through a scoped task-local rather than a trait signature change. The
//! Generic Adapter's HTTP client reads [`current_proxy`] when it builds
//! its request.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use kuroibara_core::middleware::{Middleware, ValidationContext};
use kuroibara_core::source::{
    ChaptersProvider, DetailsProvider, PagesProvider, ProbeProvider, SearchProvider, Source,
};
use kuroibara_proxy::{ProxyOutcome, ProxyPool};
use kuroibara_types::{
    ChapterRef, KuroibaraError, ProxyEntry, SearchRequest, SearchResultPage, SourceDescriptor,
    UniversalEntry,
};

tokio::task_local! {
    static CURRENT_PROXY: Option<ProxyEntry>;
}

/// The proxy selected for the in-flight call on this task, if any. Returns
/// `None` both when the source is direct-only and when called outside a
/// proxy-gated call (adapters fall back to a direct connection in either
/// case).
#[must_use]
pub fn current_proxy() -> Option<ProxyEntry> {
    CURRENT_PROXY.try_with(Clone::clone).unwrap_or(None)
}

/// Wraps a source so every capability call first selects a proxy (or fails
/// fast with `NoProxyAvailable`), exposes it via [`current_proxy`] for the
/// duration of the call, and reports the outcome back to the pool.
pub struct ProxyGatedSource {
    inner: Arc<dyn Source>,
    pool: Arc<ProxyPool>,
}

impl ProxyGatedSource {
    async fn call<T, Fut>(&self, fut: impl FnOnce() -> Fut) -> Result<T, KuroibaraError>
    where
    Fut: std::future::Future<Output = Result<T, KuroibaraError>>,
    {
        let proxy = self.pool.get_proxy(self.inner.name()).await?;
        let proxy_id = proxy.as_ref().map(|p| p.id.clone());
        let started = Instant::now();
        let result = CURRENT_PROXY.scope(proxy, fut()).await;

        if let Some(proxy_id) = proxy_id {
            let outcome = ProxyOutcome {
                success: result.is_ok(),
                latency: Some(started.elapsed()),
            };
            self.pool
            .report_proxy_outcome(self.inner.name(), &proxy_id, outcome)
            .await;
        }
        result
    }
}

impl Source for ProxyGatedSource {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn descriptor(&self) -> Arc<SourceDescriptor> {
        self.inner.descriptor()
    }

    fn as_search_provider(&self) -> Option<&dyn SearchProvider> {
        self.inner.as_search_provider().map(|_| self as &dyn SearchProvider)
    }

    fn as_details_provider(&self) -> Option<&dyn DetailsProvider> {
        self.inner.as_details_provider().map(|_| self as &dyn DetailsProvider)
    }

    fn as_chapters_provider(&self) -> Option<&dyn ChaptersProvider> {
        self.inner
        .as_chapters_provider()
        .map(|_| self as &dyn ChaptersProvider)
    }

    fn as_pages_provider(&self) -> Option<&dyn PagesProvider> {
        self.inner.as_pages_provider().map(|_| self as &dyn PagesProvider)
    }

    fn as_probe_provider(&self) -> Option<&dyn ProbeProvider> {
        self.inner.as_probe_provider().map(|_| self as &dyn ProbeProvider)
    }
}

#[async_trait]
impl SearchProvider for ProxyGatedSource {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, KuroibaraError> {
        let inner = self.inner.as_search_provider().expect("checked by accessor");
        self.call(|| inner.search(request)).await
    }
}

#[async_trait]
impl DetailsProvider for ProxyGatedSource {
    async fn details(&self, native_id: &str) -> Result<UniversalEntry, KuroibaraError> {
        let inner = self.inner.as_details_provider().expect("checked by accessor");
        self.call(|| inner.details(native_id)).await
    }
}

#[async_trait]
impl ChaptersProvider for ProxyGatedSource {
    async fn chapters(&self, native_id: &str) -> Result<Vec<ChapterRef>, KuroibaraError> {
        let inner = self.inner.as_chapters_provider().expect("checked by accessor");
        self.call(|| inner.chapters(native_id)).await
    }
}

#[async_trait]
impl PagesProvider for ProxyGatedSource {
    async fn pages(&self, chapter_native_id: &str) -> Result<Vec<String>, KuroibaraError> {
        let inner = self.inner.as_pages_provider().expect("checked by accessor");
        self.call(|| inner.pages(chapter_native_id)).await
    }
}

#[async_trait]
impl ProbeProvider for ProxyGatedSource {
    async fn probe(&self) -> Result<(), KuroibaraError> {
        let inner = self.inner.as_probe_provider().expect("checked by accessor");
        self.call(|| inner.probe()).await
    }
}

/// [`Middleware`] installing a [`ProxyGatedSource`]. Conventionally placed
/// inside the rate limiter (proxy selection does not consume a rate-limit
/// token by itself) and outside the raw adapter.
pub struct ProxyMiddleware {
    pool: Arc<ProxyPool>,
}

impl ProxyMiddleware {
    /// Build a proxy-selecting layer backed by `pool`.
    #[must_use]
    pub const fn new(pool: Arc<ProxyPool>) -> Self {
        Self { pool }
    }
}

impl Middleware for ProxyMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn Source>) -> Arc<dyn Source> {
        Arc::new(ProxyGatedSource {
            inner,
            pool: self.pool,
        })
    }

    fn name(&self) -> &'static str {
        "proxy"
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    fn validate(&self, _ctx: &ValidationContext) -> Result<(), KuroibaraError> {
        Ok(())
    }
}
