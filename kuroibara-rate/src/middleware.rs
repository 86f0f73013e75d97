//! [`Middleware`] adapter that gates a [`Source`] behind the
//! [`RateController`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kuroibara_core::middleware::{Middleware, ValidationContext};
use kuroibara_core::source::{
    ChaptersProvider, DetailsProvider, PagesProvider, ProbeProvider, SearchProvider, Source,
};
use kuroibara_types::{
    ChapterRef, KuroibaraError, SearchRequest, SearchResultPage, SourceDescriptor, UniversalEntry,
};

use crate::controller::{Outcome, Priority, RateController};

/// Wraps an inner source so every capability call first acquires a rate
/// permit, then reports the outcome back to the controller for adaptive
/// cooldown handling.
pub struct RateLimitedSource {
    inner: Arc<dyn Source>,
    controller: Arc<RateController>,
    default_timeout: Duration,
}

impl RateLimitedSource {
    /// Wrap `inner` behind `controller`. `default_timeout` bounds how long a
    /// capability call will wait in the priority queue before failing with
    /// `RateLimited`.
    #[must_use]
    pub fn new(inner: Arc<dyn Source>, controller: Arc<RateController>, default_timeout: Duration) -> Self {
        Self {
            inner,
            controller,
            default_timeout,
        }
    }

    async fn acquire(&self) -> Result<crate::controller::RatePermit, KuroibaraError> {
        self.controller
        .acquire(self.inner.name(), Priority::NORMAL, self.default_timeout)
        .await
    }

    async fn report(&self, result: &Result<(), KuroibaraError>) {
        let outcome = match result {
            Ok(()) => Outcome::Ok,
            Err(KuroibaraError::RateLimited {.. }) => Outcome::RateLimited,
            Err(KuroibaraError::Transport {.. } | KuroibaraError::ProviderDown {.. }) => {
                Outcome::ServerError
            }
            Err(_) => Outcome::Ok,
        };
        self.controller.report_outcome(self.inner.name(), outcome).await;
    }
}

impl Source for RateLimitedSource {
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
impl SearchProvider for RateLimitedSource {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, KuroibaraError> {
        let permit = self.acquire().await?;
        let result = self
        .inner
        .as_search_provider()
        .expect("advertised by as_search_provider")
        .search(request)
        .await;
        permit.release();
        self.report(&result.as_ref().map(|_| ()).map_err(Clone::clone)).await;
        result
    }
}

#[async_trait]
impl DetailsProvider for RateLimitedSource {
    async fn details(&self, native_id: &str) -> Result<UniversalEntry, KuroibaraError> {
        let permit = self.acquire().await?;
        let result = self
        .inner
        .as_details_provider()
        .expect("advertised by as_details_provider")
        .details(native_id)
        .await;
        permit.release();
        self.report(&result.as_ref().map(|_| ()).map_err(Clone::clone)).await;
        result
    }
}

#[async_trait]
impl ChaptersProvider for RateLimitedSource {
    async fn chapters(&self, native_id: &str) -> Result<Vec<ChapterRef>, KuroibaraError> {
        let permit = self.acquire().await?;
        let result = self
        .inner
        .as_chapters_provider()
        .expect("advertised by as_chapters_provider")
        .chapters(native_id)
        .await;
        permit.release();
        self.report(&result.as_ref().map(|_| ()).map_err(Clone::clone)).await;
        result
    }
}

#[async_trait]
impl PagesProvider for RateLimitedSource {
    async fn pages(&self, chapter_native_id: &str) -> Result<Vec<String>, KuroibaraError> {
        let permit = self.acquire().await?;
        let result = self
        .inner
        .as_pages_provider()
        .expect("advertised by as_pages_provider")
        .pages(chapter_native_id)
        .await;
        permit.release();
        self.report(&result.as_ref().map(|_| ()).map_err(Clone::clone)).await;
        result
    }
}

#[async_trait]
impl ProbeProvider for RateLimitedSource {
    async fn probe(&self) -> Result<(), KuroibaraError> {
        let permit = self.acquire().await?;
        let result = self
        .inner
        .as_probe_provider()
        .expect("advertised by as_probe_provider")
        .probe()
        .await;
        permit.release();
        self.report(&result).await;
        result
    }
}

/// [`Middleware`] that installs a [`RateLimitedSource`] around the inner
/// source. Has no position requirements of its own but is conventionally
/// placed innermost of the Proxy Pool and Health Gate layers so that rate
/// accounting reflects only real upstream dispatches.
pub struct RateLimitMiddleware {
    controller: Arc<RateController>,
    timeout: Duration,
}

impl RateLimitMiddleware {
    /// Build a rate-limit middleware layer backed by `controller`.
    #[must_use]
    pub const fn new(controller: Arc<RateController>, timeout: Duration) -> Self {
        Self { controller, timeout }
    }
}

impl Middleware for RateLimitMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn Source>) -> Arc<dyn Source> {
        Arc::new(RateLimitedSource::new(inner, self.controller, self.timeout))
    }

    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({ "timeout_ms": self.timeout.as_millis() as u64 })
    }

    fn validate(&self, _ctx: &ValidationContext) -> Result<(), KuroibaraError> {
        Ok(())
    }
}
