//! Health-gating middleware.
//!
//! Rather than depending on the concrete Health Monitor implementation
//! (which would create a crate cycle, since the monitor itself wraps
//! sources through this crate's builder), the gate is defined against a
//! small [`Admissibility`] trait. `kuroibara-health`'s monitor implements
//! it.

use std::sync::Arc;

use async_trait::async_trait;
use kuroibara_core::middleware::{Middleware, ValidationContext};
use kuroibara_core::source::{
    ChaptersProvider, DetailsProvider, PagesProvider, ProbeProvider, SearchProvider, Source,
};
use kuroibara_types::{
    ChapterRef, KuroibaraError, SearchRequest, SearchResultPage, SourceDescriptor, UniversalEntry,
};

/// Narrow view onto the Health Monitor needed to gate requests: whether a
/// source is currently admissible.
pub trait Admissibility: Send + Sync {
    /// Whether `source_id` is currently admissible for new requests.
    fn is_admissible(&self, source_id: &str) -> bool;
}

/// Wraps a source so every capability call first checks admissibility,
/// failing fast with `ProviderDown` instead of dispatching a doomed
/// request.
pub struct HealthGatedSource {
    inner: Arc<dyn Source>,
    monitor: Arc<dyn Admissibility>,
}

impl HealthGatedSource {
    fn check(&self) -> Result<(), KuroibaraError> {
        if self.monitor.is_admissible(self.inner.name()) {
            Ok(())
        } else {
            Err(KuroibaraError::ProviderDown {
                source: self.inner.name().to_string(),
            })
        }
    }
}

impl Source for HealthGatedSource {
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
impl SearchProvider for HealthGatedSource {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, KuroibaraError> {
        self.check()?;
        self.inner.as_search_provider().expect("checked by accessor").search(request).await
    }
}

#[async_trait]
impl DetailsProvider for HealthGatedSource {
    async fn details(&self, native_id: &str) -> Result<UniversalEntry, KuroibaraError> {
        self.check()?;
        self.inner
        .as_details_provider()
        .expect("checked by accessor")
        .details(native_id)
        .await
    }
}

#[async_trait]
impl ChaptersProvider for HealthGatedSource {
    async fn chapters(&self, native_id: &str) -> Result<Vec<ChapterRef>, KuroibaraError> {
        self.check()?;
        self.inner
        .as_chapters_provider()
        .expect("checked by accessor")
        .chapters(native_id)
        .await
    }
}

#[async_trait]
impl PagesProvider for HealthGatedSource {
    async fn pages(&self, chapter_native_id: &str) -> Result<Vec<String>, KuroibaraError> {
        self.check()?;
        self.inner
        .as_pages_provider()
        .expect("checked by accessor")
        .pages(chapter_native_id)
        .await
    }
}

#[async_trait]
impl ProbeProvider for HealthGatedSource {
    async fn probe(&self) -> Result<(), KuroibaraError> {
        // Probes are how the Health Monitor itself decides admissibility;
        // gating them would deadlock recovery, so they always pass through.
        self.inner.as_probe_provider().expect("checked by accessor").probe().await
    }
}

/// [`Middleware`] installing a [`HealthGatedSource`]. Conventionally placed
/// outermost so an inadmissible source never reaches rate limiting or the
/// proxy pool.
pub struct HealthGateMiddleware {
    monitor: Arc<dyn Admissibility>,
}

impl HealthGateMiddleware {
    /// Build a health-gate layer backed by `monitor`.
    #[must_use]
    pub const fn new(monitor: Arc<dyn Admissibility>) -> Self {
        Self { monitor }
    }
}

impl Middleware for HealthGateMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn Source>) -> Arc<dyn Source> {
        Arc::new(HealthGatedSource {
            inner,
            monitor: self.monitor,
        })
    }

    fn name(&self) -> &'static str {
        "health_gate"
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    fn validate(&self, _ctx: &ValidationContext) -> Result<(), KuroibaraError> {
        Ok(())
    }
}
