//! In-memory [`Source`] implementation for tests: deterministic by default,
//! fully overridable per capability via closures.

use std::sync::Arc;

use async_trait::async_trait;
use kuroibara_core::source::{
    ChaptersProvider, DetailsProvider, PagesProvider, ProbeProvider, SearchProvider, Source,
};
use kuroibara_types::{
    AdapterKind, Capability, CapabilitySet, ChapterRef, KuroibaraError, SearchRequest,
    SearchResultPage, SourceAttribution, SourceDescriptor, Tier, UniversalEntry,
};

use crate::fixtures;

type SearchFn = Arc<dyn Fn(&SearchRequest) -> Result<SearchResultPage, KuroibaraError> + Send + Sync>;
type DetailsFn = Arc<dyn Fn(&str) -> Result<UniversalEntry, KuroibaraError> + Send + Sync>;
type ChaptersFn = Arc<dyn Fn(&str) -> Result<Vec<ChapterRef>, KuroibaraError> + Send + Sync>;
type PagesFn = Arc<dyn Fn(&str) -> Result<Vec<String>, KuroibaraError> + Send + Sync>;
type ProbeFn = Arc<dyn Fn() -> Result<(), KuroibaraError> + Send + Sync>;

/// A fully in-memory [`Source`] for tests and examples.
///
/// A `"FAIL"` query/native-id is a sentinel recognized by the default
/// closures to force a deterministic error, for exercising failure paths
/// without a custom closure.
pub struct MockSource {
    name: &'static str,
    descriptor: Arc<SourceDescriptor>,
    search_fn: Option<SearchFn>,
    details_fn: Option<DetailsFn>,
    chapters_fn: Option<ChaptersFn>,
    pages_fn: Option<PagesFn>,
    probe_fn: Option<ProbeFn>,
}

impl MockSource {
    fn default_descriptor(name: &'static str) -> SourceDescriptor {
        SourceDescriptor {
            id: name.to_string(),
            name: name.to_string(),
            base_origin: format!("https://{name}.example"),
            tier: Tier::Primary,
            capabilities: CapabilitySet::new([
                Capability::Search,
                Capability::Details,
                Capability::Chapters,
                Capability::Pages,
            ]),
            adapter_kind: AdapterKind::Custom,
            priority: 0,
            supports_nsfw: false,
            requires_solver: false,
            config: None,
        }
    }
}

impl Source for MockSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn descriptor(&self) -> Arc<SourceDescriptor> {
        Arc::clone(&self.descriptor)
    }

    fn as_search_provider(&self) -> Option<&dyn SearchProvider> {
        self.descriptor
            .supports(Capability::Search)
            .then_some(self as &dyn SearchProvider)
    }

    fn as_details_provider(&self) -> Option<&dyn DetailsProvider> {
        self.descriptor
            .supports(Capability::Details)
            .then_some(self as &dyn DetailsProvider)
    }

    fn as_chapters_provider(&self) -> Option<&dyn ChaptersProvider> {
        self.descriptor
            .supports(Capability::Chapters)
            .then_some(self as &dyn ChaptersProvider)
    }

    fn as_pages_provider(&self) -> Option<&dyn PagesProvider> {
        self.descriptor
            .supports(Capability::Pages)
            .then_some(self as &dyn PagesProvider)
    }

    fn as_probe_provider(&self) -> Option<&dyn ProbeProvider> {
        Some(self as &dyn ProbeProvider)
    }
}

#[async_trait]
impl SearchProvider for MockSource {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, KuroibaraError> {
        if let Some(f) = &self.search_fn {
            return f(request);
        }
        if request.query == "FAIL" {
            return Err(KuroibaraError::transport(self.name, "forced failure: search"));
        }
        let entry = fixtures::sample_entry(self.name, "iron-blossom");
        Ok(SearchResultPage {
            results: vec![entry.clone()],
            total_estimate: 1,
            page: request.page,
            page_size: request.page_size,
            has_next: false,
            sources: vec![SourceAttribution {
                name: self.name.to_string(),
                tier: self.descriptor.tier,
                count: 1,
                confidence_min: entry.max_confidence(),
                confidence_max: entry.max_confidence(),
            }],
            failures: Vec::new(),
            cache_hit: false,
            source_latencies_ms: vec![(self.name.to_string(), 5)],
        })
    }
}

#[async_trait]
impl DetailsProvider for MockSource {
    async fn details(&self, native_id: &str) -> Result<UniversalEntry, KuroibaraError> {
        if let Some(f) = &self.details_fn {
            return f(native_id);
        }
        if native_id == "FAIL" {
            return Err(KuroibaraError::transport(self.name, "forced failure: details"));
        }
        Ok(fixtures::sample_entry(self.name, native_id))
    }
}

#[async_trait]
impl ChaptersProvider for MockSource {
    async fn chapters(&self, native_id: &str) -> Result<Vec<ChapterRef>, KuroibaraError> {
        if let Some(f) = &self.chapters_fn {
            return f(native_id);
        }
        if native_id == "FAIL" {
            return Err(KuroibaraError::transport(self.name, "forced failure: chapters"));
        }
        Ok(fixtures::sample_chapters(self.name, native_id))
    }
}

#[async_trait]
impl PagesProvider for MockSource {
    async fn pages(&self, chapter_native_id: &str) -> Result<Vec<String>, KuroibaraError> {
        if let Some(f) = &self.pages_fn {
            return f(chapter_native_id);
        }
        if chapter_native_id == "FAIL" {
            return Err(KuroibaraError::transport(self.name, "forced failure: pages"));
        }
        Ok(fixtures::sample_pages(self.name, chapter_native_id))
    }
}

#[async_trait]
impl ProbeProvider for MockSource {
    async fn probe(&self) -> Result<(), KuroibaraError> {
        if let Some(f) = &self.probe_fn {
            return f();
        }
        Ok(())
    }
}

/// Fluent builder for [`MockSource`].
pub struct MockSourceBuilder {
    name: &'static str,
    descriptor: Option<SourceDescriptor>,
    search_fn: Option<SearchFn>,
    details_fn: Option<DetailsFn>,
    chapters_fn: Option<ChaptersFn>,
    pages_fn: Option<PagesFn>,
    probe_fn: Option<ProbeFn>,
}

impl MockSourceBuilder {
    /// Start building a mock source with the given stable name.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            descriptor: None,
            search_fn: None,
            details_fn: None,
            chapters_fn: None,
            pages_fn: None,
            probe_fn: None,
        }
    }

    /// Override the default descriptor entirely.
    #[must_use]
    pub fn descriptor(mut self, descriptor: SourceDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Restrict the descriptor's declared capabilities to exactly `caps`.
    #[must_use]
    pub fn capabilities(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        let mut descriptor = self
            .descriptor
            .unwrap_or_else(|| MockSource::default_descriptor(self.name));
        descriptor.capabilities = CapabilitySet::new(caps);
        self.descriptor = Some(descriptor);
        self
    }

    /// Install a custom search closure.
    #[must_use]
    pub fn with_search_fn(
        mut self,
        f: impl Fn(&SearchRequest) -> Result<SearchResultPage, KuroibaraError> + Send + Sync + 'static,
    ) -> Self {
        self.search_fn = Some(Arc::new(f));
        self
    }

    /// Install a custom details closure.
    #[must_use]
    pub fn with_details_fn(
        mut self,
        f: impl Fn(&str) -> Result<UniversalEntry, KuroibaraError> + Send + Sync + 'static,
    ) -> Self {
        self.details_fn = Some(Arc::new(f));
        self
    }

    /// Install a custom chapters closure.
    #[must_use]
    pub fn with_chapters_fn(
        mut self,
        f: impl Fn(&str) -> Result<Vec<ChapterRef>, KuroibaraError> + Send + Sync + 'static,
    ) -> Self {
        self.chapters_fn = Some(Arc::new(f));
        self
    }

    /// Install a custom pages closure.
    #[must_use]
    pub fn with_pages_fn(
        mut self,
        f: impl Fn(&str) -> Result<Vec<String>, KuroibaraError> + Send + Sync + 'static,
    ) -> Self {
        self.pages_fn = Some(Arc::new(f));
        self
    }

    /// Install a custom probe closure.
    #[must_use]
    pub fn with_probe_fn(
        mut self,
        f: impl Fn() -> Result<(), KuroibaraError> + Send + Sync + 'static,
    ) -> Self {
        self.probe_fn = Some(Arc::new(f));
        self
    }

    /// Make the probe always fail, simulating a down source.
    #[must_use]
    pub fn probe_fails(self) -> Self {
        self.with_probe_fn(|| Err(KuroibaraError::transport("mock", "forced probe failure")))
    }

    /// Finalize the builder.
    #[must_use]
    pub fn build(self) -> Arc<MockSource> {
        let descriptor = self
            .descriptor
            .unwrap_or_else(|| MockSource::default_descriptor(self.name));
        Arc::new(MockSource {
            name: self.name,
            descriptor: Arc::new(descriptor),
            search_fn: self.search_fn,
            details_fn: self.details_fn,
            chapters_fn: self.chapters_fn,
            pages_fn: self.pages_fn,
            probe_fn: self.probe_fn,
        })
    }
}
