//! Challenge Solver middleware.
//!
//! Composed outside the rate/proxy layers per the Open Question resolution:
//! a bot challenge is a property of the response content, not of rate or
//! transport, so it is detected and solved before those layers ever see a
//! retry.

use std::sync::Arc;

use async_trait::async_trait;
use kuroibara_core::middleware::{Middleware, ValidationContext};
use kuroibara_core::source::{
    ChaptersProvider, DetailsProvider, PagesProvider, ProbeProvider, SearchProvider, Source,
};
use kuroibara_types::{
    ChapterRef, KuroibaraError, SearchRequest, SearchResultPage, SourceDescriptor, UniversalEntry,
};

tokio::task_local! {
    static SOLVED_TOKEN: Option<String>;
}

/// The solver-issued bypass token for the in-flight call on this task, if
/// a challenge was already solved for it.
#[must_use]
pub fn current_solved_token() -> Option<String> {
    SOLVED_TOKEN.try_with(Clone::clone).unwrap_or(None)
}

/// Resolves a bot-protection challenge by calling an external Challenge
/// Solver HTTP service, returning a bypass token usable by the adapter's
/// next attempt.
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    /// Solve the challenge presented by `source_id`, returning a bypass
    /// token on success.
    async fn solve(&self, source_id: &str) -> Result<String, KuroibaraError>;
}

/// Wraps a source so a `BotChallenge` error triggers exactly one solve +
/// retry before being propagated.
pub struct SolvedSource {
    inner: Arc<dyn Source>,
    solver: Arc<dyn ChallengeSolver>,
}

impl SolvedSource {
    async fn call<T, Fut>(&self, fut: impl Fn() -> Fut) -> Result<T, KuroibaraError>
    where
    Fut: std::future::Future<Output = Result<T, KuroibaraError>>,
    {
        let first = SOLVED_TOKEN.scope(None, fut()).await;
        match first {
            Err(KuroibaraError::BotChallenge { source }) => {
                let token = self.solver.solve(&source).await?;
                SOLVED_TOKEN.scope(Some(token), fut()).await
            }
            other => other,
        }
    }
}

impl Source for SolvedSource {
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
impl SearchProvider for SolvedSource {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, KuroibaraError> {
        let inner = self.inner.as_search_provider().expect("checked by accessor");
        self.call(|| inner.search(request)).await
    }
}

#[async_trait]
impl DetailsProvider for SolvedSource {
    async fn details(&self, native_id: &str) -> Result<UniversalEntry, KuroibaraError> {
        let inner = self.inner.as_details_provider().expect("checked by accessor");
        self.call(|| inner.details(native_id)).await
    }
}

#[async_trait]
impl ChaptersProvider for SolvedSource {
    async fn chapters(&self, native_id: &str) -> Result<Vec<ChapterRef>, KuroibaraError> {
        let inner = self.inner.as_chapters_provider().expect("checked by accessor");
        self.call(|| inner.chapters(native_id)).await
    }
}

#[async_trait]
impl PagesProvider for SolvedSource {
    async fn pages(&self, chapter_native_id: &str) -> Result<Vec<String>, KuroibaraError> {
        let inner = self.inner.as_pages_provider().expect("checked by accessor");
        self.call(|| inner.pages(chapter_native_id)).await
    }
}

#[async_trait]
impl ProbeProvider for SolvedSource {
    async fn probe(&self) -> Result<(), KuroibaraError> {
        let inner = self.inner.as_probe_provider().expect("checked by accessor");
        self.call(|| inner.probe()).await
    }
}

/// [`Middleware`] installing a [`SolvedSource`]. Only meaningful for
/// adapters that declare `requires_solver=true` or that can present a bot
/// challenge; harmless (a no-op on success) when applied to others.
pub struct SolverMiddleware {
    solver: Arc<dyn ChallengeSolver>,
}

impl SolverMiddleware {
    /// Build a solver layer backed by `solver`.
    #[must_use]
    pub const fn new(solver: Arc<dyn ChallengeSolver>) -> Self {
        Self { solver }
    }
}

impl Middleware for SolverMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn Source>) -> Arc<dyn Source> {
        Arc::new(SolvedSource {
            inner,
            solver: self.solver,
        })
    }

    fn name(&self) -> &'static str {
        "solver"
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    fn validate(&self, _ctx: &ValidationContext) -> Result<(), KuroibaraError> {
        Ok(())
    }
}
