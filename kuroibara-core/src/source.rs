//! The [`Source`] trait and its capability provider sub-traits.
//!
//! A source adapter implements [`Source`] plus whichever capability traits
//! it actually supports, advertising each one through an `as_*_provider`
//! accessor. Orchestration code (registry, search engine, download
//! scheduler) never downcasts a concrete adapter type — it asks the
//! `Source` for the capability it needs and gets `None` back when absent.

use std::sync::Arc;

use async_trait::async_trait;
use kuroibara_types::{
    ChapterRef, KuroibaraError, SearchRequest, SearchResultPage, SourceDescriptor, SourceKey,
};

/// Search a source's catalog for entries matching a query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Execute a paginated search against this source.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, KuroibaraError>;
}

/// Fetch full entry details for a native id.
#[async_trait]
pub trait DetailsProvider: Send + Sync {
    /// Fetch the entry identified by `native_id` on this source.
    async fn details(
        &self,
        native_id: &str,
    ) -> Result<kuroibara_types::UniversalEntry, KuroibaraError>;
}

/// List chapters for a native entry id.
#[async_trait]
pub trait ChaptersProvider: Send + Sync {
    /// Fetch the chapter list for the entry identified by `native_id`.
    async fn chapters(&self, native_id: &str) -> Result<Vec<ChapterRef>, KuroibaraError>;
}

/// List page image URLs for a chapter.
#[async_trait]
pub trait PagesProvider: Send + Sync {
    /// Fetch ordered page URLs for the chapter identified by
    /// `chapter_native_id`.
    async fn pages(&self, chapter_native_id: &str) -> Result<Vec<String>, KuroibaraError>;
}

/// Lightweight reachability probe used by the Health Monitor.
#[async_trait]
pub trait ProbeProvider: Send + Sync {
    /// Perform a cheap request that confirms the source is reachable and
    /// not currently presenting a bot challenge.
    async fn probe(&self) -> Result<(), KuroibaraError>;
}

/// Main trait implemented by every source adapter and by every middleware
/// layer that wraps one. Exposes capability discovery so callers never need
/// to know a concrete adapter's type.
#[async_trait]
pub trait Source: Send + Sync {
    /// A stable identifier for priority lists and logging (e.g. `"mangadex"`).
    fn name(&self) -> &'static str;

    /// Canonical source key constructed from the static name.
    fn key(&self) -> SourceKey {
        SourceKey::new(self.name())
    }

    /// The static descriptor this adapter was configured from.
    fn descriptor(&self) -> Arc<SourceDescriptor>;

    /// Advertise search capability by returning a usable trait object
    /// reference when supported.
    fn as_search_provider(&self) -> Option<&dyn SearchProvider> {
        None
    }

    /// Advertise details capability by returning a usable trait object
    /// reference when supported.
    fn as_details_provider(&self) -> Option<&dyn DetailsProvider> {
        None
    }

    /// Advertise chapters capability by returning a usable trait object
    /// reference when supported.
    fn as_chapters_provider(&self) -> Option<&dyn ChaptersProvider> {
        None
    }

    /// Advertise pages capability by returning a usable trait object
    /// reference when supported.
    fn as_pages_provider(&self) -> Option<&dyn PagesProvider> {
        None
    }

    /// Advertise probe capability by returning a usable trait object
    /// reference when supported. Sources without a dedicated cheap probe
    /// may fall back to a narrow search as their probe.
    fn as_probe_provider(&self) -> Option<&dyn ProbeProvider> {
        None
    }
}
