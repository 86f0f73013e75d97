//! Chapter identity.

use serde::{Deserialize, Serialize};

/// A reference to one chapter within one source.
///
/// Invariant: `(source_id, source_native_id)` uniquely identifies a
/// chapter within a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    /// Owning source id.
    pub source_id: String,
    /// Chapter's native id within the source.
    pub source_native_id: String,
    /// Native id of the parent title within the source.
    pub manga_native_id: String,
    /// Chapter number as a string, to preserve "12.5", "Extra", etc.
    pub chapter_number: String,
    /// Volume label, when known.
    pub volume: Option<String>,
    /// Chapter title, when known.
    pub title: Option<String>,
    /// Language code (ISO), e.g. "en".
    pub language: String,
    /// Release date, ISO-8601, when known.
    pub release_date: Option<String>,
    /// Page count, when known ahead of fetching pages.
    pub page_count: Option<u32>,
}

impl ChapterRef {
    /// The `(source_id, source_native_id)` identity pair.
    #[must_use]
    pub fn identity(&self) -> (&str, &str) {
        (&self.source_id, &self.source_native_id)
    }
}
