//! The fused cross-source title record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Publication format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EntryType {
    /// Japanese comic.
    Manga,
    /// Korean comic.
    Manhwa,
    /// Chinese comic.
    Manhua,
    /// Prose novel (often paired with a manga adaptation).
    Novel,
    /// Format could not be determined from any source.
    Unknown,
}

impl Default for EntryType {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Publication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EntryStatus {
    /// Still being released.
    Ongoing,
    /// Finished.
    Completed,
    /// Paused indefinitely.
    Hiatus,
    /// Discontinued.
    Cancelled,
    /// Status could not be determined from any source.
    Unknown,
}

impl Default for EntryStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// A credited author/artist and their role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Author's credited name.
    pub name: String,
    /// Credited role, e.g. "story", "art".
    pub role: String,
}

/// One source's evidence for a [`UniversalEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOrigin {
    /// Id of the contributing [`crate::SourceDescriptor`].
    pub source_id: String,
    /// The title's native id within that source.
    pub source_native_id: String,
    /// Confidence this origin correctly matches the fused entry, in [0,1].
    pub confidence: f64,
    /// Whether this origin flagged the title as NSFW.
    pub nsfw: bool,
}

/// A fused, cross-source title record.
///
/// Invariants: at least one source-origin; every origin's confidence is in
/// `[0,1]`; genres are deduplicated case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversalEntry {
    /// Stable synthetic id, distinct from any source's native id.
    pub id: String,
    /// Canonical display title.
    pub title: String,
    /// Alternative titles collected from source-origins.
    pub alternative_titles: BTreeSet<String>,
    /// Synopsis, preferring the highest-tier origin that supplied one.
    pub description: Option<String>,
    /// Cover image URL, preferring the highest-tier origin that supplied one.
    pub cover_url: Option<String>,
    /// Publication format.
    pub entry_type: EntryType,
    /// Publication status.
    pub status: EntryStatus,
    /// Release year, when known.
    pub year: Option<i32>,
    /// True if any source-origin flagged this entry as NSFW.
    pub nsfw: bool,
    /// Deduplicated (case-insensitive) genre tags.
    pub genres: BTreeSet<String>,
    /// Credited authors/artists.
    pub authors: Vec<Author>,
    /// Aggregate rating in `[0, 10]`, when available.
    pub rating: Option<f64>,
    /// Relative popularity rank, lower is more popular, when available.
    pub popularity_rank: Option<u32>,
    /// Evidence contributed by each source that matched this entry.
    pub source_origins: Vec<SourceOrigin>,
    /// Fraction of {title, description, cover, genres, year, authors}
    /// fields that are present, in `[0, 1]`.
    pub data_completeness: f64,
}

impl UniversalEntry {
    /// Highest confidence across all contributing source-origins, or `0.0`
    /// if (invariantly impossible) there are none.
    #[must_use]
    pub fn max_confidence(&self) -> f64 {
        self.source_origins
        .iter()
        .map(|o| o.confidence)
        .fold(0.0_f64, f64::max)
    }

    /// Validate the invariants. Intended for tests.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        !self.source_origins.is_empty()
        && self
        .source_origins
        .iter()
        .all(|o| (0.0..=1.0).contains(&o.confidence))
    }

    /// Insert a genre, deduplicating case-insensitively.
    pub fn add_genre(&mut self, genre: &str) {
        let lower = genre.to_lowercase();
        if !self.genres.iter().any(|g| g.to_lowercase() == lower) {
            self.genres.insert(genre.to_string());
        }
    }
}
