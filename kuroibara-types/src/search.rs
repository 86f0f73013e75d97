//! Search request/response shapes.

use serde::{Deserialize, Serialize};

use crate::source::Tier;

/// Caller-supplied filter applied by the admission filter and again
/// to the final fused page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Whether NSFW entries may be returned.
    pub allow_nsfw: bool,
    /// Restrict to these tiers; empty means no restriction.
    pub tiers: Vec<Tier>,
    /// Restrict to these languages (ISO codes); empty means no restriction.
    pub languages: Vec<String>,
    /// Maximum content rating to admit, if the platform defines one
    /// (e.g. "PG-13"); `None` means no ceiling.
    pub content_rating_ceiling: Option<String>,
}

impl SearchFilter {
    /// A stable signature for cache-key construction.
    #[must_use]
    pub fn signature(&self) -> String {
        let mut tiers: Vec<&str> = self.tiers.iter().map(|t| match t {
            Tier::Primary => "primary",
            Tier::Secondary => "secondary",
            Tier::Tertiary => "tertiary",
        }).collect();
        tiers.sort_unstable();
        let mut langs = self.languages.clone();
        langs.sort();
        format!(
            "nsfw={}|tiers={}|langs={}|ceiling={}",
            self.allow_nsfw,
            tiers.join(","),
            langs.join(","),
            self.content_rating_ceiling.as_deref().unwrap_or(""),
        )
    }
}

/// An immutable search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// 1-based page number.
    pub page: u32,
    /// Page size (callers commonly call this "limit").
    pub page_size: u32,
    /// Admission/result filter.
    pub filter: SearchFilter,
    /// Dispatch priority forwarded to the Rate Controller.
    pub priority: u8,
    /// Caller identifier, used for rate-limit accounting.
    pub caller_id: String,
}

impl SearchRequest {
    /// Normalized query used for fingerprinting and cache keys: case-fold,
    /// strip punctuation, collapse whitespace.
    #[must_use]
    pub fn normalized_query(&self) -> String {
        normalize_title(&self.query)
    }

    /// Cache key combining normalized query, page, limit, and filter
    /// signature.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{}|p={}|l={}|{}",
            self.normalized_query(),
            self.page,
            self.page_size,
            self.filter.signature()
        )
    }
}

/// Normalize a title for fingerprinting/search-matching: case-fold, strip
/// punctuation, collapse whitespace.
#[must_use]
pub fn normalize_title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            last_was_space = false;
        } else if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        }
        // other punctuation is dropped entirely
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Per-source attribution summary returned alongside a search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAttribution {
    /// Source display name.
    pub name: String,
    /// Source tier.
    pub tier: Tier,
    /// Number of entries this source contributed to the fused page.
    pub count: usize,
    /// Minimum confidence contributed.
    pub confidence_min: f64,
    /// Maximum confidence contributed.
    pub confidence_max: f64,
}

/// A per-source failure recorded alongside a partially successful search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    /// Source that failed.
    pub source_id: String,
    /// Stable error kind label.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

/// Result of a tiered search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultPage {
    /// Ranked, deduplicated, paginated entries.
    pub results: Vec<crate::entry::UniversalEntry>,
    /// Estimated total count across all consulted sources before paging.
    pub total_estimate: usize,
    /// Echoed 1-based page number.
    pub page: u32,
    /// Echoed page size.
    pub page_size: u32,
    /// Whether a further page is likely to have more results.
    pub has_next: bool,
    /// Attribution per contributing source.
    pub sources: Vec<SourceAttribution>,
    /// Failures recorded for sources consulted but not contributing.
    pub failures: Vec<SourceFailure>,
    /// Whether this page was served from the result cache.
    pub cache_hit: bool,
    /// Per-source latency in milliseconds, for observability.
    pub source_latencies_ms: Vec<(String, u64)>,
}
