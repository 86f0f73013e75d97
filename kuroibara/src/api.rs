//! Service API DTOs: serializable, transport-agnostic request/response
//! shapes for an HTTP/JSON binding embedding [`crate::Kuroibara`]. These are
//! plain data — no router, no HTTP framework dependency — kept separate
//! from the domain types in `kuroibara-types` so either can evolve
//! independently.

use std::collections::HashMap;

use kuroibara_types::{DownloadJob, JobKind, JobStatus, SearchResultPage, Tier};
use serde::{Deserialize, Serialize};

/// One source's contribution to a search response: name, tier, result
/// count, and confidence range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSummary {
    /// The source's display name.
    pub name: String,
    /// The source's fallback tier.
    pub tier: Tier,
    /// Entries this source contributed to the fused result set.
    pub count: usize,
    /// `(min, max)` confidence observed across this source's contributions.
    pub confidence_range: (f64, f64),
}

/// Timing/caching metadata for one search response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchPerformance {
    /// Wall-clock time the search took, milliseconds.
    pub response_time_ms: u64,
    /// Whether this response was served from the result-page cache.
    pub cached: bool,
}

/// `POST /search/enhanced` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedSearchResponse {
    /// Fused, ranked, paginated entries.
    pub results: Vec<kuroibara_types::UniversalEntry>,
    /// Total entries estimated across all consulted sources.
    pub total: usize,
    /// The requested page number.
    pub page: u32,
    /// The requested page size.
    pub limit: u32,
    /// Whether a further page is available.
    pub has_next: bool,
    /// Per-source attribution.
    pub sources: Vec<SourceSummary>,
    /// Timing/caching metadata.
    pub performance: SearchPerformance,
}

impl EnhancedSearchResponse {
    /// Build the API response shape from an engine [`SearchResultPage`]
    /// and the measured wall-clock duration of the call.
    #[must_use]
    pub fn from_page(page: SearchResultPage, response_time_ms: u64) -> Self {
        Self {
            total: page.total_estimate,
            page: page.page,
            limit: page.page_size,
            has_next: page.has_next,
            sources: page
            .sources
            .into_iter()
            .map(|s| SourceSummary {
                name: s.name,
                tier: s.tier,
                count: s.count,
                confidence_range: (s.confidence_min, s.confidence_max),
            })
            .collect(),
            performance: SearchPerformance { response_time_ms, cached: page.cache_hit },
            results: page.results,
        }
    }
}

/// One source's entry in `GET /sources/health`'s `indexers` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealthEntry {
    /// Whether the source currently passes the admissibility gate.
    pub healthy: bool,
    /// Human-readable status summary (last error, or "ok").
    pub message: String,
    /// The source's fallback tier.
    pub tier: Tier,
}

/// Aggregate health counters for `GET /sources/health`'s `summary`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthSummary {
    /// Total registered sources (enabled or not).
    pub total: usize,
    /// Sources currently passing the admissibility gate.
    pub healthy: usize,
    /// `healthy / total`, in `[0, 1]`; `0.0` when there are no sources.
    pub overall_health: f64,
}

/// `GET /sources/health` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesHealthResponse {
    /// Per-source health, keyed by source id.
    pub indexers: HashMap<String, SourceHealthEntry>,
    /// Aggregate counters.
    pub summary: HealthSummary,
}

/// `PATCH /sources/{id}` request body.
///
/// `check_interval_minutes` and `failure_threshold` are accepted for
/// forward compatibility but are not yet threaded through to
/// [`kuroibara_health::HealthMonitor`], which only exposes
/// `enable`/`disable` today; see `DESIGN.md`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchSourceRequest {
    /// Administrative enabled flag.
    pub enabled: Option<bool>,
    /// Requested re-probe interval, minutes. Not yet applied.
    pub check_interval_minutes: Option<u32>,
    /// Requested consecutive-failure threshold. Not yet applied.
    pub failure_threshold: Option<u32>,
}

/// `POST /downloads` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDownloadRequest {
    /// Which kind of client this job should route to.
    pub kind: JobKind,
    /// What to download.
    pub target: kuroibara_types::DownloadTarget,
}

/// Query parameters for `GET /downloads?state=&kind=&page=&limit=`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDownloadsQuery {
    /// Filter to jobs in this lifecycle state.
    pub state: Option<JobStatus>,
    /// Filter to jobs of this kind.
    pub kind: Option<JobKind>,
    /// 1-indexed page number; `0` and `1` both mean the first page.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Page size.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

const fn default_page() -> u32 {
    1
}

const fn default_limit() -> u32 {
    20
}

/// `GET /downloads` response body.
#[derive(Debug, Clone, Serialize)]
pub struct PagedDownloads {
    /// This page's jobs.
    pub items: Vec<DownloadJob>,
    /// The page returned (matches the request, clamped to `>= 1`).
    pub page: u32,
    /// The page size applied.
    pub limit: u32,
    /// Total jobs matching the filter, across all pages.
    pub total: usize,
}

/// Apply a [`ListDownloadsQuery`] filter and pagination over a full job
/// snapshot. Pure function so it is trivially testable without a running
/// scheduler.
#[must_use]
pub fn paginate_downloads(jobs: Vec<DownloadJob>, query: &ListDownloadsQuery) -> PagedDownloads {
    let filtered: Vec<DownloadJob> = jobs
    .into_iter()
    .filter(|j| query.state.is_none_or(|s| j.status == s))
    .filter(|j| query.kind.is_none_or(|k| j.kind == k))
    .collect();
    let total = filtered.len();
    let page = query.page.max(1);
    let limit = query.limit.max(1) as usize;
    let start = (page as usize - 1).saturating_mul(limit);
    let items = filtered.into_iter().skip(start).take(limit).collect();
    PagedDownloads { items, page, limit: limit as u32, total }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuroibara_types::DownloadTarget;

    fn job(id: &str, kind: JobKind, status: JobStatus) -> DownloadJob {
        DownloadJob {
            id: id.to_string(),
            kind,
            target: DownloadTarget::External { label: "x".to_string(), descriptor: "magnet:?x".to_string() },
            client_id: None,
            status,
            bytes_total: 0,
            bytes_done: 0,
            started_at_ms: None,
            updated_at_ms: 0,
            completed_at_ms: None,
            attempts: 0,
            last_error: None,
        }
    }

    #[test]
    fn filters_by_kind_and_state_then_paginates() {
        let jobs = vec![
            job("a", JobKind::Direct, JobStatus::Active),
            job("b", JobKind::Torrent, JobStatus::Active),
            job("c", JobKind::Direct, JobStatus::Completed),
            job("d", JobKind::Direct, JobStatus::Active),
        ];
        let query = ListDownloadsQuery {
            state: Some(JobStatus::Active),
            kind: Some(JobKind::Direct),
            page: 1,
            limit: 1,
        };
        let page = paginate_downloads(jobs, &query);
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "a");
    }
}
