//! Kuroibara orchestrates manga/manhwa/manhua search and download across
//! many pluggable provider Sources.
//!
//! Overview
//! - Loads Sources from built-in and community-supplied config files and
//! resolves each to a raw adapter.
//! - Wraps every raw adapter in a middleware onion (health gate, proxy,
//! challenge solver, rate limit) via `kuroibara-middleware`.
//! - Fans a search out across admissible Sources, fuses and ranks the
//! results, and caches the fused page (`kuroibara-search`).
//! - Schedules Direct/Torrent/Nzb download jobs against the matching
//! provider or an external client (`kuroibara-download`).
//! - Probes every Source on a timer and exposes its health for admission
//! decisions and diagnostics (`kuroibara-health`).
//!
//! Key behaviors and trade-offs
//! - Health gating: a Source failing its admissibility check is excluded
//! from search fan-out and download submission but keeps being probed,
//! so it can recover without a restart.
//! - Search fan-out is bounded (`search_fan_out`), trading completeness
//! for bounded latency under a soft deadline.
//! - Rate limiting is per-source and queue-based rather than a blunt
//! global limiter, so one slow Source can't starve the others.
//!
//! Examples
//! - Building a container and running a search: see `./examples/search.rs`.
//! - Submitting a download job: see `./examples/download.rs`.
#![warn(missing_docs)]

pub mod api;
mod container;

pub use container::{Kuroibara, KuroibaraBuilder, load_config};

pub use kuroibara_core::source::{
    ChaptersProvider, DetailsProvider, PagesProvider, ProbeProvider, SearchProvider, Source,
};
pub use kuroibara_download::{DownloadClient, ImageFetcher, PostProcessor};
pub use kuroibara_middleware::{Admissibility, ChallengeSolver};
pub use kuroibara_proxy::CanaryProbe;
pub use kuroibara_registry::factory::CustomFactory;

pub use kuroibara_types::{
    AdapterKind, Author, Capability, CapabilitySet, ChapterRef, DownloadConcurrency, DownloadJob,
    DownloadTarget, EntryStatus, EntryType, HealthState, JobError, JobKind, JobStatus,
    KuroibaraConfig, KuroibaraError, LastError, ProxyConfig, ProxyEntry, ProxyHealth, ProxyKind,
    ProxySelectionStrategy, RateConfig, SearchFilter, SearchRequest, SearchResultPage,
    SourceAttribution, SourceDescriptor, SourceFailure, SourceOrigin, SourceStatus, Tier,
    UniversalEntry,
};

/// Install a `tracing` subscriber reading its filter from `RUST_LOG`
/// (falling back to `info`), for binaries embedding [`Kuroibara`] that
/// don't already manage their own subscriber.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
