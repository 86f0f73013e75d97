//! Shared data-transfer objects, configuration, and the unified error type
//! for the Kuroibara provider-orchestration workspace.
#![warn(missing_docs)]

mod capability;
mod chapter;
mod config;
mod download;
mod entry;
mod error;
mod key;
pub mod middleware;
mod proxy_config;
mod rate_config;
mod search;
mod source;
mod status;

pub use capability::{Capability, CapabilitySet};
pub use chapter::ChapterRef;
pub use config::{DownloadConcurrency, KuroibaraConfig};
pub use download::{DownloadJob, DownloadTarget, JobError, JobKind, JobStatus};
pub use entry::{Author, EntryStatus, EntryType, SourceOrigin, UniversalEntry};
pub use error::KuroibaraError;
pub use key::SourceKey;
pub use proxy_config::{ProxyConfig, ProxyEntry, ProxyHealth, ProxyKind, ProxySelectionStrategy};
pub use rate_config::RateConfig;
pub use search::{
    SearchFilter, SearchRequest, SearchResultPage, SourceAttribution, SourceFailure,
    normalize_title,
};
pub use source::{AdapterKind, SourceDescriptor, Tier};
pub use status::{HealthState, LastError, SourceStatus};
