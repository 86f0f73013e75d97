//! Process-wide configuration shared across the orchestration components.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rate_config::RateConfig;

/// Fan-out bound within a single search tier, default 4.
const DEFAULT_SEARCH_FAN_OUT: u32 = 4;

/// Per-source-kind download worker pool sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadConcurrency {
    /// Concurrent direct-download workers.
    pub direct: u32,
    /// Concurrent torrent-job workers.
    pub torrent: u32,
    /// Concurrent NZB-job workers.
    pub nzb: u32,
}

impl Default for DownloadConcurrency {
    fn default() -> Self {
        Self {
            direct: 4,
            torrent: 2,
            nzb: 2,
        }
    }
}

/// Global process configuration for the Kuroibara orchestrator.
///
/// Deserialized from a JSON/TOML config file and overridable by
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KuroibaraConfig {
    /// Default per-source rate configuration used when a source's own
    /// configuration file entry does not override it.
    pub default_rate: RateConfig,
    /// Optional URL of the external Challenge Solver service.
    pub solver_url: Option<String>,
    /// Maximum concurrent sources consulted within one search tier.
    pub search_fan_out: u32,
    /// Soft per-source deadline for a single search call, 15s.
    pub search_soft_deadline: Duration,
    /// Result-page cache TTL, 5 minutes.
    pub search_cache_ttl: Duration,
    /// Result-page cache LRU capacity (page count, not entry count).
    pub search_cache_capacity: u64,
    /// Health Monitor worker pool size.
    pub health_worker_pool: u32,
    /// Health Monitor hard probe timeout, 30s.
    pub health_probe_timeout: Duration,
    /// Download worker pool sizes per job kind.
    pub download_concurrency: DownloadConcurrency,
    /// If true, startup fails (non-zero exit) when no sources load.
    pub strict_mode: bool,
}

impl Default for KuroibaraConfig {
    fn default() -> Self {
        Self {
            default_rate: RateConfig::default(),
            solver_url: None,
            search_fan_out: DEFAULT_SEARCH_FAN_OUT,
            search_soft_deadline: Duration::from_secs(15),
            search_cache_ttl: Duration::from_secs(300),
            search_cache_capacity: 512,
            health_worker_pool: 5,
            health_probe_timeout: Duration::from_secs(30),
            download_concurrency: DownloadConcurrency::default(),
            strict_mode: false,
        }
    }
}

impl KuroibaraConfig {
    /// Apply environment-variable overrides on top of file-loaded (or
    /// default) configuration. Unset variables leave the existing value
    /// untouched.
    #[must_use]
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("KUROIBARA_SOLVER_URL") {
            self.solver_url = Some(v);
        }
        if let Ok(v) = std::env::var("KUROIBARA_SEARCH_FAN_OUT") {
            if let Ok(n) = v.parse() {
                self.search_fan_out = n;
            }
        }
        if let Ok(v) = std::env::var("KUROIBARA_STRICT_MODE") {
            self.strict_mode = matches!(v.as_str(), "1" | "true" | "yes");
        }
        self
    }
}
