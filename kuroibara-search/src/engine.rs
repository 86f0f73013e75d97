//! The Tiered Search Engine: admission filtering, bounded per-tier
//! fan-out, cross-source fusion, ranking, pagination, and a short-lived
//! result-page cache.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use kuroibara_core::source::Source;
use kuroibara_middleware::Admissibility;
use kuroibara_types::{
    Capability, KuroibaraError, SearchRequest, SearchResultPage, SourceAttribution,
    SourceDescriptor, SourceFailure, Tier, UniversalEntry,
};
use moka::future::Cache;

use crate::fusion::{fuse, rank};

/// Default bound on concurrently in-flight searches within one tier.
const DEFAULT_FAN_OUT: usize = 4;
/// Soft per-source deadline applied to every `Search` call.
const SOFT_DEADLINE: Duration = Duration::from_secs(15);
/// Result-page cache TTL.
const CACHE_TTL: Duration = Duration::from_secs(300);
/// Result-page cache LRU bound,
/// matching `KuroibaraConfig::search_cache_capacity`'s default.
const CACHE_CAPACITY: u64 = 512;

#[derive(Clone)]
struct RegisteredSource {
    descriptor: Arc<SourceDescriptor>,
    source: Arc<dyn Source>,
}

/// Consults registered sources in tiers, fuses and ranks the results, and
/// caches the resulting page.
pub struct SearchEngine {
    sources: RwLock<HashMap<String, RegisteredSource>>,
    admissibility: Arc<dyn Admissibility>,
    cache: Cache<String, SearchResultPage>,
    fan_out: usize,
}

impl SearchEngine {
    /// Build an engine gating admission through `admissibility` (typically
    /// a `kuroibara-health` `HealthMonitor`).
    #[must_use]
    pub fn new(admissibility: Arc<dyn Admissibility>) -> Self {
        Self::with_fan_out(admissibility, DEFAULT_FAN_OUT)
    }

    /// As [`Self::new`], overriding the per-tier concurrent fan-out.
    #[must_use]
    pub fn with_fan_out(admissibility: Arc<dyn Admissibility>, fan_out: usize) -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            admissibility,
            cache: Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build(),
            fan_out: fan_out.max(1),
        }
    }

    /// Register (or replace) a source the engine may consult. `source`
    /// should already be wrapped with the desired middleware stack (rate
    /// limiting, proxy selection, health gating).
    pub fn register_source(&self, descriptor: Arc<SourceDescriptor>, source: Arc<dyn Source>) {
        self.sources
        .write()
        .unwrap()
        .insert(descriptor.id.clone(), RegisteredSource { descriptor, source });
    }

    /// Drop the cached page for `cache_key`, forcing the next matching
    /// request to re-consult sources. Exposed for manual, single-query
    /// refresh.
    pub async fn invalidate(&self, cache_key: &str) {
        self.cache.invalidate(cache_key).await;
    }

    /// Drop every cached result page. A recovered source may newly
    /// contribute to pages that were cached while it was down, so the
    /// whole cache is cleared rather than tracking which keys it touched.
    /// Lazily applied: entries are evicted on next access, not immediately.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    fn admitted_sources(&self, request: &SearchRequest) -> Vec<RegisteredSource> {
        let sources = self.sources.read().unwrap();
        let mut admitted: Vec<RegisteredSource> = sources
        .values()
        .filter(|s| s.descriptor.supports(Capability::Search))
        .filter(|s| self.admissibility.is_admissible(&s.descriptor.id))
        .filter(|s| {
            request.filter.tiers.is_empty() || request.filter.tiers.contains(&s.descriptor.tier)
        })
        .cloned()
        .collect();
        admitted.sort_by_key(|s| s.descriptor.priority);
        admitted
    }

    /// Execute a tiered, fused, cached search.
    ///
    /// # Errors
    /// Returns [`KuroibaraError::AllSourcesFailed`] when every consulted
    /// source failed and no source returned any usable result.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, KuroibaraError> {
        let cache_key = request.cache_key();
        if let Some(mut cached) = self.cache.get(&cache_key).await {
            cached.cache_hit = true;
            return Ok(cached);
        }

        let admitted = self.admitted_sources(request);
        let target = f64::from(request.page) * f64::from(request.page_size) * 1.5;

        let mut tiered_entries: Vec<(Tier, UniversalEntry)> = Vec::new();
        let mut failures: Vec<SourceFailure> = Vec::new();
        let mut latencies: Vec<(String, u64)> = Vec::new();
        let mut primary_failed = false;

        for tier in [Tier::Primary, Tier::Secondary, Tier::Tertiary] {
            let tier_sources: Vec<RegisteredSource> = admitted
            .iter()
            .filter(|s| s.descriptor.tier == tier)
            .cloned()
            .collect();

            if !tier_sources.is_empty() {
                let results = stream::iter(tier_sources)
                .map(|entry| search_one(entry, request))
                .buffer_unordered(self.fan_out)
                .collect::<Vec<_>>()
                .await;

                for (source_id, outcome) in results {
                    match outcome {
                        Ok((entries, latency_ms)) => {
                            latencies.push((source_id.clone(), latency_ms));
                            tiered_entries.extend(entries.into_iter().map(|e| (tier, e)));
                        }
                        Err(err) => {
                            if tier == Tier::Primary {
                                primary_failed = true;
                            }
                            failures.push(SourceFailure {
                                source_id,
                                kind: err.kind().to_string(),
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }

            if tier != Tier::Tertiary {
                let accumulated = tiered_entries.len() as f64;
                if accumulated >= target && !primary_failed {
                    break;
                }
            }
        }

        let mut fused = fuse(tiered_entries, &request.query);
        if !request.filter.allow_nsfw {
            fused.retain(|e| !e.nsfw);
        }
        rank(&mut fused);

        if fused.is_empty() && !failures.is_empty() {
            return Err(KuroibaraError::AllSourcesFailed(
                failures
                .into_iter()
                .map(|f| KuroibaraError::Transport {
                    source: f.source_id,
                    message: f.message,
                })
                .collect(),
            ));
        }

        let total_estimate = fused.len();
        let page_size = request.page_size.max(1) as usize;
        let start = request.page.saturating_sub(1) as usize * page_size;
        let end = (start + page_size).min(fused.len());
        let page_entries: Vec<UniversalEntry> = if start < fused.len() {
            fused[start..end].to_vec()
        } else {
            Vec::new()
        };
        let has_next = end < fused.len();

        let sources_attr = attribution(&page_entries, &self.sources.read().unwrap());

        let page = SearchResultPage {
            results: page_entries,
            total_estimate,
            page: request.page,
            page_size: request.page_size,
            has_next,
            sources: sources_attr,
            failures,
            cache_hit: false,
            source_latencies_ms: latencies,
        };

        self.cache.insert(cache_key, page.clone()).await;
        Ok(page)
    }
}

impl kuroibara_health::RecoveryObserver for SearchEngine {
    fn on_recovered(&self, _source_id: &str) {
        self.invalidate_all();
    }
}

fn attribution(
    entries: &[UniversalEntry],
    sources: &HashMap<String, RegisteredSource>,
) -> Vec<SourceAttribution> {
    let mut by_source: HashMap<String, (usize, f64, f64)> = HashMap::new();
    for entry in entries {
        for origin in &entry.source_origins {
            let stats = by_source
            .entry(origin.source_id.clone())
            .or_insert((0, f64::MAX, f64::MIN));
            stats.0 += 1;
            stats.1 = stats.1.min(origin.confidence);
            stats.2 = stats.2.max(origin.confidence);
        }
    }
    by_source
    .into_iter()
    .filter_map(|(source_id, (count, min_conf, max_conf))| {
        let descriptor = &sources.get(&source_id)?.descriptor;
        Some(SourceAttribution {
            name: descriptor.name.clone(),
            tier: descriptor.tier,
            count,
            confidence_min: min_conf,
            confidence_max: max_conf,
        })
    })
    .collect()
}

async fn search_one(
    entry: RegisteredSource,
    request: &SearchRequest,
) -> (String, Result<(Vec<UniversalEntry>, u64), KuroibaraError>) {
    let source_id = entry.descriptor.id.clone();
    let Some(provider) = entry.source.as_search_provider() else {
        return (
            source_id.clone(),
            Err(KuroibaraError::Unsupported {
                capability: "search".to_string(),
            }),
        );
    };

    let started = Instant::now();
    let outcome = match tokio::time::timeout(SOFT_DEADLINE, provider.search(request)).await {
        Ok(Ok(page)) => Ok((page.results, started.elapsed().as_millis() as u64)),
        Ok(Err(err)) => Err(err),
        Err(_elapsed) => Err(KuroibaraError::Deadline {
            source: source_id.clone(),
            operation: "search".to_string(),
        }),
    };
    (source_id, outcome)
}
