use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kuroibara_proxy::{CanaryProbe, ProxyOutcome, ProxyPool};
use kuroibara_types::{KuroibaraError, ProxyConfig, ProxyEntry, ProxyKind, ProxySelectionStrategy};

struct AlwaysHealthy;

#[async_trait]
impl CanaryProbe for AlwaysHealthy {
    async fn probe(&self, _entry: &ProxyEntry) -> Result<Duration, KuroibaraError> {
        Ok(Duration::from_millis(20))
    }
}

struct AlwaysFailing;

#[async_trait]
impl CanaryProbe for AlwaysFailing {
    async fn probe(&self, _entry: &ProxyEntry) -> Result<Duration, KuroibaraError> {
        Err(KuroibaraError::transport("test-proxy", "canary unreachable"))
    }
}

fn entries(n: usize) -> Vec<ProxyEntry> {
    (0..n)
        .map(|i| ProxyEntry {
            id: format!("proxy-{i}"),
            endpoint: format!("proxy{i}.example:8080"),
            kind: ProxyKind::Http,
            credentials: None,
        })
        .collect()
}

#[tokio::test]
async fn direct_only_source_returns_none() {
    let pool = ProxyPool::new(Arc::new(AlwaysHealthy));
    pool.register_source("mangasource", ProxyConfig::default()).await;
    assert!(pool.get_proxy("mangasource").await.unwrap().is_none());
}

#[tokio::test]
async fn unregistered_source_returns_none() {
    let pool = ProxyPool::new(Arc::new(AlwaysHealthy));
    assert!(pool.get_proxy("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn round_robin_cycles_through_all_entries() {
    let pool = ProxyPool::new(Arc::new(AlwaysHealthy));
    pool.register_source(
        "mangasource",
        ProxyConfig {
            entries: entries(3),
            strategy: ProxySelectionStrategy::RoundRobin,
        },
    )
    .await;

    let mut seen = std::collections::HashSet::new();
    for _ in 0..3 {
        let proxy = pool.get_proxy("mangasource").await.unwrap().unwrap();
        seen.insert(proxy.id);
    }
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn two_consecutive_degradations_mark_dead_and_excluded() {
    let pool = ProxyPool::new(Arc::new(AlwaysHealthy));
    pool.register_source(
        "mangasource",
        ProxyConfig {
            entries: entries(1),
            strategy: ProxySelectionStrategy::RoundRobin,
        },
    )
    .await;

    pool.report_proxy_outcome(
        "mangasource",
        "proxy-0",
        ProxyOutcome {
            success: false,
            latency: None,
        },
    )
    .await;
    pool.report_proxy_outcome(
        "mangasource",
        "proxy-0",
        ProxyOutcome {
            success: false,
            latency: None,
        },
    )
    .await;

    let err = pool.get_proxy("mangasource").await.unwrap_err();
    assert!(matches!(err, KuroibaraError::NoProxyAvailable { .. }));
}

#[tokio::test]
async fn failing_probes_eventually_mark_dead() {
    let pool = Arc::new(ProxyPool::new(Arc::new(AlwaysFailing)));
    pool.register_source(
        "mangasource",
        ProxyConfig {
            entries: entries(1),
            strategy: ProxySelectionStrategy::RoundRobin,
        },
    )
    .await;

    // Exercise the probe path directly rather than waiting on the 5-minute
    // background loop: three probe failures should mark the proxy dead.
    for _ in 0..3 {
        pool.probe_now("mangasource").await;
    }
    let err = pool.get_proxy("mangasource").await.unwrap_err();
    assert!(matches!(err, KuroibaraError::NoProxyAvailable { .. }));
}
