use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kuroibara_core::source::SearchProvider;
use kuroibara_middleware::{Admissibility, SourceBuilder};
use kuroibara_mock::MockSourceBuilder;
use kuroibara_proxy::{CanaryProbe, ProxyPool};
use kuroibara_rate::RateController;
use kuroibara_types::{KuroibaraError, ProxyEntry, RateConfig, SearchFilter, SearchRequest};

struct AlwaysUp;

impl Admissibility for AlwaysUp {
    fn is_admissible(&self, _source_id: &str) -> bool {
        true
    }
}

struct AlwaysDown;

impl Admissibility for AlwaysDown {
    fn is_admissible(&self, _source_id: &str) -> bool {
        false
    }
}

struct NeverCalled;

#[async_trait]
impl CanaryProbe for NeverCalled {
    async fn probe(&self, _entry: &ProxyEntry) -> Result<Duration, KuroibaraError> {
        unreachable!("direct-only source should never probe")
    }
}

fn request() -> SearchRequest {
    SearchRequest {
        query: "iron blossom".to_string(),
        page: 1,
        page_size: 20,
        filter: SearchFilter::default(),
        priority: 1,
        caller_id: "test".to_string(),
    }
}

#[tokio::test]
async fn fully_composed_stack_delegates_through_to_the_raw_source() {
    let mock = MockSourceBuilder::new("mangasource").build();
    let controller = Arc::new(RateController::new());
    controller
        .register_source("mangasource", RateConfig::default())
        .await;
    let pool = Arc::new(ProxyPool::new(Arc::new(NeverCalled)));

    let built = SourceBuilder::new(mock)
        .with_health_gate(Arc::new(AlwaysUp))
        .with_proxy(Arc::clone(&pool))
        .with_rate_limit(controller, Duration::from_secs(5))
        .build()
        .unwrap();

    let provider = built.as_search_provider().expect("mock advertises search");
    let page = provider.search(&request()).await.unwrap();
    assert_eq!(page.results[0].title, "Iron Blossom");
}

#[tokio::test]
async fn health_gate_fails_fast_before_reaching_the_raw_source() {
    let mock = MockSourceBuilder::new("mangasource").build();
    let built = SourceBuilder::new(mock)
        .with_health_gate(Arc::new(AlwaysDown))
        .build()
        .unwrap();

    let provider = built.as_search_provider().unwrap();
    let err = provider.search(&request()).await.unwrap_err();
    assert_eq!(err.kind(), "provider_down");
}

#[tokio::test]
async fn direct_only_proxy_pool_never_invokes_the_canary_probe() {
    let mock = MockSourceBuilder::new("mangasource").build();
    let pool = Arc::new(ProxyPool::new(Arc::new(NeverCalled)));

    let built = SourceBuilder::new(mock).with_proxy(pool).build().unwrap();
    let provider = built.as_search_provider().unwrap();
    let page = provider.search(&request()).await.unwrap();
    assert_eq!(page.results.len(), 1);
}
