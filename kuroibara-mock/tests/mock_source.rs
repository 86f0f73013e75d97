use kuroibara_core::source::{DetailsProvider, PagesProvider, SearchProvider};
use kuroibara_mock::MockSourceBuilder;
use kuroibara_types::{Capability, SearchFilter, SearchRequest};

fn request(query: &str) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        page: 1,
        page_size: 20,
        filter: SearchFilter::default(),
        priority: 1,
        caller_id: "test".to_string(),
    }
}

#[tokio::test]
async fn default_search_returns_the_sample_entry() {
    let source = MockSourceBuilder::new("mangasource").build();
    let provider = source.as_search_provider().expect("search capability declared by default");
    let page = provider.search(&request("iron blossom")).await.unwrap();
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].title, "Iron Blossom");
}

#[tokio::test]
async fn fail_query_triggers_the_default_sentinel_error() {
    let source = MockSourceBuilder::new("mangasource").build();
    let provider = source.as_search_provider().unwrap();
    let err = provider.search(&request("FAIL")).await.unwrap_err();
    assert_eq!(err.kind(), "transport");
}

#[tokio::test]
async fn custom_details_fn_overrides_the_default_fixture() {
    let source = MockSourceBuilder::new("mangasource")
        .with_details_fn(|native_id| Ok(kuroibara_mock::fixtures::sample_entry("mangasource", native_id)))
        .build();
    let provider = source.as_details_provider().unwrap();
    let entry = provider.details("custom-id").await.unwrap();
    assert_eq!(entry.id, "mangasource:custom-id");
}

#[tokio::test]
async fn restricted_capabilities_are_not_advertised() {
    let source = MockSourceBuilder::new("mangasource")
        .capabilities([Capability::Search])
        .build();
    assert!(source.as_search_provider().is_some());
    assert!(source.as_pages_provider().is_none());
}

#[tokio::test]
async fn pages_default_fixture_returns_four_distinct_urls() {
    let source = MockSourceBuilder::new("mangasource").build();
    let provider = source.as_pages_provider().unwrap();
    let pages = provider.pages("iron-blossom-ch1").await.unwrap();
    assert_eq!(pages.len(), 4);
}
