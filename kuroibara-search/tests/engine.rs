use std::collections::HashSet;
use std::sync::Arc;

use kuroibara_middleware::Admissibility;
use kuroibara_mock::MockSourceBuilder;
use kuroibara_search::SearchEngine;
use kuroibara_types::{
    AdapterKind, Capability, CapabilitySet, EntryStatus, EntryType, KuroibaraError, SearchFilter,
    SearchRequest, SearchResultPage, SourceAttribution, SourceDescriptor, SourceOrigin, Tier,
    UniversalEntry,
};

struct AllAdmissible;
impl Admissibility for AllAdmissible {
    fn is_admissible(&self, _source_id: &str) -> bool {
        true
    }
}

struct Allow(HashSet<&'static str>);
impl Admissibility for Allow {
    fn is_admissible(&self, source_id: &str) -> bool {
        self.0.contains(source_id)
    }
}

fn request(query: &str, page: u32, page_size: u32) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        page,
        page_size,
        filter: SearchFilter::default(),
        priority: 0,
        caller_id: "test".to_string(),
    }
}

fn descriptor(id: &str, tier: Tier) -> SourceDescriptor {
    SourceDescriptor {
        id: id.to_string(),
        name: id.to_string(),
        base_origin: format!("https://{id}.example"),
        tier,
        capabilities: CapabilitySet::new([Capability::Search]),
        adapter_kind: AdapterKind::Custom,
        priority: 0,
        supports_nsfw: false,
        requires_solver: false,
        config: None,
    }
}

fn page_of(entries: Vec<UniversalEntry>, source_id: &str, tier: Tier) -> SearchResultPage {
    SearchResultPage {
        total_estimate: entries.len(),
        page: 1,
        page_size: entries.len().max(1) as u32,
        has_next: false,
        sources: vec![SourceAttribution {
            name: source_id.to_string(),
            tier,
            count: entries.len(),
            confidence_min: 0.0,
            confidence_max: 0.0,
        }],
        failures: Vec::new(),
        cache_hit: false,
        source_latencies_ms: vec![(source_id.to_string(), 1)],
        results: entries,
    }
}

fn entry(title: &str, year: i32, source_id: &str, nsfw: bool) -> UniversalEntry {
    UniversalEntry {
        id: format!("{source_id}:{title}"),
        title: title.to_string(),
        alternative_titles: Default::default(),
        description: Some("desc".to_string()),
        cover_url: Some("https://example/cover.jpg".to_string()),
        entry_type: EntryType::Manga,
        status: EntryStatus::Ongoing,
        year: Some(year),
        nsfw,
        genres: Default::default(),
        authors: Vec::new(),
        rating: None,
        popularity_rank: None,
        source_origins: vec![SourceOrigin {
            source_id: source_id.to_string(),
            source_native_id: title.to_string(),
            confidence: 1.0,
            nsfw,
        }],
        data_completeness: 0.0,
    }
}

#[tokio::test]
async fn single_admitted_source_returns_its_default_fixture() {
    let engine = SearchEngine::new(Arc::new(AllAdmissible));
    let source = MockSourceBuilder::new("mangadex").build();
    engine.register_source(source.descriptor(), source);

    let page = engine.search(&request("iron blossom", 1, 10)).await.unwrap();
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].title, "Iron Blossom");
    assert!(!page.cache_hit);
}

#[tokio::test]
async fn inadmissible_sources_are_never_consulted() {
    let engine = SearchEngine::new(Arc::new(Allow(HashSet::from(["up"]))));

    let up = MockSourceBuilder::new("up").build();
    engine.register_source(up.descriptor(), up);

    let down = MockSourceBuilder::new("down")
        .with_search_fn(|_| unreachable!("inadmissible source must not be queried"))
        .build();
    engine.register_source(down.descriptor(), down);

    let page = engine.search(&request("iron blossom", 1, 10)).await.unwrap();
    assert_eq!(page.sources.len(), 1);
    assert_eq!(page.sources[0].name, "up");
}

#[tokio::test]
async fn secondary_tier_is_skipped_once_the_primary_tier_meets_the_target() {
    let engine = SearchEngine::new(Arc::new(AllAdmissible));

    let d1 = descriptor("primary-a", Tier::Primary);
    let source = MockSourceBuilder::new("primary-a")
        .descriptor(d1.clone())
        .with_search_fn(|_| {
            Ok(page_of(
                vec![entry("Alpha", 2001, "primary-a", false), entry("Beta", 2002, "primary-a", false)],
                "primary-a",
                Tier::Primary,
            ))
        })
        .build();
    engine.register_source(Arc::new(d1), source);

    let d2 = descriptor("secondary-a", Tier::Secondary);
    let secondary = MockSourceBuilder::new("secondary-a")
        .descriptor(d2.clone())
        .with_search_fn(|_| unreachable!("secondary tier must not run once the target is met"))
        .build();
    engine.register_source(Arc::new(d2), secondary);

    // page=1, page_size=1 => target = 1.5, two primary entries clear it.
    let page = engine.search(&request("alpha", 1, 1)).await.unwrap();
    assert!(page.sources.iter().all(|s| s.name != "secondary-a"));
}

#[tokio::test]
async fn a_primary_tier_failure_forces_continuation_into_the_secondary_tier() {
    let engine = SearchEngine::new(Arc::new(AllAdmissible));

    let d_ok = descriptor("primary-ok", Tier::Primary);
    let primary_ok = MockSourceBuilder::new("primary-ok")
        .descriptor(d_ok.clone())
        .with_search_fn(|_| {
            Ok(page_of(
                vec![entry("Alpha", 2001, "primary-ok", false), entry("Beta", 2002, "primary-ok", false)],
                "primary-ok",
                Tier::Primary,
            ))
        })
        .build();
    engine.register_source(Arc::new(d_ok), primary_ok);

    let d_bad = descriptor("primary-bad", Tier::Primary);
    let primary_bad = MockSourceBuilder::new("primary-bad")
        .descriptor(d_bad.clone())
        .with_search_fn(|_| Err(KuroibaraError::transport("primary-bad", "boom")))
        .build();
    engine.register_source(Arc::new(d_bad), primary_bad);

    let d_sec = descriptor("secondary-ok", Tier::Secondary);
    let secondary_ok = MockSourceBuilder::new("secondary-ok")
        .descriptor(d_sec.clone())
        .with_search_fn(|_| Ok(page_of(vec![entry("Gamma", 2003, "secondary-ok", false)], "secondary-ok", Tier::Secondary)))
        .build();
    engine.register_source(Arc::new(d_sec), secondary_ok);

    let page = engine.search(&request("alpha", 1, 1)).await.unwrap();
    assert!(page.failures.iter().any(|f| f.source_id == "primary-bad"));
    assert!(page.sources.iter().any(|s| s.name == "secondary-ok"));
}

#[tokio::test]
async fn identical_title_and_year_from_two_sources_fuse_into_one_entry() {
    let engine = SearchEngine::new(Arc::new(AllAdmissible));

    for id in ["src-a", "src-b"] {
        let d = descriptor(id, Tier::Primary);
        let source = MockSourceBuilder::new(id)
            .descriptor(d.clone())
            .with_search_fn(move |_| Ok(page_of(vec![entry("Iron Blossom", 2019, id, false)], id, Tier::Primary)))
            .build();
        engine.register_source(Arc::new(d), source);
    }

    let page = engine.search(&request("iron blossom", 1, 10)).await.unwrap();
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].source_origins.len(), 2);
}

#[tokio::test]
async fn nsfw_entries_are_dropped_unless_the_filter_allows_them() {
    let engine = SearchEngine::new(Arc::new(AllAdmissible));
    let d = descriptor("spicy", Tier::Primary);
    let source = MockSourceBuilder::new("spicy")
        .descriptor(d.clone())
        .with_search_fn(|_| Ok(page_of(vec![entry("Adult Title", 2020, "spicy", true)], "spicy", Tier::Primary)))
        .build();
    engine.register_source(Arc::new(d), source);

    let page = engine.search(&request("adult title", 1, 10)).await.unwrap();
    assert!(page.results.is_empty());

    let mut allowed = request("adult title", 1, 10);
    allowed.filter.allow_nsfw = true;
    let page = engine.search(&allowed).await.unwrap();
    assert_eq!(page.results.len(), 1);
}

#[tokio::test]
async fn a_search_result_page_is_served_from_cache_on_a_repeat_request() {
    let engine = SearchEngine::new(Arc::new(AllAdmissible));
    let source = MockSourceBuilder::new("mangadex").build();
    engine.register_source(source.descriptor(), source);

    let req = request("iron blossom", 1, 10);
    let first = engine.search(&req).await.unwrap();
    assert!(!first.cache_hit);
    let second = engine.search(&req).await.unwrap();
    assert!(second.cache_hit);
}

#[tokio::test]
async fn all_sources_failing_yields_an_aggregate_error() {
    let engine = SearchEngine::new(Arc::new(AllAdmissible));
    let source = MockSourceBuilder::new("mangadex").build();
    engine.register_source(source.descriptor(), source);

    let err = engine.search(&request("FAIL", 1, 10)).await.unwrap_err();
    assert_eq!(err.kind(), "all_sources_failed");
}
