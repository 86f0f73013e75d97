use std::sync::Arc;

use httpmock::MockServer;
use kuroibara_core::source::{DetailsProvider, PagesProvider, SearchProvider, Source};
use kuroibara_registry::config::{ExtractionConfig, SelectorMap, SourceConfigFile, UrlTemplates};
use kuroibara_registry::GenericAdapter;
use kuroibara_types::{AdapterKind, Capability, CapabilitySet, SearchRequest, SearchFilter, SourceDescriptor, Tier};

const SEARCH_PAGE: &str = r#"
<html><body>
    <div class="result">
        <h3 class="title">One Piece</h3>
        <a class="title" href="op-1">detail</a>
        <img class="cover" src="/covers/op.jpg">
    </div>
    <div class="result">
        <h3 class="title">Naruto</h3>
        <a class="title" href="nar-1">detail</a>
        <span class="nsfw-badge">18+</span>
    </div>
</body></html>
"#;

fn request(query: &str) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        page: 1,
        page_size: 20,
        filter: SearchFilter::default(),
        priority: 5,
        caller_id: "test".to_string(),
    }
}

fn config_for(base_origin: String) -> SourceConfigFile {
    SourceConfigFile {
        id: "generic-test".to_string(),
        name: "Generic Test".to_string(),
        base_origin,
        tier: Tier::Primary,
        capabilities: vec![Capability::Search, Capability::Details, Capability::Pages],
        adapter_kind: AdapterKind::Generic,
        priority: 0,
        supports_nsfw: true,
        requires_solver: false,
        custom_factory: None,
        url_templates: UrlTemplates {
            search: Some("/search?q={query}&page={page}".to_string()),
            details: Some("/title/{native_id}".to_string()),
            chapters: None,
            pages: Some("/pages/{native_id}".to_string()),
        },
        extraction: Some(ExtractionConfig::Html(SelectorMap {
            search_items: "div.result".to_string(),
            title: vec!["h3.title".to_string()],
            link: vec!["a.title::attr(href)".to_string()],
            cover: vec!["img.cover::attr(src)".to_string()],
            description: Vec::new(),
            nsfw_indicator: vec![".nsfw-badge".to_string()],
            ratings: Vec::new(),
            chapters: Vec::new(),
            pages: vec!["img.page::attr(src)".to_string()],
        })),
        headers: Default::default(),
        rate: None,
        proxy: Default::default(),
    }
}

fn descriptor_for(config: &SourceConfigFile) -> Arc<SourceDescriptor> {
    Arc::new(SourceDescriptor {
        id: config.id.clone(),
        name: config.name.clone(),
        base_origin: config.base_origin.clone(),
        tier: config.tier,
        capabilities: CapabilitySet::new(config.capabilities.iter().copied()),
        adapter_kind: config.adapter_kind,
        priority: config.priority,
        supports_nsfw: config.supports_nsfw,
        requires_solver: config.requires_solver,
        config: None,
    })
}

#[tokio::test]
async fn search_extracts_title_link_cover_and_nsfw_indicator() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/search").query_param("q", "one piece");
        then.status(200).body(SEARCH_PAGE);
    });

    let config = config_for(server.base_url());
    let descriptor = descriptor_for(&config);
    let adapter = GenericAdapter::new(descriptor, &config).unwrap();
    let provider = adapter.as_search_provider().unwrap();

    let page = provider.search(&request("one piece")).await.unwrap();
    mock.assert();

    assert_eq!(page.results.len(), 2);
    let one_piece = page.results.iter().find(|e| e.title == "One Piece").unwrap();
    assert_eq!(one_piece.source_origins[0].source_native_id, "op-1");
    assert_eq!(one_piece.cover_url.as_deref(), Some("/covers/op.jpg"));
    assert!(!one_piece.nsfw);

    let naruto = page.results.iter().find(|e| e.title == "Naruto").unwrap();
    assert!(naruto.nsfw);
}

#[tokio::test]
async fn details_resolves_against_base_origin_and_fills_a_single_entry() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/title/op-1");
        then.status(200).body(r#"<html><body><h3 class="title">One Piece</h3></body></html>"#);
    });

    let config = config_for(server.base_url());
    let descriptor = descriptor_for(&config);
    let adapter = GenericAdapter::new(descriptor, &config).unwrap();
    let provider = adapter.as_details_provider().unwrap();

    let entry = provider.details("op-1").await.unwrap();
    assert_eq!(entry.title, "One Piece");
    assert_eq!(entry.source_origins[0].source_native_id, "op-1");
}

#[tokio::test]
async fn a_cloudflare_style_challenge_page_is_reported_as_a_bot_challenge() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/search");
        then.status(403).body("Checking your browser before accessing this site.");
    });

    let config = config_for(server.base_url());
    let descriptor = descriptor_for(&config);
    let adapter = GenericAdapter::new(descriptor, &config).unwrap();
    let provider = adapter.as_search_provider().unwrap();

    let err = provider.search(&request("anything")).await.unwrap_err();
    assert_eq!(err.kind(), "bot_challenge");
}

#[tokio::test]
async fn pages_are_resolved_to_absolute_urls_against_base_origin() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/pages/ch-1");
        then.status(200).body(
            r#"<html><body>
                <img class="page" src="/cdn/1.jpg">
                <img class="page" src="https://cdn.example/2.jpg">
            </body></html>"#,
        );
    });

    let config = config_for(server.base_url());
    let descriptor = descriptor_for(&config);
    let adapter = GenericAdapter::new(descriptor, &config).unwrap();
    let provider = adapter.as_pages_provider().unwrap();

    let pages = provider.pages("ch-1").await.unwrap();
    assert_eq!(pages[0], format!("{}/cdn/1.jpg", server.base_url()));
    assert_eq!(pages[1], "https://cdn.example/2.jpg");
}
