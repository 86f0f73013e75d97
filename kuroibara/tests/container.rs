//! Integration tests for the `Kuroibara` facade: construction from source
//! config files, search delegation, download submission, and health
//! reporting.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use kuroibara::{
    CustomFactory, DownloadJob, DownloadTarget, ImageFetcher, JobKind, Kuroibara, KuroibaraError,
    SearchFilter, SearchRequest, Source, SourceDescriptor,
};
use kuroibara_mock::MockSourceBuilder;

struct MockFactory;

impl CustomFactory for MockFactory {
    fn build(&self, descriptor: Arc<SourceDescriptor>) -> Result<Arc<dyn Source>, KuroibaraError> {
        Ok(MockSourceBuilder::new("kumo-scans").descriptor((*descriptor).clone()).build())
    }
}

struct StubImageFetcher;

#[async_trait]
impl ImageFetcher for StubImageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, KuroibaraError> {
        Ok(format!("/tmp/{}", url.rsplit('/').next().unwrap_or("page.jpg")))
    }
}

fn temp_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("kuroibara-facade-{label}-{}", std::process::id()))
}

fn write_mock_source_config(dir: &PathBuf) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("kumo-scans.json"),
        r#"{
            "id": "kumo-scans", "name": "Kumo Scans", "base_origin": "https://kumo.example",
            "tier": "Primary", "capabilities": ["Search", "Details", "Chapters", "Pages"],
            "adapter_kind": "Custom", "custom_factory": "MockFactory"
        }"#,
    )
    .unwrap();
}

async fn build_kuroibara(built_in: &PathBuf, community: &PathBuf) -> Kuroibara {
    Kuroibara::builder(built_in, community)
        .custom_factory("MockFactory", Arc::new(MockFactory))
        .image_fetcher(Arc::new(StubImageFetcher))
        .build()
        .await
        .expect("container should build with a valid mock source")
}

#[tokio::test]
async fn builds_and_reports_a_loaded_source() {
    let root = temp_dir("builds");
    let built_in = root.join("built_in");
    let community = root.join("community");
    write_mock_source_config(&built_in);

    let app = build_kuroibara(&built_in, &community).await;
    fs::remove_dir_all(&root).ok();

    assert!(app.config_errors().is_empty());
    let ids: Vec<_> = app.source_ids().map(|(id, reason)| (id.to_string(), reason.map(str::to_string))).collect();
    assert_eq!(ids, vec![("kumo-scans".to_string(), None)]);
}

#[tokio::test]
async fn rejects_empty_search_queries() {
    let root = temp_dir("empty-query");
    let built_in = root.join("built_in");
    let community = root.join("community");
    write_mock_source_config(&built_in);

    let app = build_kuroibara(&built_in, &community).await;
    fs::remove_dir_all(&root).ok();

    let request = SearchRequest {
        query: "   ".to_string(),
        page: 1,
        page_size: 20,
        filter: SearchFilter::default(),
        priority: 5,
        caller_id: "test".to_string(),
    };
    let err = app.search(&request).await.unwrap_err();
    assert!(matches!(err, KuroibaraError::InvalidArgument(_)));
}

#[tokio::test]
async fn search_delegates_to_the_registered_mock_source() {
    let root = temp_dir("search");
    let built_in = root.join("built_in");
    let community = root.join("community");
    write_mock_source_config(&built_in);

    let app = build_kuroibara(&built_in, &community).await;
    fs::remove_dir_all(&root).ok();

    // A freshly registered source starts `Unknown` and is not admissible
    // until its first probe completes; probe it directly rather than race
    // the background health loop's startup stagger.
    app.probe_source("kumo-scans").await;

    let request = SearchRequest {
        query: "Iron Blossom".to_string(),
        page: 1,
        page_size: 20,
        filter: SearchFilter::default(),
        priority: 5,
        caller_id: "test".to_string(),
    };
    let page = app.search(&request).await.unwrap();
    assert_eq!(page.page, 1);
}

#[tokio::test]
async fn submits_and_looks_up_a_download_job() {
    let root = temp_dir("download");
    let built_in = root.join("built_in");
    let community = root.join("community");
    write_mock_source_config(&built_in);

    let app = build_kuroibara(&built_in, &community).await;
    fs::remove_dir_all(&root).ok();

    let target = DownloadTarget::External {
        label: "Iron Blossom v1".to_string(),
        descriptor: "magnet:?xt=urn:btih:deadbeef".to_string(),
    };
    let job: DownloadJob = app.submit_download(JobKind::Torrent, target);
    assert!(!job.id.is_empty());

    let fetched = app.download_status(&job.id).expect("job should be retrievable by id");
    assert_eq!(fetched.id, job.id);

    let all = app.list_downloads();
    assert!(all.iter().any(|j| j.id == job.id));

    app.cancel_download(&job.id).await;
    let cancelled = app.download_status(&job.id).unwrap();
    assert_eq!(cancelled.status, kuroibara::JobStatus::Cancelled);
}

#[tokio::test]
async fn sources_health_counts_every_loaded_source() {
    let root = temp_dir("health");
    let built_in = root.join("built_in");
    let community = root.join("community");
    write_mock_source_config(&built_in);

    let app = build_kuroibara(&built_in, &community).await;
    fs::remove_dir_all(&root).ok();

    let health = app.sources_health();
    assert_eq!(health.summary.total, 1);
    assert!(health.indexers.contains_key("kumo-scans"));
}

#[tokio::test]
async fn refuses_to_build_without_an_image_fetcher() {
    let root = temp_dir("no-fetcher");
    let built_in = root.join("built_in");
    let community = root.join("community");
    write_mock_source_config(&built_in);

    let result = Kuroibara::builder(&built_in, &community)
        .custom_factory("MockFactory", Arc::new(MockFactory))
        .build()
        .await;
    fs::remove_dir_all(&root).ok();

    assert!(matches!(result, Err(KuroibaraError::InvalidArgument(_))));
}
