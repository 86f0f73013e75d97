//! Build a `Kuroibara` container around a single in-memory mock source and
//! run a search through it.
//!
//! Run with: `cargo run -p kuroibara --example search`

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use kuroibara::{
    CustomFactory, ImageFetcher, Kuroibara, KuroibaraError, SearchFilter, SearchRequest, Source,
    SourceDescriptor,
};
use kuroibara_mock::MockSourceBuilder;

struct DemoFactory;

impl CustomFactory for DemoFactory {
    fn build(&self, descriptor: Arc<SourceDescriptor>) -> Result<Arc<dyn Source>, KuroibaraError> {
        Ok(MockSourceBuilder::new("kumo-scans").descriptor((*descriptor).clone()).build())
    }
}

struct DemoImageFetcher;

#[async_trait]
impl ImageFetcher for DemoImageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, KuroibaraError> {
        Ok(format!("/tmp/{}", url.rsplit('/').next().unwrap_or("page.jpg")))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root = std::env::temp_dir().join("kuroibara-example-search");
    let built_in = root.join("built_in");
    let community = root.join("community");
    fs::create_dir_all(&built_in)?;
    fs::write(
        built_in.join("kumo-scans.json"),
        r#"{
            "id": "kumo-scans", "name": "Kumo Scans", "base_origin": "https://kumo.example",
            "tier": "Primary", "capabilities": ["Search", "Details", "Chapters", "Pages"],
            "adapter_kind": "Custom", "custom_factory": "DemoFactory"
        }"#,
    )?;

    let app = Kuroibara::builder(&built_in, &community)
        .custom_factory("DemoFactory", Arc::new(DemoFactory))
        .image_fetcher(Arc::new(DemoImageFetcher))
        .build()
        .await?;

    // A fresh source starts `Unknown`; probe it once so it is admissible.
    app.probe_source("kumo-scans").await;

    let request = SearchRequest {
        query: "Iron Blossom".to_string(),
        page: 1,
        page_size: 20,
        filter: SearchFilter::default(),
        priority: 5,
        caller_id: "example".to_string(),
    };
    let page = app.search(&request).await?;
    println!("found {} entries (page {} of an estimated {})", page.results.len(), page.page, page.total_estimate);
    for entry in &page.results {
        println!("- {} ({:?})", entry.title, entry.entry_type);
    }

    fs::remove_dir_all(&root).ok();
    Ok(())
}
