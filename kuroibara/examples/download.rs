//! Submit a download job against a `Kuroibara` container and poll it to
//! completion.
//!
//! Run with: `cargo run -p kuroibara --example download`

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kuroibara::{
    CustomFactory, DownloadTarget, ImageFetcher, JobKind, Kuroibara, KuroibaraError, Source,
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
    let root = std::env::temp_dir().join("kuroibara-example-download");
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

    let target = DownloadTarget::External {
        label: "Iron Blossom v1".to_string(),
        descriptor: "magnet:?xt=urn:btih:deadbeef".to_string(),
    };
    let job = app.submit_download(JobKind::Torrent, target);
    println!("submitted job {} in state {:?}", job.id, job.status);

    // No Torrent Download Client was registered in this demo, so the job
    // stays `Pending` forever; poll a couple of times to show the shape of
    // real client-driven progress.
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if let Some(current) = app.download_status(&job.id) {
            println!("job {} now {:?} ({:.1}%)", current.id, current.status, current.progress_percent());
        }
    }

    app.cancel_download(&job.id).await;
    println!("listing {} known job(s)", app.list_downloads().len());

    fs::remove_dir_all(&root).ok();
    Ok(())
}
