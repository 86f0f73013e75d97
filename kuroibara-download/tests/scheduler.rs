use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kuroibara_download::{ClientProgress, DownloadClient, DownloadScheduler, ImageFetcher, PostProcessor};
use kuroibara_mock::MockSourceBuilder;
use kuroibara_types::{ChapterRef, DownloadConcurrency, DownloadJob, DownloadTarget, JobKind, JobStatus, KuroibaraError};

struct RecordingFetcher {
    fail_on: Option<&'static str>,
}

#[async_trait]
impl ImageFetcher for RecordingFetcher {
    async fn fetch(&self, url: &str) -> Result<String, KuroibaraError> {
        if self.fail_on == Some(url) {
            return Err(KuroibaraError::Data("unsupported image format".to_string()));
        }
        Ok(format!("/tmp/{}", url.rsplit('/').next().unwrap_or("page")))
    }
}

struct RecordingPostProcessor {
    calls: Mutex<Vec<(String, usize)>>,
}

impl RecordingPostProcessor {
    fn new() -> Self {
        Self { calls: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl PostProcessor for RecordingPostProcessor {
    async fn process(&self, job: &DownloadJob, local_files: &[String]) -> Result<(), KuroibaraError> {
        self.calls.lock().unwrap().push((job.id.clone(), local_files.len()));
        Ok(())
    }
}

fn chapter_target(source_id: &str) -> DownloadTarget {
    DownloadTarget::Chapter(ChapterRef {
        source_id: source_id.to_string(),
        source_native_id: "ch1".to_string(),
        manga_native_id: "manga1".to_string(),
        chapter_number: "1".to_string(),
        volume: None,
        title: None,
        language: "en".to_string(),
        release_date: None,
        page_count: Some(2),
    })
}

async fn wait_for_terminal(scheduler: &Arc<DownloadScheduler>, job_id: &str) -> DownloadJob {
    for _ in 0..150 {
        if let Some(job) = scheduler.status(job_id) {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn a_direct_job_fetches_every_page_and_completes() {
    let post_processor = Arc::new(RecordingPostProcessor::new());
    let scheduler = DownloadScheduler::new(
        DownloadConcurrency::default(),
        Arc::new(RecordingFetcher { fail_on: None }),
        post_processor.clone(),
    );

    let source = MockSourceBuilder::new("mangadex").build();
    scheduler.register_source(source);

    let job = scheduler.submit(JobKind::Direct, chapter_target("mangadex"));
    let finished = wait_for_terminal(&scheduler, &job.id).await;

    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.bytes_done, finished.bytes_total);
    assert_eq!(post_processor.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn a_direct_job_fails_when_a_page_fetch_errors_non_retryably() {
    let post_processor = Arc::new(RecordingPostProcessor::new());
    let source = MockSourceBuilder::new("mangadex")
        .with_pages_fn(|_| {
            Ok(vec![
                "https://mangadex.example/pages/ch1/1.jpg".to_string(),
                "https://mangadex.example/pages/ch1/2.jpg".to_string(),
            ])
        })
        .build();

    let scheduler = DownloadScheduler::new(
        DownloadConcurrency::default(),
        Arc::new(RecordingFetcher { fail_on: Some("https://mangadex.example/pages/ch1/2.jpg") }),
        post_processor,
    );
    scheduler.register_source(source);

    let job = scheduler.submit(JobKind::Direct, chapter_target("mangadex"));
    let finished = wait_for_terminal(&scheduler, &job.id).await;

    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.bytes_done, 1);
    assert!(finished.last_error.is_some());
}

struct ScriptedClient {
    id: &'static str,
    poll_count: AtomicUsize,
}

#[async_trait]
impl DownloadClient for ScriptedClient {
    fn id(&self) -> &str {
        self.id
    }

    async fn test_connection(&self) -> Result<(), KuroibaraError> {
        Ok(())
    }

    async fn add(&self, _descriptor: &str) -> Result<String, KuroibaraError> {
        Ok("ext-1".to_string())
    }

    async fn status(&self, _external_id: &str) -> Result<ClientProgress, KuroibaraError> {
        let n = self.poll_count.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            Ok(ClientProgress { bytes_done: 50, bytes_total: 100, state: JobStatus::Active })
        } else {
            Ok(ClientProgress { bytes_done: 100, bytes_total: 100, state: JobStatus::Completed })
        }
    }

    async fn remove(&self, _external_id: &str, _delete_files: bool) -> Result<(), KuroibaraError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn a_torrent_job_is_polled_until_the_client_reports_completion() {
    let scheduler = DownloadScheduler::new(
        DownloadConcurrency::default(),
        Arc::new(RecordingFetcher { fail_on: None }),
        Arc::new(RecordingPostProcessor::new()),
    );
    scheduler.register_client(
        JobKind::Torrent,
        Arc::new(ScriptedClient { id: "qbittorrent", poll_count: AtomicUsize::new(0) }),
    );

    let job = scheduler.submit(
        JobKind::Torrent,
        DownloadTarget::External { label: "Iron Blossom v1".to_string(), descriptor: "magnet:?xt=...".to_string() },
    );

    let finished = wait_for_terminal(&scheduler, &job.id).await;

    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.bytes_total, 100);
}

#[tokio::test]
async fn cancelling_a_pending_job_transitions_it_without_touching_a_client() {
    let scheduler = DownloadScheduler::new(
        DownloadConcurrency::default(),
        Arc::new(RecordingFetcher { fail_on: None }),
        Arc::new(RecordingPostProcessor::new()),
    );
    let source = MockSourceBuilder::new("mangadex").build();
    scheduler.register_source(source);

    let job = scheduler.submit(JobKind::Direct, chapter_target("mangadex"));
    scheduler.cancel(&job.id).await;

    let status = scheduler.status(&job.id).unwrap();
    assert!(matches!(status.status, JobStatus::Cancelled | JobStatus::Completed));
}
