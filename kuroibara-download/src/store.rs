//! In-memory, per-job-serialized table of [`DownloadJob`] records.

use std::collections::HashMap;
use std::sync::RwLock;

use kuroibara_types::DownloadJob;

use crate::keyed_mutex::KeyedMutex;

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// Holds every known job and serializes mutation per job id. A real
/// deployment would back this with a database; the in-memory table here
/// keeps the same interface so a storage layer can be dropped in later
/// without touching the scheduler.
pub struct JobStore {
    jobs: RwLock<HashMap<String, DownloadJob>>,
    locks: KeyedMutex,
}

impl JobStore {
    /// An empty job table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            locks: KeyedMutex::new(),
        }
    }

    /// Insert a newly created job. Panics are not possible here; a
    /// duplicate id silently replaces the previous record, mirroring a
    /// database `UPSERT`.
    pub fn insert(&self, job: DownloadJob) {
        self.jobs.write().unwrap().insert(job.id.clone(), job);
    }

    /// Snapshot a single job by id.
    #[must_use]
    pub fn get(&self, job_id: &str) -> Option<DownloadJob> {
        self.jobs.read().unwrap().get(job_id).cloned()
    }

    /// Snapshot every known job, e.g. for restart reconciliation.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DownloadJob> {
        self.jobs.read().unwrap().values().cloned().collect()
    }

    /// Mutate `job_id` under its per-job lock, stamping `updated_at_ms`.
    /// Returns `None` when the job does not exist.
    pub async fn mutate(&self, job_id: &str, f: impl FnOnce(&mut DownloadJob)) -> Option<DownloadJob> {
        let _guard = self.locks.lock(job_id).await;
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(job_id)?;
        f(job);
        job.updated_at_ms = now_ms();
        Some(job.clone())
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
