//! The Download Client interface: a thin protocol-agnostic seam
//! between the scheduler and a torrent/NZB backend.

use async_trait::async_trait;
use kuroibara_types::{JobStatus, KuroibaraError};

/// Snapshot of an external job's progress, as reported by a
/// [`DownloadClient::status`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientProgress {
    /// Bytes downloaded so far, per the client.
    pub bytes_done: u64,
    /// Total bytes expected, when the client knows it.
    pub bytes_total: u64,
    /// The client's own view of lifecycle state, mapped onto [`JobStatus`].
    pub state: JobStatus,
}

/// A downstream torrent/NZB backend. The scheduler never assumes protocol
/// internals — it only calls these four operations.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Stable identifier used for client selection and health tracking.
    fn id(&self) -> &str;

    /// Cheap reachability check, polled every 60s by the scheduler.
    async fn test_connection(&self) -> Result<(), KuroibaraError>;

    /// Submit a protocol-specific descriptor (magnet URI, NZB payload
    /// reference,...), returning the client's external job id.
    async fn add(&self, descriptor: &str) -> Result<String, KuroibaraError>;

    /// Fetch current progress for a previously added external job.
    async fn status(&self, external_id: &str) -> Result<ClientProgress, KuroibaraError>;

    /// Remove a job from the client, optionally deleting downloaded files.
    async fn remove(&self, external_id: &str, delete_files: bool) -> Result<(), KuroibaraError>;
}
