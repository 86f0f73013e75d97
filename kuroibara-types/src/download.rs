//! Download job state.

use serde::{Deserialize, Serialize};

use crate::chapter::ChapterRef;

/// What kind of downstream client handles a job.
///
/// Marked `#[non_exhaustive]` so future client kinds are added as variants
/// without a scheduler rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum JobKind {
    /// Fetched directly from the owning Source's page URLs.
    Direct,
    /// Routed to a Torrent Client via a magnet/torrent descriptor.
    Torrent,
    /// Routed to an NZB Client via an NZB descriptor.
    Nzb,
}

impl JobKind {
    /// Stable identifier, also used to key per-kind worker pools.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Torrent => "torrent",
            Self::Nzb => "nzb",
        }
    }
}

/// The resource a download job targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DownloadTarget {
    /// A chapter to be fetched page-by-page from its owning Source.
    Chapter(ChapterRef),
    /// An opaque external resource descriptor (magnet URI, NZB payload
    /// reference, etc.) for torrent/NZB jobs.
    External {
        /// Human-readable label, e.g. a release title.
        label: String,
        /// Protocol-specific descriptor (magnet URI, NZB URL,...).
        descriptor: String,
    },
}

/// Lifecycle state of a [`DownloadJob`].
///
/// `Completed`, `Failed`, and `Cancelled` are terminal: once reached, a job
/// never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum JobStatus {
    /// Submitted, not yet picked up by a worker.
    Pending,
    /// Acknowledged by the client, awaiting progress.
    Queued,
    /// A worker has handed the job to a client and it is in flight.
    Active,
    /// Paused (client-initiated or administrative).
    Paused,
    /// Terminal: finished successfully.
    Completed,
    /// Terminal: finished with an error.
    Failed,
    /// Terminal: cancelled by the caller.
    Cancelled,
}

impl JobStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// The last error recorded against a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Stable error kind label.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

/// A persistent record of one unit of scheduler work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    /// Unique job id.
    pub id: String,
    /// Which kind of client this job routes to.
    pub kind: JobKind,
    /// What is being downloaded.
    pub target: DownloadTarget,
    /// Id of the client this job was routed to, once selected.
    pub client_id: Option<String>,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Total bytes expected, when known.
    pub bytes_total: u64,
    /// Bytes downloaded so far.
    pub bytes_done: u64,
    /// Unix millis at job creation.
    pub started_at_ms: Option<i64>,
    /// Unix millis of the last state/progress update.
    pub updated_at_ms: i64,
    /// Unix millis when the job reached a terminal state.
    pub completed_at_ms: Option<i64>,
    /// Number of attempts made (image-fetch retries roll up here for
    /// direct jobs; torrent/nzb jobs count client `Add` retries).
    pub attempts: u32,
    /// The most recent error, if any.
    pub last_error: Option<JobError>,
}

impl DownloadJob {
    /// Progress percent: `bytes_done / bytes_total * 100`, or `0.0` when
    /// the total is not yet known.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.bytes_total == 0 {
            0.0
        } else {
            100.0 * self.bytes_done as f64 / self.bytes_total as f64
        }
    }

    /// Attempt a state transition, refusing to leave a terminal state.
    /// Returns `false` and leaves the job untouched if `self.status` is
    /// already terminal.
    #[must_use]
    pub fn transition(&mut self, next: JobStatus, now_ms: i64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        self.updated_at_ms = now_ms;
        if next.is_terminal() {
            self.completed_at_ms = Some(now_ms);
        }
        true
    }

    /// Validate this job's cross-field invariants. Intended for tests.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        self.bytes_total == 0 || self.bytes_done <= self.bytes_total
    }
}
