//! kuroibara-core
//!
//! The [`Source`] trait, its capability provider traits, and the
//! [`Middleware`] trait used to compose rate limiting, proxy routing,
//! health gating, and challenge solving around a raw source adapter.
//!
//! - `source`: the `Source` trait and capability provider traits.
//! - `middleware`: the `Middleware` trait and stack-validation helpers.
#![warn(missing_docs)]

/// Middleware trait, validation context, and stack-dependency macros.
pub mod middleware;
/// Source trait and capability provider traits.
pub mod source;

/// Minimal stream handle abstraction for long-lived streaming tasks (health
/// probe schedulers, download progress pollers).
///
/// Lifecycle contract:
/// - Prefer calling [`stop`](StreamHandle::stop) to request a graceful shutdown and await completion.
/// - Call [`abort`](StreamHandle::abort) for immediate, non-graceful termination.
/// - If dropped without an explicit shutdown, a best-effort stop signal is sent (if available) and
///   the underlying task is then aborted. The task may not observe the stop signal before abort.
#[derive(Debug)]
pub struct StreamHandle {
    inner: Option<tokio::task::JoinHandle<()>>,
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl StreamHandle {
    /// Create a new `StreamHandle`.
    ///
    /// Parameters:
    /// - `inner`: the spawned task driving the background loop.
    /// - `stop_tx`: a one-shot used to request a graceful stop.
    #[must_use]
    pub const fn new(
        inner: tokio::task::JoinHandle<()>,
        stop_tx: tokio::sync::oneshot::Sender<()>,
    ) -> Self {
        Self {
            inner: Some(inner),
            stop_tx: Some(stop_tx),
        }
    }

    /// Create a `StreamHandle` that can only abort the task (no graceful stop).
    #[must_use]
    pub const fn new_abort_only(inner: tokio::task::JoinHandle<()>) -> Self {
        Self {
            inner: Some(inner),
            stop_tx: None,
        }
    }

    /// Gracefully stop the underlying task and await its completion.
    ///
    /// Sends a stop signal if available, then awaits the task. Any errors
    /// from the task are ignored.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(inner) = self.inner.take() {
            let _ = inner.await;
        }
    }

    /// Force-abort the underlying task without waiting for completion.
    ///
    /// Prefer [`stop`](Self::stop) when possible to allow cleanup.
    pub fn abort(mut self) {
        if let Some(inner) = self.inner.take() {
            inner.abort();
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(inner) = self.inner.take() {
            inner.abort();
        }
    }
}

pub use kuroibara_types::KuroibaraError;
pub use middleware::{Middleware, MiddlewareDescriptor, MiddlewarePosition, ValidationContext};
pub use source::{
    ChaptersProvider, DetailsProvider, PagesProvider, ProbeProvider, SearchProvider, Source,
};
