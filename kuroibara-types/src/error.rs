use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the Kuroibara orchestration workspace.
///
/// Every variant corresponds to one of the error kinds named in the
/// provider-orchestration error taxonomy: capability mismatches, admission
/// rejections from the Rate Controller, deadline/transport failures,
/// source-health gating, download-client failures, and the aggregate used
/// when every consulted source fails.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KuroibaraError {
    /// The requested capability is not implemented by the target source.
    #[error("unsupported capability: {capability}")]
    Unsupported {
        /// Capability string describing what was requested (e.g. "chapters").
        capability: String,
    },

    /// Invalid input argument (e.g. an empty search query).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Issues with the returned or expected data (missing fields, etc.).
    #[error("data issue: {0}")]
    Data(String),

    /// A resource could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of missing resource, e.g. "chapter 12 for source mangadex".
        what: String,
    },

    /// The Rate Controller rejected admission: queue full or wait exceeded.
    #[error("rate limited: source={source} retry_after_ms={retry_after_ms}")]
    RateLimited {
        /// Source whose bucket/queue rejected the request.
        source: String,
        /// Suggested backoff before retrying.
        retry_after_ms: u64,
    },

    /// A soft or hard deadline elapsed before the call completed.
    #[error("deadline exceeded: {operation} via {source}")]
    Deadline {
        /// Source the deadline was attached to.
        source: String,
        /// Operation label (e.g. "search", "probe").
        operation: String,
    },

    /// The Health Monitor has flagged this source as inadmissible.
    #[error("source down: {source}")]
    ProviderDown {
        /// Source that is currently inadmissible.
        source: String,
    },

    /// The adapter detected a bot-protection challenge and no solver is
    /// configured (or the solver itself failed).
    #[error("bot challenge encountered on {source}")]
    BotChallenge {
        /// Source that returned the challenge.
        source: String,
    },

    /// A response was received but did not match the adapter's expected
    /// shape (HTML selectors/JSON paths produced nothing usable).
    #[error("parse error on {source}: {message}")]
    ParseError {
        /// Source whose response failed to parse.
        source: String,
        /// Human-readable parse failure detail.
        message: String,
    },

    /// DNS/TCP/TLS/connection-level failure.
    #[error("transport error on {source}: {message}")]
    Transport {
        /// Source the transport error occurred against.
        source: String,
        /// Human-readable transport failure detail.
        message: String,
    },

    /// A download client returned an error for an `Add`/`Status`/`Remove` call.
    #[error("download client error: {client} failed: {message}")]
    ClientError {
        /// Download client identifier.
        client: String,
        /// Human-readable failure detail.
        message: String,
    },

    /// Restart reconciliation could not locate a previously active job.
    #[error("job lost during reconciliation: {job_id}")]
    Lost {
        /// Job id that could not be reconciled.
        job_id: String,
    },

    /// No admissible proxy is available for the source.
    #[error("no proxy available for {source}")]
    NoProxyAvailable {
        /// Source requesting a proxy.
        source: String,
    },

    /// Every consulted source failed; carries the individual failures.
    #[error("all sources failed: {0:?}")]
    AllSourcesFailed(Vec<KuroibaraError>),

    /// The operation was cancelled, explicitly or via deadline expiry.
    #[error("cancelled: {reason}")]
    Cancelled {
        /// Human-readable cancellation reason.
        reason: String,
    },

    /// Middleware stack configuration is invalid (missing dependencies,
    /// wrong order, etc.), detected at `SourceBuilder::build` time.
    #[error("invalid middleware stack: {message}")]
    InvalidMiddlewareStack {
        /// Human-readable description of the validation failure.
        message: String,
    },

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl KuroibaraError {
    /// Helper: build an `Unsupported` error for a capability string.
    #[must_use]
    pub fn unsupported(cap: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: cap.into(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build a `Transport` error tagged with the source name.
    pub fn transport(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            source: source.into(),
            message: message.into(),
        }
    }

    /// Helper: build a `ParseError` tagged with the source name.
    pub fn parse(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            source: source.into(),
            message: message.into(),
        }
    }

    /// Helper: build a `Deadline` error.
    pub fn deadline(source: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Deadline {
            source: source.into(),
            operation: operation.into(),
        }
    }

    /// Stable, kebab-case kind label for structured `{kind, message, retryable}`
    /// responses.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unsupported {.. } => "unsupported",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Data(_) => "data",
            Self::NotFound {.. } => "not_found",
            Self::RateLimited {.. } => "rate_limited",
            Self::Deadline {.. } => "deadline",
            Self::ProviderDown {.. } => "provider_down",
            Self::BotChallenge {.. } => "bot_challenge",
            Self::ParseError {.. } => "parse_error",
            Self::Transport {.. } => "transport",
            Self::ClientError {.. } => "client_error",
            Self::Lost {.. } => "lost",
            Self::NoProxyAvailable {.. } => "no_proxy_available",
            Self::AllSourcesFailed(_) => "all_sources_failed",
            Self::Cancelled {.. } => "cancelled",
            Self::InvalidMiddlewareStack {.. } => "invalid_middleware_stack",
            Self::Other(_) => "other",
        }
    }

    /// Whether the caller should retry the operation.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited {.. } | Self::Deadline {.. } | Self::Transport {.. }
        )
    }

    /// Returns true if this error should be surfaced to users as actionable.
    ///
    /// Non-actionable errors indicate capability absence or a benign
    /// not-found condition. Aggregates are classified based on their
    /// contents.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        match self {
            Self::Unsupported {.. } | Self::NotFound {.. } => false,
            Self::AllSourcesFailed(inner) => inner.iter().any(Self::is_actionable),
            _ => true,
        }
    }

    /// Flatten nested `AllSourcesFailed` structures into a plain vector.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::AllSourcesFailed(list) => list.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }
}
