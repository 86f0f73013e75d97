//! Mutable per-source operational state.

use core::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::source::SourceDescriptor;

/// Operational state of a source as maintained by the Health Monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum HealthState {
    /// Passing probes; fully admissible.
    Active,
    /// Failing but below the failure threshold; still admissible.
    Degraded,
    /// At or above the failure threshold; inadmissible.
    Down,
    /// Never probed yet.
    Unknown,
    /// A probe is currently in flight.
    Testing,
    /// Administratively disabled; never probed, always inadmissible.
    Disabled,
}

impl HealthState {
    /// Admissibility gate: true iff the state is `Active` or `Degraded`.
    #[must_use]
    pub const fn is_admissible(self) -> bool {
        matches!(self, Self::Active | Self::Degraded)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Degraded => "degraded",
            Self::Down => "down",
            Self::Unknown => "unknown",
            Self::Testing => "testing",
            Self::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

/// The last error observed by a probe, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    /// Stable error kind label (see [`crate::KuroibaraError::kind`]).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

/// Mutable per-source operational state, owned exclusively by the Health
/// Monitor. Every other component only reads immutable snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    /// The source this status describes.
    pub descriptor: Arc<SourceDescriptor>,
    /// Current health state.
    pub state: HealthState,
    /// Unix millis of the last probe attempt, if any.
    pub last_probe_at_ms: Option<i64>,
    /// Unix millis of the last successful probe, if any.
    pub last_success_at_ms: Option<i64>,
    /// Exponential moving average response time, milliseconds.
    pub response_time_ms_ema: f64,
    /// Consecutive probe failures since the last success.
    pub consecutive_failures: u32,
    /// Total probes ever attempted.
    pub total_probes: u64,
    /// Probes that succeeded.
    pub successful_probes: u64,
    /// Last observed error, if any.
    pub last_error: Option<LastError>,
    /// Administrative enabled flag; a disabled source is never probed.
    pub enabled: bool,
    /// Minutes between re-probes.
    pub check_interval_minutes: u32,
    /// Consecutive failures at/above which the state becomes `Down`.
    pub failure_threshold: u32,
}

impl SourceStatus {
    /// Construct the initial (never-probed) status for a newly loaded
    /// source descriptor.
    #[must_use]
    pub fn initial(descriptor: Arc<SourceDescriptor>, check_interval_minutes: u32) -> Self {
        Self {
            descriptor,
            state: HealthState::Unknown,
            last_probe_at_ms: None,
            last_success_at_ms: None,
            response_time_ms_ema: 0.0,
            consecutive_failures: 0,
            total_probes: 0,
            successful_probes: 0,
            last_error: None,
            enabled: true,
            check_interval_minutes,
            failure_threshold: 3,
        }
    }

    /// Uptime percentage; 0 when no probes have run yet.
    #[must_use]
    pub fn uptime_percent(&self) -> f64 {
        if self.total_probes == 0 {
            0.0
        } else {
            100.0 * self.successful_probes as f64 / self.total_probes as f64
        }
    }

    /// Admissibility gate: an enabled source with an admissible state.
    #[must_use]
    pub fn is_admissible(&self) -> bool {
        self.enabled && self.state.is_admissible()
    }

    /// Validate this status's cross-field invariants. Intended for tests
    /// and debug assertions, not the hot path.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        let uptime = self.uptime_percent();
        self.successful_probes <= self.total_probes
        && (0.0..=100.0).contains(&uptime)
        && (self.state != HealthState::Down
        || self.consecutive_failures >= self.failure_threshold)
    }
}
