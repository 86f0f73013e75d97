//! Proxy Pool configuration and descriptors.

use serde::{Deserialize, Serialize};

/// Proxy transport kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ProxyKind {
    /// Plain HTTP proxy.
    Http,
    /// HTTPS (CONNECT) proxy.
    Https,
    /// SOCKS4 proxy.
    Socks4,
    /// SOCKS5 proxy.
    Socks5,
}

/// Observed health of a single proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyHealth {
    /// Passing probes and/or real traffic.
    Healthy,
    /// One real-traffic degradation observed; one more demotes to dead.
    Degraded,
    /// Excluded from selection until the dead-retry window elapses.
    Dead,
}

/// Selection strategy for choosing among a source's configured proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ProxySelectionStrategy {
    /// Cycle through proxies in order.
    RoundRobin,
    /// Pick uniformly at random among admissible proxies.
    Random,
    /// Probability proportional to `success_rate * 1/latency_ema` (default).
    #[default]
    HealthWeighted,
}

/// Static configuration for one proxy entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyEntry {
    /// Stable id for this proxy within its source's list.
    pub id: String,
    /// `host:port` or full URL, depending on `kind`.
    pub endpoint: String,
    /// Transport kind.
    pub kind: ProxyKind,
    /// Optional `username:password` credentials.
    pub credentials: Option<String>,
}

/// Per-source proxy pool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Ordered candidate proxies for this source; empty means direct
    /// connections only.
    pub entries: Vec<ProxyEntry>,
    /// How a proxy is chosen among admissible candidates.
    pub strategy: ProxySelectionStrategy,
}
