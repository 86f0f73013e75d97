//! kuroibara-proxy
//!
//! The Proxy Pool: per-source proxy selection (round-robin, random,
//! health-weighted) backed by a background canary-probe loop.
#![warn(missing_docs)]

mod pool;
mod state;

pub use pool::{CanaryProbe, ProxyOutcome, ProxyPool};
pub use state::ProxyState;
