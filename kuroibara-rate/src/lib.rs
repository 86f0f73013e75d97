//! kuroibara-rate
//!
//! The Rate Controller: a per-source token bucket fed by a priority
//! wait queue, with adaptive cooldown on observed 429/5xx outcomes.
#![warn(missing_docs)]

mod bucket;
mod controller;
mod middleware;
mod queue;

pub use bucket::TokenBucket;
pub use controller::{Outcome, RateController, RatePermit};
pub use middleware::{RateLimitMiddleware, RateLimitedSource};
pub use queue::{Priority, WaitQueue};
