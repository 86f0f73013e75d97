//! kuroibara-health
//!
//! The Health Monitor: probe scheduling, EMA response times, and
//! source admissibility, exposed to the middleware stack via
//! [`kuroibara_middleware::Admissibility`].
#![warn(missing_docs)]

mod monitor;

pub use monitor::{HealthMonitor, RecoveryObserver};
