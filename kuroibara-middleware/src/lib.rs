//! kuroibara-middleware
//!
//! Composes the Rate Controller, Proxy Pool, Health Monitor admissibility,
//! and Challenge Solver as [`kuroibara_core::Middleware`] layers around a
//! raw source adapter.
#![warn(missing_docs)]

mod builder;
mod health_gate;
mod proxy_gate;
mod solver;

pub use builder::SourceBuilder;
pub use health_gate::{Admissibility, HealthGateMiddleware, HealthGatedSource};
pub use proxy_gate::{ProxyGatedSource, ProxyMiddleware, current_proxy};
pub use solver::{ChallengeSolver, SolverMiddleware, SolvedSource, current_solved_token};
