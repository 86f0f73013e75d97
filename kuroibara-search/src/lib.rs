//! Tiered, fused, cached search across Kuroibara source adapters.
#![warn(missing_docs)]

pub mod fingerprint;
pub mod fusion;
mod engine;

pub use engine::SearchEngine;
