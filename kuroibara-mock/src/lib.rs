//! Deterministic in-memory [`kuroibara_core::Source`] fixtures shared by
//! every workspace crate's test suite.
#![warn(missing_docs)]

pub mod fixtures;
mod mock_source;

pub use mock_source::{MockSource, MockSourceBuilder};
