//! Source identity: the immutable [`SourceDescriptor`] and its supporting
//! enums.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::capability::CapabilitySet;

/// Coarse quality class used by the Search Engine for fallback order and
/// confidence weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Highest-trust, tried first.
    Primary,
    /// Tried if the primary tier is insufficient.
    Secondary,
    /// Tried only if the first two tiers are insufficient.
    Tertiary,
}

impl Tier {
    /// Confidence weight applied to source-origins from this tier.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Primary => 1.0,
            Self::Secondary => 0.8,
            Self::Tertiary => 0.7,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Tertiary => "tertiary",
        };
        f.write_str(s)
    }
}

/// How a source is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AdapterKind {
    /// Data-driven: HTML selectors or JSON paths, no adapter code.
    Generic,
    /// Hand-written adapter code, resolved by registered factory name.
    Custom,
    /// Generic adapter variant that may require a Challenge Solver.
    JavaScript,
}

/// Immutable identity of an upstream source.
///
/// `SourceDescriptor` is defined at registry load and never mutated at
/// runtime; the registry replaces the whole set on reload rather than
/// patching individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Stable unique identifier, e.g. `"mangadex"`.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Base origin (URL authority), e.g. `"https://api.mangadex.org"`.
    pub base_origin: String,
    /// Fallback tier used for search ordering and confidence weighting.
    pub tier: Tier,
    /// Declared capabilities.
    pub capabilities: CapabilitySet,
    /// How the source is implemented.
    pub adapter_kind: AdapterKind,
    /// Dispatch priority; lower values are tried first within a tier.
    pub priority: i32,
    /// Whether the source may legitimately return NSFW-flagged entries.
    pub supports_nsfw: bool,
    /// Whether outbound calls must route through the Challenge Solver.
    pub requires_solver: bool,
    /// Opaque configuration blob for generic/JavaScript adapters. `None` for custom adapters.
    pub config: Option<serde_json::Value>,
}

impl SourceDescriptor {
    /// Whether this descriptor declares the given capability.
    #[must_use]
    pub fn supports(&self, cap: crate::capability::Capability) -> bool {
        self.capabilities.has(cap)
    }
}
