use core::fmt;
use serde::{Deserialize, Serialize};

/// Capability labels declared by a [`crate::SourceDescriptor`] and used for
/// routing, admission filtering, and error messages.
///
/// These map one-to-one with the `Source` trait's operations, and allow
/// consistent Display formatting and exhaustive handling when a new
/// capability is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Capability {
    /// Free-text title search.
    Search,
    /// Title details lookup by native id.
    Details,
    /// Chapter listing for a title.
    Chapters,
    /// Page (image URL) listing for a chapter.
    Pages,
    /// Source may return NSFW-flagged entries.
    Nsfw,
}

impl Capability {
    /// Stable, kebab-case identifier for logs/errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Details => "details",
            Self::Chapters => "chapters",
            Self::Pages => "pages",
            Self::Nsfw => "nsfw",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of capabilities a source declares support for.
///
/// Kept as a small `Vec` rather than a bitflags set: the capability count is
/// tiny (five) and descriptors are deserialized directly from the source
/// configuration file, where a plain JSON array reads naturally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(Vec<Capability>);

impl CapabilitySet {
    /// Build a capability set from an iterator, deduplicating.
    pub fn new(caps: impl IntoIterator<Item = Capability>) -> Self {
        let mut out: Vec<Capability> = Vec::new();
        for cap in caps {
            if !out.contains(&cap) {
                out.push(cap);
            }
        }
        Self(out)
    }

    /// Whether the set declares the given capability.
    #[must_use]
    pub fn has(&self, cap: Capability) -> bool {
        self.0.contains(&cap)
    }

    /// Iterate over the declared capabilities.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self::new(iter)
    }
}
