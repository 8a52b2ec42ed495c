//! Named references: branches and tags.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// The flavor of a named reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// Mutable pointer whose head advances with each commit.
    Branch,
    /// Immutable pointer to one commit.
    Tag,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch => write!(f, "branch"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

/// A named pointer to exactly one commit hash.
///
/// Names are unique across branches and tags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Short name (e.g. "main", "release/1.0").
    pub name: String,
    /// Branch or tag.
    pub kind: RefKind,
    /// Commit the reference currently points at.
    pub hash: Hash,
}

impl Reference {
    /// Create a reference value.
    pub fn new(name: impl Into<String>, kind: RefKind, hash: Hash) -> Self {
        Self {
            name: name.into(),
            kind,
            hash,
        }
    }

    /// Returns `true` if this is a branch.
    pub fn is_branch(&self) -> bool {
        self.kind == RefKind::Branch
    }

    /// Returns `true` if this is a tag.
    pub fn is_tag(&self) -> bool {
        self.kind == RefKind::Tag
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @ {}", self.kind, self.name, self.hash.short_hex())
    }
}
