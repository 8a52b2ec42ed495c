//! Key-level diff between two trees.
//!
//! Entries are compared by content hash only; values are never decoded.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use vstore_types::{Hash, Key, Tree};

/// How a key differs between two trees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present only in the second tree.
    Added,
    /// Present only in the first tree.
    Removed,
    /// Present in both with different content.
    Modified,
}

impl ChangeKind {
    /// The kind seen when the two trees are swapped.
    pub fn inverse(self) -> Self {
        match self {
            Self::Added => Self::Removed,
            Self::Removed => Self::Added,
            Self::Modified => Self::Modified,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

/// One differing key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub key: Key,
    pub kind: ChangeKind,
    /// Content hash in the first tree.
    pub old: Option<Hash>,
    /// Content hash in the second tree.
    pub new: Option<Hash>,
}

impl DiffEntry {
    /// The same change seen from the other side.
    pub fn inverse(&self) -> Self {
        Self {
            key: self.key.clone(),
            kind: self.kind.inverse(),
            old: self.new,
            new: self.old,
        }
    }
}

/// Compare two trees. The result is sorted by key.
///
/// `diff(t, t)` is empty, and `diff(b, a)` is `diff(a, b)` with every entry
/// inverted.
pub fn diff(a: &Tree, b: &Tree) -> Vec<DiffEntry> {
    let mut changes = Vec::new();
    let mut left = a.entries().iter().peekable();
    let mut right = b.entries().iter().peekable();

    loop {
        let order = match (left.peek(), right.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(l), Some(r)) => l.key.cmp(&r.key),
        };
        match order {
            Ordering::Less => {
                if let Some(l) = left.next() {
                    changes.push(DiffEntry {
                        key: l.key.clone(),
                        kind: ChangeKind::Removed,
                        old: Some(l.hash),
                        new: None,
                    });
                }
            }
            Ordering::Greater => {
                if let Some(r) = right.next() {
                    changes.push(DiffEntry {
                        key: r.key.clone(),
                        kind: ChangeKind::Added,
                        old: None,
                        new: Some(r.hash),
                    });
                }
            }
            Ordering::Equal => {
                if let (Some(l), Some(r)) = (left.next(), right.next()) {
                    if l.hash != r.hash {
                        changes.push(DiffEntry {
                            key: l.key.clone(),
                            kind: ChangeKind::Modified,
                            old: Some(l.hash),
                            new: Some(r.hash),
                        });
                    }
                }
            }
        }
    }
    changes
}
