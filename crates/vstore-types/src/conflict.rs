use std::fmt;

use crate::hash::Hash;
use crate::key::Key;

/// A key changed incompatibly on both sides of a merge.
///
/// `None` means the key is absent on that side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyConflict {
    pub key: Key,
    pub base: Option<Hash>,
    pub ours: Option<Hash>,
    pub theirs: Option<Hash>,
}

/// The key-level conflicts found by a merge or transplant.
///
/// A conflict set is a normal result the caller inspects and resolves, not
/// an exceptional condition. Conflicts are kept in key order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictSet {
    conflicts: Vec<KeyConflict>,
}

impl ConflictSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, conflict: KeyConflict) {
        let pos = self
            .conflicts
            .partition_point(|c| c.key < conflict.key);
        self.conflicts.insert(pos, conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyConflict> {
        self.conflicts.iter()
    }

    /// Conflicting keys in order.
    pub fn keys(&self) -> Vec<&Key> {
        self.conflicts.iter().map(|c| &c.key).collect()
    }

    pub fn get(&self, key: &Key) -> Option<&KeyConflict> {
        self.conflicts.iter().find(|c| &c.key == key)
    }
}

impl IntoIterator for ConflictSet {
    type Item = KeyConflict;
    type IntoIter = std::vec::IntoIter<KeyConflict>;

    fn into_iter(self) -> Self::IntoIter {
        self.conflicts.into_iter()
    }
}

impl fmt::Display for ConflictSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.conflicts.iter().map(|c| c.key.to_string()).collect();
        write!(f, "{} conflicting key(s): {}", keys.len(), keys.join(", "))
    }
}
