use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::Hash;
use crate::hasher::ContentHasher;
use crate::key::Key;

/// A single entry in a tree: one key and the hash of its content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Application key.
    pub key: Key,
    /// Content-addressed hash of the value stored at `key`.
    pub hash: Hash,
}

impl TreeEntry {
    /// Create a new tree entry.
    pub fn new(key: Key, hash: Hash) -> Self {
        Self { key, hash }
    }
}

/// The full key space at one point in history.
///
/// Entries are kept sorted by key and free of duplicates, so two trees with
/// the same key/hash pairs serialize (and therefore hash) identically no
/// matter how they were built. A key absent from the tree means "no content
/// at this key", not an empty value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create a tree from entries in any order.
    ///
    /// When a key appears more than once the last entry wins.
    pub fn new(entries: Vec<TreeEntry>) -> Self {
        let map: BTreeMap<Key, Hash> = entries.into_iter().map(|e| (e.key, e.hash)).collect();
        Self::from_map(map)
    }

    /// Create an empty tree.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a tree from an ordered map.
    pub fn from_map(map: BTreeMap<Key, Hash>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(key, hash)| TreeEntry::new(key, hash))
                .collect(),
        }
    }

    /// Copy the entries into an ordered map (for editing).
    pub fn to_map(&self) -> BTreeMap<Key, Hash> {
        self.entries
            .iter()
            .map(|e| (e.key.clone(), e.hash))
            .collect()
    }

    /// Look up the content hash stored at `key`.
    pub fn get(&self, key: &Key) -> Option<&Hash> {
        self.entries
            .binary_search_by(|e| e.key.cmp(key))
            .ok()
            .map(|i| &self.entries[i].hash)
    }

    /// Returns `true` if the tree has content at `key`.
    pub fn contains(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Sorted entries.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Iterate over `(key, hash)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Hash)> {
        self.entries.iter().map(|e| (&e.key, &e.hash))
    }

    /// Sorted keys.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical serialized form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode the canonical serialized form.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TypeError> {
        let raw: Tree =
            serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(Self::new(raw.entries))
    }

    /// Content address of this tree under [`ContentHasher::TREE`].
    pub fn compute_hash(&self) -> Result<Hash, TypeError> {
        Ok(ContentHasher::TREE.hash(&self.to_bytes()?))
    }
}

impl FromIterator<(Key, Hash)> for Tree {
    fn from_iter<I: IntoIterator<Item = (Key, Hash)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}
