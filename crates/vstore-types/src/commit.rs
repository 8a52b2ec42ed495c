use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::Hash;
use crate::hasher::ContentHasher;

/// An immutable snapshot node in the commit DAG.
///
/// A commit names the tree it captures, its parents (none for the root
/// commit, one for a normal commit, two for a merge) and opaque metadata
/// bytes produced by the caller's codec. Its hash is a deterministic
/// function of all three fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Hash of the tree captured by this commit.
    pub tree: Hash,
    /// Parent commits; the first parent is the branch lineage.
    pub parents: Vec<Hash>,
    /// Encoded commit metadata (author, message, timestamp, ...).
    #[serde(with = "hex_bytes")]
    pub metadata: Vec<u8>,
}

impl Commit {
    /// Create a commit.
    pub fn new(tree: Hash, parents: Vec<Hash>, metadata: Vec<u8>) -> Self {
        Self {
            tree,
            parents,
            metadata,
        }
    }

    /// The root commit over the given empty tree.
    ///
    /// Every fresh reference starts here. It has no parents and no metadata,
    /// so each backend has exactly one root commit.
    pub fn root(empty_tree: Hash) -> Self {
        Self::new(empty_tree, Vec::new(), Vec::new())
    }

    /// Returns `true` if this commit has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns `true` if this commit joins two histories.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// The first parent, if any.
    pub fn first_parent(&self) -> Option<&Hash> {
        self.parents.first()
    }

    /// Canonical serialized form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode the canonical serialized form.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Content address of this commit under [`ContentHasher::COMMIT`].
    pub fn compute_hash(&self) -> Result<Hash, TypeError> {
        Ok(ContentHasher::COMMIT.hash(&self.to_bytes()?))
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
