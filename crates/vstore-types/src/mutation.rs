use crate::key::Key;

/// One key-level change inside a commit, with the value already encoded.
///
/// Mutations are the replayable part of a commit: when a commit attempt
/// loses a race, the engine re-applies the same mutations on top of the
/// freshly observed head.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Store `value` at `key`, replacing any previous content.
    Put { key: Key, value: Vec<u8> },
    /// Remove `key` from the tree. Removing an absent key is a no-op.
    Delete { key: Key },
}

impl Mutation {
    /// Convenience constructor for a put.
    pub fn put(key: Key, value: impl Into<Vec<u8>>) -> Self {
        Self::Put {
            key,
            value: value.into(),
        }
    }

    /// Convenience constructor for a delete.
    pub fn delete(key: Key) -> Self {
        Self::Delete { key }
    }

    /// The key this mutation touches.
    pub fn key(&self) -> &Key {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}
