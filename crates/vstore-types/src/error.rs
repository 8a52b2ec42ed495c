use std::fmt;

use thiserror::Error;

use crate::conflict::ConflictSet;
use crate::hash::Hash;
use crate::key::Key;

/// Errors produced by type construction and (de)serialization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid hash length: {0} bytes")]
    InvalidHashLength(usize),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// The kind of a content-addressed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Content,
    Tree,
    Commit,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::Tree => write!(f, "tree"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// Coarse classification of a [`VersionError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A name, hash, or key does not exist. Never retried.
    NotFound,
    /// A creation collided with an existing name. Never retried.
    AlreadyExists,
    /// Optimistic-concurrency mismatch on a reference.
    ReferenceConflict,
    /// Key-level content conflicts that made an operation fail.
    Conflict,
    /// The request itself is invalid (bad name, moving a tag, ...).
    InvalidRequest,
    /// Stored bytes do not match their address, or history has a cycle.
    Corruption,
    /// The backend could not be reached within the retry budget.
    Unavailable,
    /// A value or metadata payload could not be encoded or decoded.
    Serialization,
}

/// The error taxonomy every vstore engine and the facade return.
#[derive(Debug, Error)]
pub enum VersionError {
    /// No reference with this name exists.
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    /// No object with this hash exists.
    #[error("{kind} not found: {hash}")]
    ObjectNotFound { kind: ObjectKind, hash: Hash },

    /// The reference's tree has no content at this key.
    #[error("key {key} not found on {reference}")]
    KeyNotFound { reference: String, key: Key },

    /// A reference with this name already exists.
    #[error("reference already exists: {0}")]
    AlreadyExists(String),

    /// The reference's head is not the one the caller expected.
    #[error(
        "reference conflict on {name}: expected {}, found {}",
        display_hash(.expected),
        display_hash(.actual)
    )]
    ReferenceConflict {
        name: String,
        expected: Option<Hash>,
        actual: Option<Hash>,
    },

    /// Tags never move once created.
    #[error("reference {0} is a tag and cannot be moved")]
    ImmutableReference(String),

    /// The reference name breaks the naming rules.
    #[error("invalid reference name {name:?}: {reason}")]
    InvalidReferenceName { name: String, reason: String },

    /// A transplanted commit could not be replayed without conflicts.
    #[error("transplant of commit {commit} conflicts: {conflicts}")]
    TransplantConflict { commit: Hash, conflicts: ConflictSet },

    /// The two histories share no commit.
    #[error("no common ancestor between {a} and {b}")]
    NoCommonAncestor { a: Hash, b: Hash },

    /// Hash mismatch between stored bytes and their address, a hash
    /// collision on write, or a cycle in parent links.
    #[error("storage corruption: {0}")]
    Corruption(String),

    /// Backend I/O failed after the adapter's retry budget.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Codec failure on a value or metadata payload.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl VersionError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReferenceNotFound(_)
            | Self::ObjectNotFound { .. }
            | Self::KeyNotFound { .. }
            | Self::NoCommonAncestor { .. } => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::ReferenceConflict { .. } => ErrorKind::ReferenceConflict,
            Self::TransplantConflict { .. } => ErrorKind::Conflict,
            Self::ImmutableReference(_) | Self::InvalidReferenceName { .. } => {
                ErrorKind::InvalidRequest
            }
            Self::Corruption(_) => ErrorKind::Corruption,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Type(TypeError::Serialization(_)) => ErrorKind::Serialization,
            Self::Type(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Returns `true` for any not-found condition.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Returns `true` for an optimistic-concurrency mismatch.
    pub fn is_reference_conflict(&self) -> bool {
        self.kind() == ErrorKind::ReferenceConflict
    }
}

fn display_hash(hash: &Option<Hash>) -> String {
    match hash {
        Some(h) => h.to_hex(),
        None => "nothing".to_string(),
    }
}

/// Result alias used across the engine crates.
pub type VersionResult<T> = Result<T, VersionError>;
