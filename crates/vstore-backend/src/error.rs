use vstore_types::{Hash, ObjectKind, TypeError, VersionError};

/// Errors from backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The requested object was not found.
    #[error("{kind} not found: {hash}")]
    NotFound { kind: ObjectKind, hash: Hash },

    /// No reference with this name exists.
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    /// A reference with this name already exists (as a branch or a tag).
    #[error("reference already exists: {0}")]
    AlreadyExists(String),

    /// The reference did not point at the expected hash. Nothing was changed.
    #[error("reference {name} moved: expected {expected}")]
    Conflict {
        name: String,
        expected: Hash,
        actual: Option<Hash>,
    },

    /// Stored bytes do not match their address, or an existing object was
    /// rewritten with different bytes.
    #[error("corruption: {0}")]
    Corruption(String),

    /// The storage system failed, or stayed failing after retries.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend cannot be constructed with the given settings.
    #[error("backend configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failure of a stored record.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

impl From<BackendError> for VersionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound { kind, hash } => VersionError::ObjectNotFound { kind, hash },
            BackendError::ReferenceNotFound(name) => VersionError::ReferenceNotFound(name),
            BackendError::AlreadyExists(name) => VersionError::AlreadyExists(name),
            BackendError::Conflict {
                name,
                expected,
                actual,
            } => VersionError::ReferenceConflict {
                name,
                expected: Some(expected),
                actual,
            },
            BackendError::Corruption(msg) => VersionError::Corruption(msg),
            BackendError::Unavailable(msg) => VersionError::Unavailable(msg),
            BackendError::Config(msg) => VersionError::Unavailable(format!("misconfigured: {msg}")),
            BackendError::Serialization(msg) => VersionError::Serialization(msg),
            BackendError::Type(e) => VersionError::Type(e),
        }
    }
}
