use thiserror::Error;
use vstore_backend::BackendError;

/// Errors raised while loading a configuration or constructing a store.
///
/// Once a store is built, operations report [`vstore_types::VersionError`]
/// instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("backend kind {kind} requires a [backend.{section}] section")]
    MissingSection { kind: String, section: &'static str },

    #[error("[backend.{section}] section does not apply to backend kind {kind}")]
    MismatchedSection { kind: String, section: &'static str },

    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("backend construction failed: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for ConfigError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Config(msg) => Self::Invalid(msg),
            other => Self::Backend(other),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
