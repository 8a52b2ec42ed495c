use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vstore_backend::{GitStorage, KvConfig};
use vstore_commit::CommitSettings;
use vstore_refs::validate_reference_name;

use crate::error::{ConfigError, ConfigResult};

/// Store configuration, usually loaded from TOML.
///
/// ```toml
/// default_branch = "main"
///
/// [commit]
/// max_attempts = 5
///
/// [backend]
/// kind = "git"
///
/// [backend.git]
/// storage = "disk"
/// path = "/var/lib/vstore"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Branch created by [`VersionStore::bootstrap`](crate::VersionStore::bootstrap).
    pub default_branch: String,
    pub commit: CommitSettings,
    pub backend: BackendConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            commit: CommitSettings::default(),
            backend: BackendConfig::default(),
        }
    }
}

/// Which backend to build, plus the section for that backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub kv: Option<KvConfig>,
    pub git: Option<GitConfig>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    InMemory,
    DistributedKv,
    Git,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => write!(f, "in-memory"),
            Self::DistributedKv => write!(f, "distributed-kv"),
            Self::Git => write!(f, "git"),
        }
    }
}

/// The `[backend.git]` section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    pub storage: GitStorageKind,
    /// Repository directory, required for disk storage.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GitStorageKind {
    Disk,
    #[default]
    InMemory,
    DistributedKv,
}

impl GitConfig {
    /// Storage location for [`GitBackend::open`](vstore_backend::GitBackend::open).
    pub fn storage(&self) -> ConfigResult<GitStorage> {
        match self.storage {
            GitStorageKind::Disk => match &self.path {
                Some(path) => Ok(GitStorage::Disk { path: path.clone() }),
                None => Err(ConfigError::Invalid(
                    "git disk storage requires a path".into(),
                )),
            },
            GitStorageKind::InMemory => Ok(GitStorage::InMemory),
            GitStorageKind::DistributedKv => Err(ConfigError::Unsupported(
                "git storage on the distributed key-value store".into(),
            )),
        }
    }
}

impl StoreConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading store configuration");
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// A configuration for the given backend kind with default sections.
    pub fn for_kind(kind: BackendKind) -> Self {
        let backend = match kind {
            BackendKind::InMemory => BackendConfig::default(),
            BackendKind::DistributedKv => BackendConfig {
                kind,
                kv: Some(KvConfig::default()),
                git: None,
            },
            BackendKind::Git => BackendConfig {
                kind,
                kv: None,
                git: Some(GitConfig::default()),
            },
        };
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Check the configuration before any backend is built.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_reference_name(&self.default_branch)
            .map_err(|e| ConfigError::Invalid(format!("default_branch: {e}")))?;
        if self.commit.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "commit.max_attempts must be at least 1".into(),
            ));
        }

        let backend = &self.backend;
        let kind = backend.kind.to_string();
        match backend.kind {
            BackendKind::InMemory => {
                reject_section(backend.kv.is_some(), &kind, "kv")?;
                reject_section(backend.git.is_some(), &kind, "git")?;
            }
            BackendKind::DistributedKv => {
                reject_section(backend.git.is_some(), &kind, "git")?;
                let kv = backend.kv.as_ref().ok_or(ConfigError::MissingSection {
                    kind: kind.clone(),
                    section: "kv",
                })?;
                kv.validate()?;
            }
            BackendKind::Git => {
                reject_section(backend.kv.is_some(), &kind, "kv")?;
                let git = backend.git.as_ref().ok_or(ConfigError::MissingSection {
                    kind: kind.clone(),
                    section: "git",
                })?;
                git.storage()?;
            }
        }
        Ok(())
    }
}

fn reject_section(present: bool, kind: &str, section: &'static str) -> ConfigResult<()> {
    if present {
        Err(ConfigError::MismatchedSection {
            kind: kind.to_string(),
            section,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = StoreConfig::default();
        assert_eq!(c.default_branch, "main");
        assert_eq!(c.backend.kind, BackendKind::InMemory);
        assert_eq!(c.commit.max_attempts, 5);
        c.validate().unwrap();
    }

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(StoreConfig::from_toml_str("").unwrap(), StoreConfig::default());
    }

    #[test]
    fn parses_kv_section() {
        let c = StoreConfig::from_toml_str(
            r#"
            default_branch = "trunk"

            [commit]
            max_attempts = 2
            allow_empty = false

            [backend]
            kind = "distributed-kv"

            [backend.kv]
            region = "eu-central-1"
            endpoint = "http://localhost:8000"
            initialize = false
            ref_table = "refs"
            page_size = 10
            "#,
        )
        .unwrap();
        assert_eq!(c.default_branch, "trunk");
        assert_eq!(c.commit.max_attempts, 2);
        assert!(!c.commit.allow_empty);
        let kv = c.backend.kv.unwrap();
        assert_eq!(kv.region, "eu-central-1");
        assert_eq!(kv.endpoint.as_deref(), Some("http://localhost:8000"));
        assert_eq!(kv.ref_table, "refs");
        assert_eq!(kv.tree_table, "vstore_trees");
        assert_eq!(kv.page_size, 10);
    }

    #[test]
    fn parses_git_disk_section() {
        let c = StoreConfig::from_toml_str(
            r#"
            [backend]
            kind = "git"

            [backend.git]
            storage = "disk"
            path = "/var/lib/vstore"
            "#,
        )
        .unwrap();
        assert_eq!(
            c.backend.git.unwrap().storage().unwrap(),
            GitStorage::Disk {
                path: PathBuf::from("/var/lib/vstore")
            }
        );
    }

    #[test]
    fn for_kind_builds_valid_configs() {
        for kind in [BackendKind::InMemory, BackendKind::DistributedKv, BackendKind::Git] {
            let c = StoreConfig::for_kind(kind);
            assert_eq!(c.backend.kind, kind);
            c.validate().unwrap();
        }
    }

    // ---- Validation ----

    #[test]
    fn rejects_missing_section() {
        let mut c = StoreConfig::for_kind(BackendKind::Git);
        c.backend.git = None;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::MissingSection { section: "git", .. })
        ));
        let mut c = StoreConfig::for_kind(BackendKind::DistributedKv);
        c.backend.kv = None;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::MissingSection { section: "kv", .. })
        ));
    }

    #[test]
    fn rejects_section_for_other_kind() {
        let mut c = StoreConfig::for_kind(BackendKind::Git);
        c.backend.kv = Some(KvConfig::default());
        assert!(matches!(
            c.validate(),
            Err(ConfigError::MismatchedSection { section: "kv", .. })
        ));
        let mut c = StoreConfig::default();
        c.backend.git = Some(GitConfig::default());
        assert!(matches!(
            c.validate(),
            Err(ConfigError::MismatchedSection { section: "git", .. })
        ));
    }

    #[test]
    fn rejects_git_disk_without_path() {
        let err = StoreConfig::from_toml_str(
            r#"
            [backend]
            kind = "git"
            [backend.git]
            storage = "disk"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_git_over_kv() {
        let err = StoreConfig::from_toml_str(
            r#"
            [backend]
            kind = "git"
            [backend.git]
            storage = "distributed-kv"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported(_)));
    }

    #[test]
    fn rejects_bad_kv_settings() {
        let mut c = StoreConfig::for_kind(BackendKind::DistributedKv);
        if let Some(kv) = c.backend.kv.as_mut() {
            kv.endpoint = Some("not a url".into());
        }
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

        let mut c = StoreConfig::for_kind(BackendKind::DistributedKv);
        if let Some(kv) = c.backend.kv.as_mut() {
            kv.tree_table = kv.ref_table.clone();
        }
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_invalid_default_branch_and_attempts() {
        let mut c = StoreConfig::default();
        c.default_branch = "bad..name".into();
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

        let mut c = StoreConfig::default();
        c.commit.max_attempts = 0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_fields_and_kinds() {
        assert!(matches!(
            StoreConfig::from_toml_str("colour = \"blue\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str("[backend]\nkind = \"cassandra\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vstore.toml");
        std::fs::write(&path, "default_branch = \"trunk\"\n").unwrap();
        assert_eq!(StoreConfig::load(&path).unwrap().default_branch, "trunk");
        assert!(matches!(
            StoreConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
