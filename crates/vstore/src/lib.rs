//! vstore: a version store for structured metadata.
//!
//! Named branches and tags point at immutable, hash-addressed commits;
//! every commit is a snapshot of a key to value mapping. Writers commit
//! concurrently with optimistic compare-and-swap on the branch head, and
//! the same store runs unchanged on an in-memory backend, a distributed
//! key-value store, or a git object database.
//!
//! # Getting started
//!
//! ```
//! use vstore::{CommitMeta, Content, Operation, TableStoreWorker, VersionStore};
//!
//! let store = VersionStore::builder(TableStoreWorker).build().unwrap();
//! store.bootstrap().unwrap();
//!
//! let key = "db.orders".parse().unwrap();
//! let table = Content::iceberg("s3://warehouse/orders/metadata/v1.json");
//! store
//!     .commit(
//!         "main",
//!         None,
//!         vec![Operation::put(key, table.clone())],
//!         &CommitMeta::new("add orders"),
//!     )
//!     .unwrap();
//! assert_eq!(store.get_value("main", &"db.orders".parse().unwrap()).unwrap(), table);
//! ```
//!
//! # Modules
//!
//! - [`config`] -- [`StoreConfig`], TOML loading and validation
//! - [`worker`] -- [`StoreWorker`] value and metadata codecs
//! - [`store`] -- the [`VersionStore`] facade

pub mod config;
pub mod error;
pub mod store;
pub mod worker;

pub use config::{BackendConfig, BackendKind, GitConfig, GitStorageKind, StoreConfig};
pub use error::{ConfigError, ConfigResult};
pub use store::{Log, LogEntry, Operation, VersionStore, VersionStoreBuilder};
pub use worker::{CommitMeta, Content, SqlDialect, StoreWorker, TableStoreWorker};

pub use vstore_backend::{Backend, GitBackend, InMemoryBackend, KvBackend, KvClient, KvConfig};
pub use vstore_merge::MergeOutcome;
pub use vstore_tree::{ChangeKind, DiffEntry};
pub use vstore_types::{
    ConflictSet, ErrorKind, Hash, Key, KeyConflict, RefKind, Reference, VersionError,
    VersionResult,
};
