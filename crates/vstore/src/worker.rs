//! Codecs between application values and stored bytes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vstore_types::{VersionError, VersionResult};

/// Encodes values and commit metadata for storage.
///
/// Encodings must be deterministic: equal values produce equal bytes, so
/// they hash to the same content.
pub trait StoreWorker: Send + Sync {
    type Value;
    type Meta;

    fn encode_value(&self, value: &Self::Value) -> VersionResult<Vec<u8>>;
    fn decode_value(&self, bytes: &[u8]) -> VersionResult<Self::Value>;
    fn encode_meta(&self, meta: &Self::Meta) -> VersionResult<Vec<u8>>;
    fn decode_meta(&self, bytes: &[u8]) -> VersionResult<Self::Meta>;
}

/// SQL dialect of a view definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlDialect {
    Hive,
    Spark,
    Dremio,
    Presto,
}

/// A catalog entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Content {
    /// An Iceberg table, identified by its current metadata file.
    IcebergTable { metadata_location: String },
    /// A Delta Lake table and its log history.
    DeltaLakeTable {
        metadata_location_history: Vec<String>,
        checkpoint_location_history: Vec<String>,
        last_checkpoint: Option<String>,
    },
    /// A SQL view.
    SqlView { sql_text: String, dialect: SqlDialect },
}

impl Content {
    pub fn iceberg(metadata_location: impl Into<String>) -> Self {
        Self::IcebergTable {
            metadata_location: metadata_location.into(),
        }
    }

    pub fn view(sql_text: impl Into<String>, dialect: SqlDialect) -> Self {
        Self::SqlView {
            sql_text: sql_text.into(),
            dialect,
        }
    }
}

/// Commit metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMeta {
    pub author: Option<String>,
    pub committer: Option<String>,
    pub message: String,
    pub commit_time: DateTime<Utc>,
    /// Free-form properties. Ordered so the encoding is stable.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl CommitMeta {
    /// Metadata stamped with the current time.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            author: None,
            committer: None,
            message: message.into(),
            commit_time: Utc::now(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_committer(mut self, committer: impl Into<String>) -> Self {
        self.committer = Some(committer.into());
        self
    }

    pub fn with_commit_time(mut self, time: DateTime<Utc>) -> Self {
        self.commit_time = time;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// JSON codec for [`Content`] values and [`CommitMeta`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TableStoreWorker;

fn encode<T: Serialize>(what: &str, value: &T) -> VersionResult<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| VersionError::Serialization(format!("encode {what}: {e}")))
}

fn decode<T: for<'de> Deserialize<'de>>(what: &str, bytes: &[u8]) -> VersionResult<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| VersionError::Serialization(format!("decode {what}: {e}")))
}

impl StoreWorker for TableStoreWorker {
    type Value = Content;
    type Meta = CommitMeta;

    fn encode_value(&self, value: &Content) -> VersionResult<Vec<u8>> {
        encode("content", value)
    }

    fn decode_value(&self, bytes: &[u8]) -> VersionResult<Content> {
        decode("content", bytes)
    }

    fn encode_meta(&self, meta: &CommitMeta) -> VersionResult<Vec<u8>> {
        encode("commit metadata", meta)
    }

    fn decode_meta(&self, bytes: &[u8]) -> VersionResult<CommitMeta> {
        decode("commit metadata", bytes)
    }
}
