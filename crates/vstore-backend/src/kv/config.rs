use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BackendError, BackendResult};

/// Connection and table settings for [`KvBackend`](super::KvBackend).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KvConfig {
    /// Service endpoint. `None` selects the in-process client.
    pub endpoint: Option<String>,
    /// Service region.
    pub region: String,
    /// Create missing tables at startup instead of failing.
    pub initialize: bool,
    pub ref_table: String,
    pub tree_table: String,
    pub value_table: String,
    pub commit_table: String,
    /// Attempts for idempotent operations before giving up.
    pub read_attempts: u32,
    /// Fixed pause between attempts.
    pub retry_backoff_ms: u64,
    /// Items fetched per scan while listing references.
    pub page_size: usize,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-west-2".to_string(),
            initialize: true,
            ref_table: "vstore_refs".to_string(),
            tree_table: "vstore_trees".to_string(),
            value_table: "vstore_values".to_string(),
            commit_table: "vstore_commits".to_string(),
            read_attempts: 3,
            retry_backoff_ms: 10,
            page_size: 100,
        }
    }
}

impl KvConfig {
    /// The four table names, refs first.
    pub fn tables(&self) -> [&str; 4] {
        [
            &self.ref_table,
            &self.tree_table,
            &self.value_table,
            &self.commit_table,
        ]
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Reject settings no backend can run with.
    pub fn validate(&self) -> BackendResult<()> {
        if let Some(endpoint) = &self.endpoint {
            Url::parse(endpoint)
                .map_err(|e| BackendError::Config(format!("invalid endpoint {endpoint:?}: {e}")))?;
        }
        if self.region.trim().is_empty() {
            return Err(BackendError::Config("region must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for table in self.tables() {
            if table.trim().is_empty() {
                return Err(BackendError::Config("table names must not be empty".into()));
            }
            if !seen.insert(table) {
                return Err(BackendError::Config(format!(
                    "table {table:?} is configured twice"
                )));
            }
        }
        if self.read_attempts == 0 {
            return Err(BackendError::Config("read_attempts must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(BackendError::Config("page_size must be at least 1".into()));
        }
        Ok(())
    }
}
