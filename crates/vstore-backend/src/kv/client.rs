use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

/// Errors reported by a [`KvClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KvError {
    /// Throttling, timeouts, dropped connections. Worth retrying when the
    /// operation is idempotent.
    #[error("transient: {0}")]
    Transient(String),

    /// Anything that will not succeed on retry.
    #[error("fatal: {0}")]
    Fatal(String),

    /// The named table does not exist.
    #[error("table missing: {0}")]
    TableMissing(String),
}

/// Result alias for key-value client calls.
pub type KvResult<T> = Result<T, KvError>;

/// The primitives a distributed key-value service must offer.
///
/// Every conditional write is atomic for a single key. Nothing spans keys.
pub trait KvClient: Send + Sync {
    /// Read one item.
    fn get(&self, table: &str, key: &str) -> KvResult<Option<Vec<u8>>>;

    /// Write an item only if the key is absent. Returns `false` if it existed.
    fn put_if_absent(&self, table: &str, key: &str, value: &[u8]) -> KvResult<bool>;

    /// Replace an item only if its current value equals `expected`.
    /// Returns `false` if the condition failed (including a missing key).
    fn put_if_equals(&self, table: &str, key: &str, expected: &[u8], value: &[u8])
        -> KvResult<bool>;

    /// Delete an item only if its current value equals `expected`.
    fn delete_if_equals(&self, table: &str, key: &str, expected: &[u8]) -> KvResult<bool>;

    /// Up to `limit` items in key order, strictly after `start_after`.
    fn scan(
        &self,
        table: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> KvResult<Vec<(String, Vec<u8>)>>;

    /// Create a table. Creating an existing table is a no-op.
    fn create_table(&self, table: &str) -> KvResult<()>;

    /// Check whether a table exists.
    fn table_exists(&self, table: &str) -> KvResult<bool>;
}

type Table = BTreeMap<String, Vec<u8>>;

/// An in-process [`KvClient`]: ordered maps behind a mutex.
///
/// Used when no endpoint is configured, and in tests.
#[derive(Debug, Default)]
pub struct LocalKvClient {
    tables: Mutex<BTreeMap<String, Table>>,
}

impl LocalKvClient {
    /// Create a client with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> KvResult<MutexGuard<'_, BTreeMap<String, Table>>> {
        self.tables
            .lock()
            .map_err(|e| KvError::Fatal(format!("lock poisoned: {e}")))
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&mut Table) -> T) -> KvResult<T> {
        let mut tables = self.lock()?;
        let t = tables
            .get_mut(table)
            .ok_or_else(|| KvError::TableMissing(table.to_string()))?;
        Ok(f(t))
    }
}

impl KvClient for LocalKvClient {
    fn get(&self, table: &str, key: &str) -> KvResult<Option<Vec<u8>>> {
        self.with_table(table, |t| t.get(key).cloned())
    }

    fn put_if_absent(&self, table: &str, key: &str, value: &[u8]) -> KvResult<bool> {
        self.with_table(table, |t| {
            if t.contains_key(key) {
                false
            } else {
                t.insert(key.to_string(), value.to_vec());
                true
            }
        })
    }

    fn put_if_equals(
        &self,
        table: &str,
        key: &str,
        expected: &[u8],
        value: &[u8],
    ) -> KvResult<bool> {
        self.with_table(table, |t| match t.get_mut(key) {
            Some(current) if current.as_slice() == expected => {
                *current = value.to_vec();
                true
            }
            _ => false,
        })
    }

    fn delete_if_equals(&self, table: &str, key: &str, expected: &[u8]) -> KvResult<bool> {
        self.with_table(table, |t| {
            if t.get(key).is_some_and(|current| current.as_slice() == expected) {
                t.remove(key);
                true
            } else {
                false
            }
        })
    }

    fn scan(
        &self,
        table: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> KvResult<Vec<(String, Vec<u8>)>> {
        self.with_table(table, |t| {
            let lower = match start_after {
                Some(k) => Bound::Excluded(k.to_string()),
                None => Bound::Unbounded,
            };
            t.range((lower, Bound::Unbounded))
                .take(limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    fn create_table(&self, table: &str) -> KvResult<()> {
        self.lock()?.entry(table.to_string()).or_default();
        Ok(())
    }

    fn table_exists(&self, table: &str) -> KvResult<bool> {
        Ok(self.lock()?.contains_key(table))
    }
}
