use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vstore_types::{Commit, Hash, ObjectKind, RefKind, Reference, Tree};

use super::client::{KvClient, KvError, KvResult, LocalKvClient};
use super::config::KvConfig;
use crate::error::{BackendError, BackendResult};
use crate::memory::hasher_for;
use crate::traits::{Backend, ReferenceIter};

/// Stored form of a reference in the refs table, keyed by name.
#[derive(Debug, Serialize, Deserialize)]
struct RefRecord {
    kind: RefKind,
    hash: Hash,
}

impl RefRecord {
    fn encode(&self) -> BackendResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| BackendError::Serialization(e.to_string()))
    }

    fn decode(name: &str, bytes: &[u8]) -> BackendResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| BackendError::Serialization(format!("reference {name}: {e}")))
    }
}

/// A [`Backend`] over a distributed key-value service.
///
/// Objects live in three tables keyed by hex hash, references in a fourth
/// keyed by name. Only single-key conditional writes are used, so every
/// reference update is a per-key compare-and-swap.
pub struct KvBackend {
    client: Arc<dyn KvClient>,
    config: KvConfig,
}

impl KvBackend {
    /// Connect to the tables described by `config` through `client`.
    ///
    /// Missing tables are created when `initialize` is set and are a
    /// configuration error otherwise.
    pub fn open(client: Arc<dyn KvClient>, config: KvConfig) -> BackendResult<Self> {
        config.validate()?;
        let backend = Self { client, config };
        backend.ensure_tables()?;
        info!(
            region = %backend.config.region,
            endpoint = backend.config.endpoint.as_deref().unwrap_or("local"),
            "opened key-value backend"
        );
        Ok(backend)
    }

    /// Open on a fresh in-process client. Only valid without an endpoint.
    pub fn local(config: KvConfig) -> BackendResult<Self> {
        if let Some(endpoint) = &config.endpoint {
            return Err(BackendError::Config(format!(
                "endpoint {endpoint} is configured but no client was supplied"
            )));
        }
        Self::open(Arc::new(LocalKvClient::new()), config)
    }

    pub fn config(&self) -> &KvConfig {
        &self.config
    }

    fn ensure_tables(&self) -> BackendResult<()> {
        for table in self.config.tables() {
            if self.retrying("table_exists", |c| c.table_exists(table))? {
                continue;
            }
            if !self.config.initialize {
                return Err(BackendError::Config(format!(
                    "table {table} does not exist and initialize is off"
                )));
            }
            self.retrying("create_table", |c| c.create_table(table))?;
            info!(table, "created key-value table");
        }
        Ok(())
    }

    /// Run an idempotent call, retrying transient failures with a fixed
    /// backoff up to `read_attempts` times.
    fn retrying<T>(
        &self,
        op: &'static str,
        mut call: impl FnMut(&dyn KvClient) -> KvResult<T>,
    ) -> BackendResult<T> {
        let attempts = self.config.read_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call(self.client.as_ref()) {
                Ok(value) => return Ok(value),
                Err(KvError::Transient(msg)) if attempt < attempts => {
                    warn!(op, attempt, error = %msg, "transient key-value error, retrying");
                    thread::sleep(self.config.retry_backoff());
                    attempt += 1;
                }
                Err(KvError::Transient(msg)) => {
                    return Err(BackendError::Unavailable(format!(
                        "{op} failed after {attempts} attempts: {msg}"
                    )))
                }
                Err(e) => return Err(map_kv_error(op, e)),
            }
        }
    }

    /// Run a conditional reference write exactly once.
    fn once<T>(
        &self,
        op: &'static str,
        call: impl FnOnce(&dyn KvClient) -> KvResult<T>,
    ) -> BackendResult<T> {
        call(self.client.as_ref()).map_err(|e| map_kv_error(op, e))
    }

    fn table(&self, kind: ObjectKind) -> &str {
        match kind {
            ObjectKind::Content => &self.config.value_table,
            ObjectKind::Tree => &self.config.tree_table,
            ObjectKind::Commit => &self.config.commit_table,
        }
    }

    fn put_object(&self, kind: ObjectKind, bytes: &[u8]) -> BackendResult<Hash> {
        let hash = hasher_for(kind).hash(bytes);
        let table = self.table(kind);
        let key = hash.to_hex();
        if self.retrying("put_object", |c| c.put_if_absent(table, &key, bytes))? {
            debug!(kind = %kind, hash = %hash, size = bytes.len(), "stored object");
            return Ok(hash);
        }
        let existing = self.retrying("get_object", |c| c.get(table, &key))?;
        if existing.as_deref() != Some(bytes) {
            return Err(BackendError::Corruption(format!(
                "{kind} {hash} already stored with different bytes"
            )));
        }
        Ok(hash)
    }

    fn get_object(&self, kind: ObjectKind, hash: &Hash) -> BackendResult<Vec<u8>> {
        let table = self.table(kind);
        let key = hash.to_hex();
        let bytes = self
            .retrying("get_object", |c| c.get(table, &key))?
            .ok_or(BackendError::NotFound { kind, hash: *hash })?;
        if !hasher_for(kind).verify(&bytes, hash) {
            return Err(BackendError::Corruption(format!(
                "{kind} {hash} does not match its stored bytes"
            )));
        }
        Ok(bytes)
    }

    fn read_ref(&self, name: &str) -> BackendResult<Option<(Vec<u8>, RefRecord)>> {
        let table = self.config.ref_table.as_str();
        match self.retrying("get_reference", |c| c.get(table, name))? {
            Some(bytes) => {
                let record = RefRecord::decode(name, &bytes)?;
                Ok(Some((bytes, record)))
            }
            None => Ok(None),
        }
    }

    /// Best-effort read of `name` for a conflict report. A failed read
    /// leaves the conflict's `actual` empty.
    fn current_hash(&self, name: &str) -> Option<Hash> {
        match self.read_ref(name) {
            Ok(found) => found.map(|(_, record)| record.hash),
            Err(e) => {
                debug!(reference = name, error = %e, "could not read reference after failed update");
                None
            }
        }
    }
}

fn map_kv_error(op: &str, err: KvError) -> BackendError {
    match err {
        KvError::Transient(msg) | KvError::Fatal(msg) => {
            BackendError::Unavailable(format!("{op}: {msg}"))
        }
        KvError::TableMissing(table) => {
            BackendError::Config(format!("{op}: table {table} does not exist"))
        }
    }
}

impl Backend for KvBackend {
    fn name(&self) -> &'static str {
        "distributed-kv"
    }

    fn get_content(&self, hash: &Hash) -> BackendResult<Vec<u8>> {
        self.get_object(ObjectKind::Content, hash)
    }

    fn put_content(&self, data: &[u8]) -> BackendResult<Hash> {
        self.put_object(ObjectKind::Content, data)
    }

    fn get_tree(&self, hash: &Hash) -> BackendResult<Tree> {
        Ok(Tree::from_bytes(&self.get_object(ObjectKind::Tree, hash)?)?)
    }

    fn put_tree(&self, tree: &Tree) -> BackendResult<Hash> {
        self.put_object(ObjectKind::Tree, &tree.to_bytes()?)
    }

    fn get_commit(&self, hash: &Hash) -> BackendResult<Commit> {
        Ok(Commit::from_bytes(&self.get_object(ObjectKind::Commit, hash)?)?)
    }

    fn put_commit(&self, commit: &Commit) -> BackendResult<Hash> {
        self.put_object(ObjectKind::Commit, &commit.to_bytes()?)
    }

    fn get_reference(&self, name: &str) -> BackendResult<Reference> {
        let (_, record) = self
            .read_ref(name)?
            .ok_or_else(|| BackendError::ReferenceNotFound(name.to_string()))?;
        Ok(Reference::new(name, record.kind, record.hash))
    }

    fn create_reference(
        &self,
        name: &str,
        kind: RefKind,
        hash: &Hash,
    ) -> BackendResult<Reference> {
        let bytes = RefRecord { kind, hash: *hash }.encode()?;
        let table = self.config.ref_table.as_str();
        if !self.once("create_reference", |c| c.put_if_absent(table, name, &bytes))? {
            return Err(BackendError::AlreadyExists(name.to_string()));
        }
        Ok(Reference::new(name, kind, *hash))
    }

    fn cas_reference(&self, name: &str, expected: &Hash, new: &Hash) -> BackendResult<()> {
        let (current_bytes, current) = self
            .read_ref(name)?
            .ok_or_else(|| BackendError::ReferenceNotFound(name.to_string()))?;
        if current.hash != *expected {
            return Err(BackendError::Conflict {
                name: name.to_string(),
                expected: *expected,
                actual: Some(current.hash),
            });
        }
        let next = RefRecord {
            kind: current.kind,
            hash: *new,
        }
        .encode()?;
        let table = self.config.ref_table.as_str();
        debug!(reference = name, from = %expected, to = %new, "conditional reference update");
        if !self.once("cas_reference", |c| {
            c.put_if_equals(table, name, &current_bytes, &next)
        })? {
            return Err(BackendError::Conflict {
                name: name.to_string(),
                expected: *expected,
                actual: self.current_hash(name),
            });
        }
        Ok(())
    }

    fn delete_reference(&self, name: &str, expected: &Hash) -> BackendResult<()> {
        let (current_bytes, current) = self
            .read_ref(name)?
            .ok_or_else(|| BackendError::ReferenceNotFound(name.to_string()))?;
        if current.hash != *expected {
            return Err(BackendError::Conflict {
                name: name.to_string(),
                expected: *expected,
                actual: Some(current.hash),
            });
        }
        let table = self.config.ref_table.as_str();
        if !self.once("delete_reference", |c| {
            c.delete_if_equals(table, name, &current_bytes)
        })? {
            return Err(BackendError::Conflict {
                name: name.to_string(),
                expected: *expected,
                actual: self.current_hash(name),
            });
        }
        Ok(())
    }

    fn list_references(&self) -> BackendResult<ReferenceIter<'_>> {
        Ok(Box::new(RefPager {
            backend: self,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
        }))
    }
}

/// Pages through the refs table `page_size` items at a time.
struct RefPager<'a> {
    backend: &'a KvBackend,
    buffer: VecDeque<(String, Vec<u8>)>,
    cursor: Option<String>,
    exhausted: bool,
}

impl RefPager<'_> {
    fn fetch_page(&mut self) -> BackendResult<()> {
        let table = self.backend.config.ref_table.as_str();
        let limit = self.backend.config.page_size;
        let cursor = self.cursor.as_deref();
        let page = self
            .backend
            .retrying("scan_references", |c| c.scan(table, cursor, limit))?;
        debug!(items = page.len(), "fetched reference page");
        if page.len() < limit {
            self.exhausted = true;
        }
        if let Some((last, _)) = page.last() {
            self.cursor = Some(last.clone());
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for RefPager<'_> {
    type Item = BackendResult<Reference>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        let (name, bytes) = self.buffer.pop_front()?;
        Some(RefRecord::decode(&name, &bytes).map(|r| Reference::new(name, r.kind, r.hash)))
    }
}
