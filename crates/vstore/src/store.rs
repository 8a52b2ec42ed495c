use std::sync::Arc;

use tracing::{debug, info};
use vstore_backend::{Backend, GitBackend, InMemoryBackend, KvBackend, KvClient};
use vstore_commit::{CommitEngine, CommitRequest, CommitSettings};
use vstore_merge::{history, History, MergeEngine, MergeOutcome, MergeRequest, TransplantRequest};
use vstore_refs::ReferenceManager;
use vstore_tree::{diff, load_tree, DiffEntry};
use vstore_types::{Hash, Key, Mutation, RefKind, Reference, VersionError, VersionResult};

use crate::config::{BackendKind, StoreConfig};
use crate::error::{ConfigError, ConfigResult};
use crate::worker::StoreWorker;

/// A change to one key, carrying a decoded value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation<V> {
    Put { key: Key, value: V },
    Delete { key: Key },
}

impl<V> Operation<V> {
    pub fn put(key: Key, value: V) -> Self {
        Self::Put { key, value }
    }

    pub fn delete(key: Key) -> Self {
        Self::Delete { key }
    }

    pub fn key(&self) -> &Key {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// One commit in a [`Log`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry<M> {
    pub hash: Hash,
    pub parents: Vec<Hash>,
    pub metadata: M,
}

/// Lazy history of a reference, newest first, with decoded metadata.
pub struct Log<'a, W: StoreWorker> {
    walk: History<'a>,
    worker: &'a W,
}

impl<W: StoreWorker> Iterator for Log<'_, W> {
    type Item = VersionResult<LogEntry<W::Meta>>;

    fn next(&mut self) -> Option<Self::Item> {
        let (hash, commit) = match self.walk.next()? {
            Ok(step) => step,
            Err(e) => return Some(Err(e)),
        };
        Some(
            self.worker
                .decode_meta(&commit.metadata)
                .map(|metadata| LogEntry {
                    hash,
                    parents: commit.parents,
                    metadata,
                }),
        )
    }
}

/// Builds a [`VersionStore`] from a [`StoreConfig`].
pub struct VersionStoreBuilder<W> {
    worker: W,
    config: StoreConfig,
    kv_client: Option<Arc<dyn KvClient>>,
    backend: Option<Arc<dyn Backend>>,
}

impl<W: StoreWorker> VersionStoreBuilder<W> {
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Client for the distributed key-value backend. Required when the
    /// configuration names an endpoint.
    pub fn with_kv_client(mut self, client: Arc<dyn KvClient>) -> Self {
        self.kv_client = Some(client);
        self
    }

    /// Use an existing backend instead of building one from the
    /// configuration. Several stores may share one backend.
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validate the configuration and open the backend.
    pub fn build(self) -> ConfigResult<VersionStore<W>> {
        self.config.validate()?;
        let backend = match self.backend {
            Some(backend) => backend,
            None => open_backend(&self.config, self.kv_client)?,
        };
        info!(
            backend = backend.name(),
            default_branch = %self.config.default_branch,
            "opened version store"
        );
        Ok(VersionStore {
            backend,
            worker: self.worker,
            settings: self.config.commit,
            default_branch: self.config.default_branch,
        })
    }
}

fn open_backend(
    config: &StoreConfig,
    kv_client: Option<Arc<dyn KvClient>>,
) -> ConfigResult<Arc<dyn Backend>> {
    let section = &config.backend;
    let backend: Arc<dyn Backend> = match section.kind {
        BackendKind::InMemory => Arc::new(InMemoryBackend::new()),
        BackendKind::DistributedKv => {
            let kv = section.kv.clone().ok_or(ConfigError::MissingSection {
                kind: section.kind.to_string(),
                section: "kv",
            })?;
            match kv_client {
                Some(client) => Arc::new(KvBackend::open(client, kv)?),
                // Fails for a configured endpoint: no client to reach it with.
                None => Arc::new(KvBackend::local(kv)?),
            }
        }
        BackendKind::Git => {
            let git = section.git.as_ref().ok_or(ConfigError::MissingSection {
                kind: section.kind.to_string(),
                section: "git",
            })?;
            Arc::new(GitBackend::open(&git.storage()?)?)
        }
    };
    Ok(backend)
}

/// The version store facade.
///
/// Every operation is independent and may run concurrently with others on
/// the same or another store sharing the backend. Only single-reference
/// updates are atomic.
pub struct VersionStore<W: StoreWorker> {
    backend: Arc<dyn Backend>,
    worker: W,
    settings: CommitSettings,
    default_branch: String,
}

impl<W: StoreWorker> VersionStore<W> {
    /// Start building a store. Without further configuration it runs on a
    /// fresh in-memory backend.
    pub fn builder(worker: W) -> VersionStoreBuilder<W> {
        VersionStoreBuilder {
            worker,
            config: StoreConfig::default(),
            kv_client: None,
            backend: None,
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn worker(&self) -> &W {
        &self.worker
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    fn refs(&self) -> ReferenceManager<'_> {
        ReferenceManager::new(self.backend.as_ref())
    }

    fn head(&self, reference: &str) -> VersionResult<Hash> {
        Ok(self.backend.get_reference(reference)?.hash)
    }

    // ---- References ----

    /// Create a branch at `from`, or at the root commit.
    pub fn create_branch(&self, name: &str, from: Option<Hash>) -> VersionResult<Reference> {
        self.refs().create(name, RefKind::Branch, from)
    }

    pub fn create_tag(&self, name: &str, target: Hash) -> VersionResult<Reference> {
        self.refs().create(name, RefKind::Tag, Some(target))
    }

    pub fn get_reference(&self, name: &str) -> VersionResult<Reference> {
        self.refs().get(name)
    }

    pub fn list_references(&self) -> VersionResult<Vec<Reference>> {
        self.refs().list()
    }

    /// Point the branch `name` at any existing commit, if it is still at
    /// `expected`.
    pub fn assign_reference(
        &self,
        name: &str,
        expected: &Hash,
        target: &Hash,
    ) -> VersionResult<Reference> {
        self.refs().assign(name, expected, target)
    }

    pub fn delete_reference(&self, name: &str, expected: &Hash) -> VersionResult<()> {
        self.refs().delete(name, expected)
    }

    /// Create the default branch if the store has no references yet.
    pub fn bootstrap(&self) -> VersionResult<Option<Reference>> {
        self.refs().bootstrap(&self.default_branch)
    }

    // ---- Reads ----

    /// Value stored at `key` on `reference`.
    pub fn get_value(&self, reference: &str, key: &Key) -> VersionResult<W::Value> {
        let tree = load_tree(self.backend.as_ref(), &self.head(reference)?)?;
        let hash = tree.get(key).ok_or_else(|| VersionError::KeyNotFound {
            reference: reference.to_string(),
            key: key.clone(),
        })?;
        self.worker.decode_value(&self.backend.get_content(hash)?)
    }

    /// Values at several keys from one snapshot. Absent keys are `None`.
    pub fn get_values(
        &self,
        reference: &str,
        keys: &[Key],
    ) -> VersionResult<Vec<Option<W::Value>>> {
        let tree = load_tree(self.backend.as_ref(), &self.head(reference)?)?;
        keys.iter()
            .map(|key| match tree.get(key) {
                Some(hash) => self
                    .worker
                    .decode_value(&self.backend.get_content(hash)?)
                    .map(Some),
                None => Ok(None),
            })
            .collect()
    }

    /// Every key present on `reference`, sorted.
    pub fn keys(&self, reference: &str) -> VersionResult<Vec<Key>> {
        let tree = load_tree(self.backend.as_ref(), &self.head(reference)?)?;
        Ok(tree.keys().cloned().collect())
    }

    /// Key-level differences going from `from` to `to`.
    pub fn diff(&self, from: &str, to: &str) -> VersionResult<Vec<DiffEntry>> {
        let backend = self.backend.as_ref();
        let a = load_tree(backend, &self.head(from)?)?;
        let b = load_tree(backend, &self.head(to)?)?;
        Ok(diff(&a, &b))
    }

    /// History of `reference`, newest first, excluding the root commit.
    pub fn history(&self, reference: &str) -> VersionResult<Log<'_, W>> {
        let head = self.head(reference)?;
        Ok(Log {
            walk: history(self.backend.as_ref(), &head),
            worker: &self.worker,
        })
    }

    // ---- Writes ----

    /// Commit `operations` onto `branch`.
    ///
    /// With `expected_head` the commit only lands if the branch is still at
    /// that hash. Without it, concurrent commits are retried against the
    /// new head.
    pub fn commit(
        &self,
        branch: &str,
        expected_head: Option<Hash>,
        operations: Vec<Operation<W::Value>>,
        meta: &W::Meta,
    ) -> VersionResult<Hash> {
        let mutations = operations
            .into_iter()
            .map(|op| match op {
                Operation::Put { key, value } => {
                    Ok(Mutation::put(key, self.worker.encode_value(&value)?))
                }
                Operation::Delete { key } => Ok(Mutation::delete(key)),
            })
            .collect::<VersionResult<Vec<_>>>()?;
        let mut request = CommitRequest::new(branch, self.worker.encode_meta(meta)?)
            .with_mutations(mutations);
        if let Some(head) = expected_head {
            request = request.with_expected_head(head);
        }
        debug!(branch, operations = request.mutations.len(), "committing");
        CommitEngine::new(self.backend.as_ref(), self.settings.clone()).commit(&request)
    }

    /// Merge `source` into the branch `target`.
    pub fn merge(&self, source: &str, target: &str, meta: &W::Meta) -> VersionResult<MergeOutcome> {
        let request = MergeRequest::new(source, target, self.worker.encode_meta(meta)?);
        MergeEngine::new(self.backend.as_ref()).merge(&request)
    }

    /// Replay `commits`, oldest first, onto the branch `onto`.
    pub fn transplant(
        &self,
        onto: &str,
        expected_head: Option<Hash>,
        commits: Vec<Hash>,
    ) -> VersionResult<Hash> {
        let mut request = TransplantRequest::new(onto, commits);
        if let Some(head) = expected_head {
            request = request.with_expected_head(head);
        }
        MergeEngine::new(self.backend.as_ref()).transplant(&request)
    }

    /// Release this store's handle on the backend.
    pub fn close(self) {
        info!(backend = self.backend.name(), "closing version store");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use chrono::{TimeZone, Utc};
    use vstore_backend::{KvConfig, LocalKvClient};
    use vstore_tree::ChangeKind;

    use super::*;
    use crate::config::{GitConfig, GitStorageKind};
    use crate::worker::{CommitMeta, Content, SqlDialect, TableStoreWorker};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    fn key(s: &str) -> Key {
        s.parse().unwrap()
    }

    fn table(v: &str) -> Content {
        Content::iceberg(format!("s3://warehouse/{v}.json"))
    }

    fn meta(message: &str) -> CommitMeta {
        CommitMeta::new(message)
            .with_author("test")
            .with_commit_time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    fn store(config: StoreConfig) -> VersionStore<TableStoreWorker> {
        init_tracing();
        let store = VersionStore::builder(TableStoreWorker)
            .with_config(config)
            .build()
            .unwrap();
        store.bootstrap().unwrap();
        store
    }

    fn memory_store() -> VersionStore<TableStoreWorker> {
        store(StoreConfig::default())
    }

    fn put(store: &VersionStore<TableStoreWorker>, branch: &str, k: &str, v: &str) -> Hash {
        store
            .commit(
                branch,
                None,
                vec![Operation::put(key(k), table(v))],
                &meta(&format!("set {k}")),
            )
            .unwrap()
    }

    /// Runs the main/dev scenario: branch, diverge, merge.
    fn merge_scenario(store: &VersionStore<TableStoreWorker>) {
        let c1 = put(store, "main", "t1", "V1");
        store.create_branch("dev", Some(c1)).unwrap();
        let c2 = put(store, "dev", "t1", "V2");
        let c3 = put(store, "main", "t2", "V3");

        let outcome = store.merge("dev", "main", &meta("merge dev")).unwrap();
        let MergeOutcome::Merged(head) = outcome else {
            panic!("expected a merge commit");
        };
        assert_eq!(store.get_reference("main").unwrap().hash, head);
        assert_eq!(store.get_value("main", &key("t1")).unwrap(), table("V2"));
        assert_eq!(store.get_value("main", &key("t2")).unwrap(), table("V3"));

        let log: Vec<_> = store
            .history("main")
            .unwrap()
            .map(|entry| entry.unwrap())
            .collect();
        assert_eq!(log[0].hash, head);
        assert_eq!(log[0].parents, vec![c3, c2]);
        assert_eq!(log[0].metadata.message, "merge dev");
        assert_eq!(
            log.iter().map(|e| e.hash).collect::<Vec<_>>(),
            vec![head, c3, c1]
        );
    }

    // ---- Construction ----

    #[test]
    fn bootstrap_creates_default_branch() {
        let store = store(StoreConfig {
            default_branch: "trunk".into(),
            ..StoreConfig::default()
        });
        let refs = store.list_references().unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "trunk");
        assert!(store.history("trunk").unwrap().next().is_none());
        assert!(store.bootstrap().unwrap().is_none());
    }

    #[test]
    fn kv_endpoint_without_client_is_config_error() {
        let mut config = StoreConfig::for_kind(BackendKind::DistributedKv);
        if let Some(kv) = config.backend.kv.as_mut() {
            kv.endpoint = Some("http://localhost:8000".into());
        }
        assert!(matches!(
            VersionStore::builder(TableStoreWorker)
                .with_config(config.clone())
                .build(),
            Err(ConfigError::Invalid(_))
        ));
        let store = VersionStore::builder(TableStoreWorker)
            .with_config(config)
            .with_kv_client(Arc::new(LocalKvClient::new()))
            .build()
            .unwrap();
        assert_eq!(store.backend().name(), "distributed-kv");
    }

    #[test]
    fn missing_kv_tables_without_initialize_is_config_error() {
        let mut config = StoreConfig::for_kind(BackendKind::DistributedKv);
        config.backend.kv = Some(KvConfig {
            initialize: false,
            ..KvConfig::default()
        });
        assert!(matches!(
            VersionStore::builder(TableStoreWorker)
                .with_config(config)
                .build(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn git_over_kv_is_rejected_before_building() {
        let mut config = StoreConfig::for_kind(BackendKind::Git);
        config.backend.git = Some(GitConfig {
            storage: GitStorageKind::DistributedKv,
            path: None,
        });
        assert!(matches!(
            VersionStore::builder(TableStoreWorker)
                .with_config(config)
                .build(),
            Err(ConfigError::Unsupported(_))
        ));
    }

    // ---- Scenarios on every backend ----

    #[test]
    fn merge_scenario_in_memory() {
        merge_scenario(&memory_store());
    }

    #[test]
    fn merge_scenario_distributed_kv() {
        let store = store(StoreConfig::for_kind(BackendKind::DistributedKv));
        assert_eq!(store.backend().name(), "distributed-kv");
        merge_scenario(&store);
    }

    #[test]
    fn merge_scenario_git() {
        let store = store(StoreConfig::for_kind(BackendKind::Git));
        assert_eq!(store.backend().name(), "git");
        merge_scenario(&store);
    }

    #[test]
    fn git_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StoreConfig::for_kind(BackendKind::Git);
        config.backend.git = Some(GitConfig {
            storage: GitStorageKind::Disk,
            path: Some(dir.path().join("repo")),
        });

        let first = store(config.clone());
        let head = put(&first, "main", "db.orders", "v1");
        first.close();

        let second = store(config);
        assert_eq!(second.get_reference("main").unwrap().hash, head);
        assert_eq!(
            second.get_value("main", &key("db.orders")).unwrap(),
            table("v1")
        );
    }

    // ---- Concurrency ----

    #[test]
    fn two_callers_with_same_expected_head() {
        let store = memory_store();
        let c1 = put(&store, "main", "t1", "V1");

        let c2 = store
            .commit(
                "main",
                Some(c1),
                vec![Operation::put(key("t2"), table("V2"))],
                &meta("caller a"),
            )
            .unwrap();
        let err = store
            .commit(
                "main",
                Some(c1),
                vec![Operation::put(key("t3"), table("V3"))],
                &meta("caller b"),
            )
            .unwrap_err();
        match err {
            VersionError::ReferenceConflict { expected, actual, .. } => {
                assert_eq!(expected, Some(c1));
                assert_eq!(actual, Some(c2));
            }
            other => panic!("unexpected {other:?}"),
        }

        // Caller b refetches and tries again.
        let head = store.get_reference("main").unwrap().hash;
        let c3 = store
            .commit(
                "main",
                Some(head),
                vec![Operation::put(key("t3"), table("V3"))],
                &meta("caller b"),
            )
            .unwrap();
        let log: Vec<_> = store.history("main").unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(log[0].hash, c3);
        assert_eq!(log[0].parents, vec![c2]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn concurrent_pinned_commits_have_one_winner() {
        let store = memory_store();
        let head = store.get_reference("main").unwrap().hash;
        let barrier = Barrier::new(4);
        let results: Vec<VersionResult<Hash>> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let (store, barrier) = (&store, &barrier);
                    s.spawn(move || {
                        barrier.wait();
                        store.commit(
                            "main",
                            Some(head),
                            vec![Operation::put(key(&format!("t{i}")), table("x"))],
                            &meta("race"),
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(VersionError::is_reference_conflict));
        assert_eq!(store.history("main").unwrap().count(), 1);
    }

    #[test]
    fn stores_sharing_a_backend_see_each_other() {
        let a = memory_store();
        let b = VersionStore::builder(TableStoreWorker)
            .with_backend(Arc::clone(a.backend()))
            .build()
            .unwrap();
        assert!(b.bootstrap().unwrap().is_none());
        put(&a, "main", "t1", "V1");
        assert_eq!(b.get_value("main", &key("t1")).unwrap(), table("V1"));
    }

    // ---- Reads ----

    #[test]
    fn history_length_matches_commits() {
        let store = memory_store();
        let mut heads = Vec::new();
        for i in 0..5 {
            heads.push(put(&store, "main", "t", &format!("v{i}")));
        }
        heads.reverse();
        let log: Vec<Hash> = store
            .history("main")
            .unwrap()
            .map(|e| e.unwrap().hash)
            .collect();
        assert_eq!(log, heads);
    }

    #[test]
    fn missing_key_and_reference() {
        let store = memory_store();
        assert!(matches!(
            store.get_value("main", &key("nope")),
            Err(VersionError::KeyNotFound { .. })
        ));
        assert!(matches!(
            store.get_value("ghost", &key("t1")),
            Err(VersionError::ReferenceNotFound(_))
        ));
        assert!(store.history("ghost").is_err());
    }

    #[test]
    fn get_values_and_keys() {
        let store = memory_store();
        store
            .commit(
                "main",
                None,
                vec![
                    Operation::put(key("db.b"), table("b")),
                    Operation::put(key("db.a"), table("a")),
                    Operation::put(
                        key("db.v"),
                        Content::view("SELECT * FROM a", SqlDialect::Dremio),
                    ),
                ],
                &meta("load"),
            )
            .unwrap();
        assert_eq!(
            store.keys("main").unwrap(),
            vec![key("db.a"), key("db.b"), key("db.v")]
        );
        assert_eq!(
            store
                .get_values("main", &[key("db.b"), key("db.x"), key("db.a")])
                .unwrap(),
            vec![Some(table("b")), None, Some(table("a"))]
        );
    }

    #[test]
    fn tags_pin_a_snapshot() {
        let store = memory_store();
        let c1 = put(&store, "main", "t1", "V1");
        store.create_tag("v1", c1).unwrap();
        put(&store, "main", "t1", "V2");

        assert_eq!(store.get_value("v1", &key("t1")).unwrap(), table("V1"));
        assert!(matches!(
            store.commit("v1", None, Vec::new(), &meta("nope")),
            Err(VersionError::ImmutableReference(_))
        ));
    }

    #[test]
    fn diff_between_references() {
        let store = memory_store();
        let c1 = put(&store, "main", "t1", "V1");
        store.create_branch("dev", Some(c1)).unwrap();
        store
            .commit(
                "dev",
                None,
                vec![
                    Operation::put(key("t1"), table("V2")),
                    Operation::put(key("t2"), table("new")),
                ],
                &meta("dev"),
            )
            .unwrap();

        assert!(store.diff("main", "main").unwrap().is_empty());
        let forward = store.diff("main", "dev").unwrap();
        let kinds: Vec<_> = forward.iter().map(|e| (e.key.clone(), e.kind)).collect();
        assert_eq!(
            kinds,
            vec![(key("t1"), ChangeKind::Modified), (key("t2"), ChangeKind::Added)]
        );
        let backward = store.diff("dev", "main").unwrap();
        assert_eq!(
            backward,
            forward.iter().map(|e| e.inverse()).collect::<Vec<_>>()
        );
    }

    // ---- Writes ----

    #[test]
    fn delete_operation_removes_key() {
        let store = memory_store();
        put(&store, "main", "t1", "V1");
        store
            .commit("main", None, vec![Operation::delete(key("t1"))], &meta("drop"))
            .unwrap();
        assert!(store.keys("main").unwrap().is_empty());
    }

    #[test]
    fn merge_conflict_is_reported_not_applied() {
        let store = memory_store();
        let c1 = put(&store, "main", "t1", "V1");
        store.create_branch("dev", Some(c1)).unwrap();
        put(&store, "dev", "t1", "dev");
        let main_head = put(&store, "main", "t1", "main");

        let MergeOutcome::Conflicts(conflicts) =
            store.merge("dev", "main", &meta("merge")).unwrap()
        else {
            panic!("expected conflicts");
        };
        assert_eq!(conflicts.keys(), vec![&key("t1")]);
        assert_eq!(store.get_reference("main").unwrap().hash, main_head);
    }

    #[test]
    fn merge_into_itself_is_up_to_date() {
        let store = memory_store();
        let c1 = put(&store, "main", "t1", "V1");
        assert_eq!(
            store.merge("main", "main", &meta("noop")).unwrap(),
            MergeOutcome::UpToDate(c1)
        );
    }

    /// Main at `c` (t1 = V1), with a branch from the root merged into main
    /// after two more commits. Returns `c`.
    fn history_with_side_merge(store: &VersionStore<TableStoreWorker>) -> Hash {
        let c = put(store, "main", "t1", "V1");
        store.create_branch("side", None).unwrap();
        put(store, "side", "s", "side");
        put(store, "main", "t2", "V2");
        put(store, "main", "t3", "V3");
        assert!(matches!(
            store.merge("side", "main", &meta("merge side")).unwrap(),
            MergeOutcome::Merged(_)
        ));
        c
    }

    #[test]
    fn merged_ancestor_is_up_to_date_after_side_merge() {
        let store = memory_store();
        let c = history_with_side_merge(&store);
        store.create_branch("old", Some(c)).unwrap();
        let head = put(&store, "main", "t1", "V4");

        assert_eq!(
            store.merge("old", "main", &meta("merge old")).unwrap(),
            MergeOutcome::UpToDate(head)
        );
        assert_eq!(store.get_value("main", &key("t1")).unwrap(), table("V4"));
    }

    #[test]
    fn delete_from_branch_survives_merge_after_side_merge() {
        let store = memory_store();
        let c = history_with_side_merge(&store);
        store.create_branch("fix", Some(c)).unwrap();
        store
            .commit("fix", None, vec![Operation::delete(key("t1"))], &meta("drop t1"))
            .unwrap();

        assert!(matches!(
            store.merge("fix", "main", &meta("merge fix")).unwrap(),
            MergeOutcome::Merged(_)
        ));
        assert!(matches!(
            store.get_value("main", &key("t1")),
            Err(VersionError::KeyNotFound { .. })
        ));
        assert_eq!(store.get_value("main", &key("s")).unwrap(), table("side"));
    }

    #[test]
    fn transplant_copies_commits_and_metadata() {
        let store = memory_store();
        let c1 = put(&store, "main", "t1", "V1");
        store.create_branch("dev", Some(c1)).unwrap();
        let d1 = put(&store, "dev", "t2", "V2");
        put(&store, "main", "t3", "V3");

        let head = store.transplant("main", None, vec![d1]).unwrap();
        assert_ne!(head, d1);
        assert_eq!(store.get_value("main", &key("t2")).unwrap(), table("V2"));
        let top = store.history("main").unwrap().next().unwrap().unwrap();
        assert_eq!(top.metadata.message, "set t2");
    }

    #[test]
    fn assign_and_delete_references() {
        let store = memory_store();
        let root = store.get_reference("main").unwrap().hash;
        let c1 = put(&store, "main", "t1", "V1");
        store.create_branch("dev", None).unwrap();

        let dev = store.assign_reference("dev", &root, &c1).unwrap();
        assert_eq!(dev.hash, c1);
        assert!(store
            .delete_reference("dev", &root)
            .unwrap_err()
            .is_reference_conflict());
        store.delete_reference("dev", &c1).unwrap();
        assert_eq!(store.list_references().unwrap().len(), 1);
    }
}
