//! Backend on a bare git repository via libgit2.
//!
//! Contents are blobs, trees are git trees, commits are git commits, and
//! references are git refs (`refs/heads/*` for branches, `refs/tags/*` for
//! tags). Hashes are 20-byte git object ids.
//!
//! Tree entry names are the hex encoding of the key's path bytes, so any
//! key survives git's file-name rules. Commits carry a fixed signature at
//! epoch 0, which keeps commit ids a pure function of tree, parents and
//! metadata.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use git2::{ErrorCode, ObjectType, Oid, Repository, Signature, Time};
use tempfile::TempDir;
use tracing::{debug, info};
use vstore_types::{Commit, Hash, Key, ObjectKind, RefKind, Reference, Tree, TreeEntry};

use crate::error::{BackendError, BackendResult};
use crate::traits::{Backend, ReferenceIter};

const GIT_HASH_LEN: usize = 20;
const BLOB_MODE: i32 = 0o100644;
const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";
/// Marks commit messages that hold hex-encoded, non-text metadata.
const HEX_MARKER: &str = "vstore-hex:";

/// Where the git backend keeps its repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GitStorage {
    /// A bare repository at `path`, initialized if absent.
    Disk { path: PathBuf },
    /// A bare repository in a private temporary directory, removed on drop.
    InMemory,
    /// Git objects on the distributed key-value store. Recognized so it can
    /// be rejected with a clear error; there is no such object database.
    DistributedKv,
}

/// A [`Backend`] on a bare git repository.
pub struct GitBackend {
    repo: Mutex<Repository>,
    // Declared after `repo` so the repository closes before the directory goes.
    _scratch: Option<TempDir>,
}

impl GitBackend {
    /// Open the repository described by `storage`.
    pub fn open(storage: &GitStorage) -> BackendResult<Self> {
        let (repo, scratch) = match storage {
            GitStorage::Disk { path } => {
                let repo = match Repository::open_bare(path) {
                    Ok(repo) => repo,
                    Err(_) => Repository::init_bare(path).map_err(unavailable)?,
                };
                (repo, None)
            }
            GitStorage::InMemory => {
                let dir = TempDir::new()
                    .map_err(|e| BackendError::Unavailable(format!("temp dir: {e}")))?;
                let repo = Repository::init_bare(dir.path()).map_err(unavailable)?;
                (repo, Some(dir))
            }
            GitStorage::DistributedKv => {
                return Err(BackendError::Config(
                    "git storage on the distributed key-value store is not supported".into(),
                ))
            }
        };
        info!(path = %repo.path().display(), "opened git backend");
        Ok(Self {
            repo: Mutex::new(repo),
            _scratch: scratch,
        })
    }

    /// Open a throwaway repository.
    pub fn in_memory() -> BackendResult<Self> {
        Self::open(&GitStorage::InMemory)
    }

    fn lock(&self) -> BackendResult<MutexGuard<'_, Repository>> {
        self.repo
            .lock()
            .map_err(|e| BackendError::Unavailable(format!("lock poisoned: {e}")))
    }
}

// ---- Conversions ----

fn unavailable(e: git2::Error) -> BackendError {
    BackendError::Unavailable(e.message().to_string())
}

fn object_error(kind: ObjectKind, hash: Hash, e: git2::Error) -> BackendError {
    if e.code() == ErrorCode::NotFound {
        BackendError::NotFound { kind, hash }
    } else {
        unavailable(e)
    }
}

/// Hashes of any other length cannot name a git object.
fn oid_of(kind: ObjectKind, hash: &Hash) -> BackendResult<Oid> {
    if hash.len() != GIT_HASH_LEN {
        return Err(BackendError::NotFound { kind, hash: *hash });
    }
    Oid::from_bytes(hash.as_bytes()).map_err(|_| BackendError::NotFound { kind, hash: *hash })
}

fn hash_of(oid: Oid) -> BackendResult<Hash> {
    Ok(Hash::from_slice(oid.as_bytes())?)
}

fn git_type(kind: ObjectKind) -> ObjectType {
    match kind {
        ObjectKind::Content => ObjectType::Blob,
        ObjectKind::Tree => ObjectType::Tree,
        ObjectKind::Commit => ObjectType::Commit,
    }
}

fn full_name(name: &str, kind: RefKind) -> String {
    match kind {
        RefKind::Branch => format!("{BRANCH_PREFIX}{name}"),
        RefKind::Tag => format!("{TAG_PREFIX}{name}"),
    }
}

fn encode_message(metadata: &[u8]) -> String {
    match std::str::from_utf8(metadata) {
        Ok(text) if !text.starts_with(HEX_MARKER) && !text.contains('\0') => text.to_string(),
        _ => format!("{HEX_MARKER}{}", hex::encode(metadata)),
    }
}

fn decode_message(raw: &[u8]) -> BackendResult<Vec<u8>> {
    match raw.strip_prefix(HEX_MARKER.as_bytes()) {
        Some(encoded) => hex::decode(encoded)
            .map_err(|e| BackendError::Corruption(format!("commit message: {e}"))),
        None => Ok(raw.to_vec()),
    }
}

fn signature() -> BackendResult<Signature<'static>> {
    Signature::new("vstore", "vstore@localhost", &Time::new(0, 0)).map_err(unavailable)
}

/// Read an object from the object database, checking its type and that
/// its bytes hash to its id.
fn read_verified(
    repo: &Repository,
    kind: ObjectKind,
    hash: &Hash,
) -> BackendResult<(Oid, Vec<u8>)> {
    let oid = oid_of(kind, hash)?;
    let odb = repo.odb().map_err(unavailable)?;
    let object = odb.read(oid).map_err(|e| object_error(kind, *hash, e))?;
    if object.kind() != git_type(kind) {
        return Err(BackendError::NotFound { kind, hash: *hash });
    }
    let computed = Oid::hash_object(object.kind(), object.data()).map_err(unavailable)?;
    if computed != oid {
        return Err(BackendError::Corruption(format!(
            "{kind} {hash} hashes to {computed}"
        )));
    }
    Ok((oid, object.data().to_vec()))
}

/// Resolve a short name in either namespace.
fn find_ref(repo: &Repository, name: &str) -> BackendResult<Option<(RefKind, Oid)>> {
    for kind in [RefKind::Branch, RefKind::Tag] {
        match repo.find_reference(&full_name(name, kind)) {
            Ok(reference) => {
                let oid = reference.target().ok_or_else(|| {
                    BackendError::Corruption(format!("reference {name} is symbolic"))
                })?;
                return Ok(Some((kind, oid)));
            }
            Err(e) if e.code() == ErrorCode::NotFound => continue,
            Err(e) => return Err(unavailable(e)),
        }
    }
    Ok(None)
}

/// Best-effort read of `name` for a conflict report. A failed read leaves
/// the conflict's `actual` empty.
fn current_hash(repo: &Repository, name: &str) -> Option<Hash> {
    let found = find_ref(repo, name).and_then(|found| {
        found.map(|(_, oid)| hash_of(oid)).transpose()
    });
    match found {
        Ok(hash) => hash,
        Err(e) => {
            debug!(reference = name, error = %e, "could not read reference after failed update");
            None
        }
    }
}

impl Backend for GitBackend {
    fn name(&self) -> &'static str {
        "git"
    }

    fn get_content(&self, hash: &Hash) -> BackendResult<Vec<u8>> {
        let repo = self.lock()?;
        let (_, data) = read_verified(&repo, ObjectKind::Content, hash)?;
        Ok(data)
    }

    fn put_content(&self, data: &[u8]) -> BackendResult<Hash> {
        let repo = self.lock()?;
        let oid = repo.blob(data).map_err(unavailable)?;
        debug!(hash = %oid, size = data.len(), "stored blob");
        hash_of(oid)
    }

    fn get_tree(&self, hash: &Hash) -> BackendResult<Tree> {
        let repo = self.lock()?;
        let (oid, _) = read_verified(&repo, ObjectKind::Tree, hash)?;
        let tree = repo
            .find_tree(oid)
            .map_err(|e| object_error(ObjectKind::Tree, *hash, e))?;
        let mut entries = Vec::with_capacity(tree.len());
        for entry in tree.iter() {
            let name = entry
                .name()
                .ok_or_else(|| BackendError::Corruption(format!("tree {hash}: non-UTF-8 entry")))?;
            let path = hex::decode(name)
                .map_err(|e| BackendError::Corruption(format!("tree {hash}: entry {name}: {e}")))?;
            let key = Key::from_path_bytes(&path)
                .map_err(|e| BackendError::Corruption(format!("tree {hash}: {e}")))?;
            entries.push(TreeEntry::new(key, hash_of(entry.id())?));
        }
        Ok(Tree::new(entries))
    }

    fn put_tree(&self, tree: &Tree) -> BackendResult<Hash> {
        let repo = self.lock()?;
        let odb = repo.odb().map_err(unavailable)?;
        let mut builder = repo.treebuilder(None).map_err(unavailable)?;
        for entry in tree.entries() {
            let oid = oid_of(ObjectKind::Content, &entry.hash)?;
            if !odb.exists(oid) {
                return Err(BackendError::NotFound {
                    kind: ObjectKind::Content,
                    hash: entry.hash,
                });
            }
            builder
                .insert(hex::encode(entry.key.to_path_bytes()), oid, BLOB_MODE)
                .map_err(unavailable)?;
        }
        let oid = builder.write().map_err(unavailable)?;
        debug!(hash = %oid, entries = tree.len(), "stored tree");
        hash_of(oid)
    }

    fn get_commit(&self, hash: &Hash) -> BackendResult<Commit> {
        let repo = self.lock()?;
        let (oid, _) = read_verified(&repo, ObjectKind::Commit, hash)?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| object_error(ObjectKind::Commit, *hash, e))?;
        let parents = commit
            .parent_ids()
            .map(hash_of)
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(Commit::new(
            hash_of(commit.tree_id())?,
            parents,
            decode_message(commit.message_bytes())?,
        ))
    }

    fn put_commit(&self, commit: &Commit) -> BackendResult<Hash> {
        let repo = self.lock()?;
        let tree_oid = oid_of(ObjectKind::Tree, &commit.tree)?;
        let tree = repo
            .find_tree(tree_oid)
            .map_err(|e| object_error(ObjectKind::Tree, commit.tree, e))?;
        let parents = commit
            .parents
            .iter()
            .map(|p| {
                let oid = oid_of(ObjectKind::Commit, p)?;
                repo.find_commit(oid)
                    .map_err(|e| object_error(ObjectKind::Commit, *p, e))
            })
            .collect::<BackendResult<Vec<_>>>()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        let sig = signature()?;
        let oid = repo
            .commit(
                None,
                &sig,
                &sig,
                &encode_message(&commit.metadata),
                &tree,
                &parent_refs,
            )
            .map_err(unavailable)?;
        debug!(hash = %oid, parents = parent_refs.len(), "stored commit");
        hash_of(oid)
    }

    fn get_reference(&self, name: &str) -> BackendResult<Reference> {
        let repo = self.lock()?;
        let (kind, oid) =
            find_ref(&repo, name)?.ok_or_else(|| BackendError::ReferenceNotFound(name.to_string()))?;
        Ok(Reference::new(name, kind, hash_of(oid)?))
    }

    fn create_reference(
        &self,
        name: &str,
        kind: RefKind,
        hash: &Hash,
    ) -> BackendResult<Reference> {
        let repo = self.lock()?;
        if find_ref(&repo, name)?.is_some() {
            return Err(BackendError::AlreadyExists(name.to_string()));
        }
        let oid = oid_of(ObjectKind::Commit, hash)?;
        // Bound so the borrowed git reference drops before the guard.
        let created = match repo.reference(&full_name(name, kind), oid, false, "vstore: create") {
            Ok(_) => Ok(Reference::new(name, kind, *hash)),
            Err(e) if e.code() == ErrorCode::Exists => {
                Err(BackendError::AlreadyExists(name.to_string()))
            }
            Err(e) => Err(object_error(ObjectKind::Commit, *hash, e)),
        };
        created
    }

    fn cas_reference(&self, name: &str, expected: &Hash, new: &Hash) -> BackendResult<()> {
        let repo = self.lock()?;
        let (kind, current) =
            find_ref(&repo, name)?.ok_or_else(|| BackendError::ReferenceNotFound(name.to_string()))?;
        let conflict = |actual: Option<Hash>| BackendError::Conflict {
            name: name.to_string(),
            expected: *expected,
            actual,
        };
        let observed = hash_of(current)?;
        if observed != *expected {
            return Err(conflict(Some(observed)));
        }
        let new_oid = oid_of(ObjectKind::Commit, new)?;
        debug!(reference = name, from = %expected, to = %new, "conditional reference update");
        let full = full_name(name, kind);
        let updated = match repo.reference_matching(&full, new_oid, true, current, "vstore: update") {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.code(), ErrorCode::Modified | ErrorCode::Locked) => {
                Err(conflict(current_hash(&repo, name)))
            }
            Err(e) => Err(unavailable(e)),
        };
        updated
    }

    fn delete_reference(&self, name: &str, expected: &Hash) -> BackendResult<()> {
        let repo = self.lock()?;
        let (kind, _) =
            find_ref(&repo, name)?.ok_or_else(|| BackendError::ReferenceNotFound(name.to_string()))?;
        let full = full_name(name, kind);
        let conflict = |actual: Option<Hash>| BackendError::Conflict {
            name: name.to_string(),
            expected: *expected,
            actual,
        };

        let mut tx = repo.transaction().map_err(unavailable)?;
        tx.lock_ref(&full).map_err(|e| match e.code() {
            ErrorCode::Locked => conflict(None),
            _ => unavailable(e),
        })?;
        let current = repo.refname_to_id(&full).map_err(|e| match e.code() {
            ErrorCode::NotFound => BackendError::ReferenceNotFound(name.to_string()),
            _ => unavailable(e),
        })?;
        let current = hash_of(current)?;
        if current != *expected {
            return Err(conflict(Some(current)));
        }
        tx.remove(&full).map_err(unavailable)?;
        tx.commit().map_err(unavailable)?;
        Ok(())
    }

    fn list_references(&self) -> BackendResult<ReferenceIter<'_>> {
        let repo = self.lock()?;
        let mut refs = Vec::new();
        for reference in repo.references().map_err(unavailable)? {
            let reference = reference.map_err(unavailable)?;
            let Some(full) = reference.name() else {
                continue;
            };
            let (kind, name) = if let Some(name) = full.strip_prefix(BRANCH_PREFIX) {
                (RefKind::Branch, name)
            } else if let Some(name) = full.strip_prefix(TAG_PREFIX) {
                (RefKind::Tag, name)
            } else {
                continue;
            };
            let Some(oid) = reference.target() else {
                continue;
            };
            refs.push(Reference::new(name, kind, hash_of(oid)?));
        }
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Box::new(refs.into_iter().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    // ---- Contract ----

    #[test]
    fn satisfies_backend_contract() {
        contract::run_all(&GitBackend::in_memory().unwrap());
    }

    #[test]
    fn concurrent_cas_has_one_winner() {
        contract::concurrent_cas_exactly_one_wins(&GitBackend::in_memory().unwrap());
    }

    // ---- Storage ----

    #[test]
    fn disk_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let storage = GitStorage::Disk {
            path: dir.path().join("store.git"),
        };

        let (root, value) = {
            let backend = GitBackend::open(&storage).unwrap();
            let value = backend.put_content(b"persisted").unwrap();
            let tree = backend.put_tree(&Tree::empty()).unwrap();
            let root = backend.put_commit(&Commit::root(tree)).unwrap();
            backend.create_reference("main", RefKind::Branch, &root).unwrap();
            (root, value)
        };

        let reopened = GitBackend::open(&storage).unwrap();
        assert_eq!(reopened.get_reference("main").unwrap().hash, root);
        assert_eq!(reopened.get_content(&value).unwrap(), b"persisted");
    }

    #[test]
    fn distributed_kv_storage_is_rejected() {
        assert!(matches!(
            GitBackend::open(&GitStorage::DistributedKv),
            Err(BackendError::Config(_))
        ));
    }

    #[test]
    fn hashes_are_git_object_ids() {
        let backend = GitBackend::in_memory().unwrap();
        let hash = backend.put_content(b"hello").unwrap();
        assert_eq!(hash.len(), GIT_HASH_LEN);
        let expected = Oid::hash_object(ObjectType::Blob, b"hello").unwrap();
        assert_eq!(hash.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn tree_requires_existing_contents() {
        let backend = GitBackend::in_memory().unwrap();
        let missing = Hash::from_slice(&[0xab; 20]).unwrap();
        let tree = Tree::new(vec![TreeEntry::new("db.t".parse().unwrap(), missing)]);
        assert!(matches!(
            backend.put_tree(&tree),
            Err(BackendError::NotFound {
                kind: ObjectKind::Content,
                ..
            })
        ));
    }

    // ---- References ----

    #[test]
    fn references_live_in_git_namespaces() {
        let backend = GitBackend::in_memory().unwrap();
        let tree = backend.put_tree(&Tree::empty()).unwrap();
        let root = backend.put_commit(&Commit::root(tree)).unwrap();
        backend.create_reference("main", RefKind::Branch, &root).unwrap();
        backend.create_reference("v1", RefKind::Tag, &root).unwrap();

        let repo = backend.lock().unwrap();
        assert!(repo.find_reference("refs/heads/main").is_ok());
        assert!(repo.find_reference("refs/tags/v1").is_ok());
        assert!(repo.find_reference("refs/heads/v1").is_err());
    }

    // ---- Metadata encoding ----

    #[test]
    fn text_metadata_is_stored_verbatim() {
        assert_eq!(encode_message(b"{\"message\":\"hi\"}"), "{\"message\":\"hi\"}");
        assert_eq!(decode_message(b"plain").unwrap(), b"plain");
    }

    #[test]
    fn binary_and_marker_metadata_are_hex_encoded() {
        let binary = [0u8, 0xff, 0x10];
        let encoded = encode_message(&binary);
        assert!(encoded.starts_with(HEX_MARKER));
        assert_eq!(decode_message(encoded.as_bytes()).unwrap(), binary);

        let tricky = format!("{HEX_MARKER}not hex");
        let encoded = encode_message(tricky.as_bytes());
        assert_eq!(decode_message(encoded.as_bytes()).unwrap(), tricky.as_bytes());
    }
}
