//! In-memory backend for tests and ephemeral use.
//!
//! [`InMemoryBackend`] keeps every object and reference in maps behind one
//! `Mutex`, so every mutation is serialized and atomicity is trivial.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;
use vstore_types::{Commit, ContentHasher, Hash, ObjectKind, RefKind, Reference, Tree};

use crate::error::{BackendError, BackendResult};
use crate::traits::{Backend, ReferenceIter};

#[derive(Debug, Default)]
struct State {
    contents: HashMap<Hash, Vec<u8>>,
    trees: HashMap<Hash, Vec<u8>>,
    commits: HashMap<Hash, Vec<u8>>,
    refs: BTreeMap<String, Reference>,
}

impl State {
    fn objects(&mut self, kind: ObjectKind) -> &mut HashMap<Hash, Vec<u8>> {
        match kind {
            ObjectKind::Content => &mut self.contents,
            ObjectKind::Tree => &mut self.trees,
            ObjectKind::Commit => &mut self.commits,
        }
    }
}

/// An in-memory implementation of [`Backend`].
///
/// Data is lost when the backend is dropped.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> BackendResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| BackendError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn put_object(&self, kind: ObjectKind, hash: Hash, bytes: Vec<u8>) -> BackendResult<Hash> {
        let mut state = self.lock()?;
        let objects = state.objects(kind);
        match objects.get(&hash) {
            Some(existing) if *existing != bytes => Err(BackendError::Corruption(format!(
                "{kind} {hash} rewritten with different bytes"
            ))),
            Some(_) => Ok(hash),
            None => {
                debug!(kind = %kind, hash = %hash, size = bytes.len(), "stored object");
                objects.insert(hash, bytes);
                Ok(hash)
            }
        }
    }

    fn get_object(&self, kind: ObjectKind, hash: &Hash) -> BackendResult<Vec<u8>> {
        let mut state = self.lock()?;
        let bytes = state
            .objects(kind)
            .get(hash)
            .cloned()
            .ok_or(BackendError::NotFound { kind, hash: *hash })?;
        if !hasher_for(kind).verify(&bytes, hash) {
            return Err(BackendError::Corruption(format!(
                "{kind} {hash} does not match its stored bytes"
            )));
        }
        Ok(bytes)
    }

    /// Overwrite stored bytes without rehashing. Test-only corruption hook.
    #[cfg(test)]
    pub(crate) fn tamper(&self, kind: ObjectKind, hash: &Hash, bytes: Vec<u8>) {
        self.state.lock().unwrap().objects(kind).insert(*hash, bytes);
    }
}

pub(crate) fn hasher_for(kind: ObjectKind) -> ContentHasher {
    match kind {
        ObjectKind::Content => ContentHasher::CONTENT,
        ObjectKind::Tree => ContentHasher::TREE,
        ObjectKind::Commit => ContentHasher::COMMIT,
    }
}

impl Backend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn get_content(&self, hash: &Hash) -> BackendResult<Vec<u8>> {
        self.get_object(ObjectKind::Content, hash)
    }

    fn put_content(&self, data: &[u8]) -> BackendResult<Hash> {
        let hash = ContentHasher::CONTENT.hash(data);
        self.put_object(ObjectKind::Content, hash, data.to_vec())
    }

    fn get_tree(&self, hash: &Hash) -> BackendResult<Tree> {
        let bytes = self.get_object(ObjectKind::Tree, hash)?;
        Ok(Tree::from_bytes(&bytes)?)
    }

    fn put_tree(&self, tree: &Tree) -> BackendResult<Hash> {
        let bytes = tree.to_bytes()?;
        let hash = ContentHasher::TREE.hash(&bytes);
        self.put_object(ObjectKind::Tree, hash, bytes)
    }

    fn get_commit(&self, hash: &Hash) -> BackendResult<Commit> {
        let bytes = self.get_object(ObjectKind::Commit, hash)?;
        Ok(Commit::from_bytes(&bytes)?)
    }

    fn put_commit(&self, commit: &Commit) -> BackendResult<Hash> {
        let bytes = commit.to_bytes()?;
        let hash = ContentHasher::COMMIT.hash(&bytes);
        self.put_object(ObjectKind::Commit, hash, bytes)
    }

    fn get_reference(&self, name: &str) -> BackendResult<Reference> {
        let state = self.lock()?;
        state
            .refs
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::ReferenceNotFound(name.to_string()))
    }

    fn create_reference(
        &self,
        name: &str,
        kind: RefKind,
        hash: &Hash,
    ) -> BackendResult<Reference> {
        let mut state = self.lock()?;
        if state.refs.contains_key(name) {
            return Err(BackendError::AlreadyExists(name.to_string()));
        }
        let reference = Reference::new(name, kind, *hash);
        state.refs.insert(name.to_string(), reference.clone());
        Ok(reference)
    }

    fn cas_reference(&self, name: &str, expected: &Hash, new: &Hash) -> BackendResult<()> {
        let mut state = self.lock()?;
        let reference = state
            .refs
            .get_mut(name)
            .ok_or_else(|| BackendError::ReferenceNotFound(name.to_string()))?;
        if reference.hash != *expected {
            return Err(BackendError::Conflict {
                name: name.to_string(),
                expected: *expected,
                actual: Some(reference.hash),
            });
        }
        reference.hash = *new;
        Ok(())
    }

    fn delete_reference(&self, name: &str, expected: &Hash) -> BackendResult<()> {
        let mut state = self.lock()?;
        let current = state
            .refs
            .get(name)
            .map(|r| r.hash)
            .ok_or_else(|| BackendError::ReferenceNotFound(name.to_string()))?;
        if current != *expected {
            return Err(BackendError::Conflict {
                name: name.to_string(),
                expected: *expected,
                actual: Some(current),
            });
        }
        state.refs.remove(name);
        Ok(())
    }

    fn list_references(&self) -> BackendResult<ReferenceIter<'_>> {
        let snapshot: Vec<Reference> = self.lock()?.refs.values().cloned().collect();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }
}
