use tracing::{debug, info, warn};
use vstore_backend::{Backend, BackendError};
use vstore_types::{
    Commit, Hash, ObjectKind, RefKind, Reference, Tree, VersionError, VersionResult,
};

use crate::names::validate_reference_name;

/// Validated reference operations over a backend.
///
/// Names are checked before anything is written and every target is
/// checked to be an existing commit, so a reference never points at
/// nothing.
pub struct ReferenceManager<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ReferenceManager<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Persist the root commit (empty tree, no parents, empty metadata) and
    /// return its hash. Idempotent.
    pub fn ensure_root(&self) -> VersionResult<Hash> {
        let tree = self.backend.put_tree(&Tree::empty())?;
        let root = self.backend.put_commit(&Commit::root(tree))?;
        debug!(backend = self.backend.name(), root = %root, "root commit present");
        Ok(root)
    }

    fn require_commit(&self, hash: &Hash) -> VersionResult<()> {
        if self.backend.contains_commit(hash)? {
            Ok(())
        } else {
            Err(VersionError::ObjectNotFound {
                kind: ObjectKind::Commit,
                hash: *hash,
            })
        }
    }

    /// Create a reference.
    ///
    /// A branch created without `from` starts at the root commit. A tag
    /// always needs a target.
    pub fn create(&self, name: &str, kind: RefKind, from: Option<Hash>) -> VersionResult<Reference> {
        validate_reference_name(name)?;
        let target = match (from, kind) {
            (Some(hash), _) => {
                self.require_commit(&hash)?;
                hash
            }
            (None, RefKind::Branch) => self.ensure_root()?,
            (None, RefKind::Tag) => {
                return Err(VersionError::InvalidReferenceName {
                    name: name.to_string(),
                    reason: "a tag needs a target commit".into(),
                })
            }
        };
        let reference = self.backend.create_reference(name, kind, &target)?;
        info!(name, kind = %kind, hash = %target, "created reference");
        Ok(reference)
    }

    pub fn get(&self, name: &str) -> VersionResult<Reference> {
        Ok(self.backend.get_reference(name)?)
    }

    /// All references, in the order the backend lists them.
    pub fn list(&self) -> VersionResult<Vec<Reference>> {
        self.backend
            .list_references()?
            .map(|r| r.map_err(VersionError::from))
            .collect()
    }

    /// Delete `name` if it still points at `expected`.
    pub fn delete(&self, name: &str, expected: &Hash) -> VersionResult<()> {
        self.backend.delete_reference(name, expected)?;
        info!(name, hash = %expected, "deleted reference");
        Ok(())
    }

    /// Move the branch `name` from `expected` to any existing commit.
    pub fn assign(&self, name: &str, expected: &Hash, target: &Hash) -> VersionResult<Reference> {
        let current = self.backend.get_reference(name)?;
        if current.is_tag() {
            return Err(VersionError::ImmutableReference(name.to_string()));
        }
        self.require_commit(target)?;
        self.backend.cas_reference(name, expected, target)?;
        info!(name, from = %expected, to = %target, "assigned reference");
        Ok(Reference::new(name, RefKind::Branch, *target))
    }

    /// Create `default_branch` at the root commit if the store has no
    /// references at all.
    ///
    /// Returns the new branch, or `None` when the store was already
    /// initialized. Losing the creation race to another bootstrapper is not
    /// an error.
    pub fn bootstrap(&self, default_branch: &str) -> VersionResult<Option<Reference>> {
        validate_reference_name(default_branch)?;
        if self.backend.list_references()?.next().is_some() {
            debug!(backend = self.backend.name(), "store already initialized");
            return Ok(None);
        }
        let root = self.ensure_root()?;
        match self
            .backend
            .create_reference(default_branch, RefKind::Branch, &root)
        {
            Ok(reference) => {
                info!(
                    backend = self.backend.name(),
                    branch = default_branch,
                    root = %root,
                    "bootstrapped store"
                );
                Ok(Some(reference))
            }
            Err(BackendError::AlreadyExists(_)) => {
                warn!(
                    branch = default_branch,
                    "default branch created concurrently, skipping bootstrap"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
