use vstore_types::{Commit, Hash, RefKind, Reference, Tree};

use crate::error::{BackendError, BackendResult};

/// Lazily produced reference listing. Each item may fail independently
/// (e.g. a page fetch in the key-value backend).
pub type ReferenceIter<'a> = Box<dyn Iterator<Item = BackendResult<Reference>> + 'a>;

/// Storage contract shared by every vstore backend.
///
/// All implementations must satisfy these invariants:
/// - Contents, trees and commits are immutable once written. Writing the
///   same object twice is a no-op that returns the same hash.
/// - Reads verify the stored bytes against the requested hash and report
///   [`BackendError::Corruption`] on mismatch.
/// - References move only through [`Backend::cas_reference`], which has no
///   side effects when the current hash differs from the expected one.
/// - Reference names are unique across branches and tags.
pub trait Backend: Send + Sync {
    /// Short backend name used in log fields.
    fn name(&self) -> &'static str;

    /// Read encoded content by hash.
    fn get_content(&self, hash: &Hash) -> BackendResult<Vec<u8>>;

    /// Store encoded content and return its hash. Idempotent.
    fn put_content(&self, data: &[u8]) -> BackendResult<Hash>;

    /// Read a tree by hash.
    fn get_tree(&self, hash: &Hash) -> BackendResult<Tree>;

    /// Store a tree and return its hash. Idempotent.
    ///
    /// Backends may require every content the tree names to exist.
    fn put_tree(&self, tree: &Tree) -> BackendResult<Hash>;

    /// Read a commit by hash.
    fn get_commit(&self, hash: &Hash) -> BackendResult<Commit>;

    /// Store a commit and return its hash. Idempotent.
    fn put_commit(&self, commit: &Commit) -> BackendResult<Hash>;

    /// Check whether a commit exists.
    fn contains_commit(&self, hash: &Hash) -> BackendResult<bool> {
        match self.get_commit(hash) {
            Ok(_) => Ok(true),
            Err(BackendError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Look up a reference by name.
    fn get_reference(&self, name: &str) -> BackendResult<Reference>;

    /// Create a reference pointing at `hash`.
    ///
    /// Fails with [`BackendError::AlreadyExists`] if any reference (branch
    /// or tag) already uses `name`.
    fn create_reference(&self, name: &str, kind: RefKind, hash: &Hash)
        -> BackendResult<Reference>;

    /// Atomically move `name` from `expected` to `new`.
    ///
    /// Fails with [`BackendError::Conflict`] if the reference currently
    /// points elsewhere; the reference is left untouched.
    fn cas_reference(&self, name: &str, expected: &Hash, new: &Hash) -> BackendResult<()>;

    /// Atomically delete `name` if it still points at `expected`.
    fn delete_reference(&self, name: &str, expected: &Hash) -> BackendResult<()>;

    /// List all references. Every call starts a fresh listing.
    fn list_references(&self) -> BackendResult<ReferenceIter<'_>>;
}
