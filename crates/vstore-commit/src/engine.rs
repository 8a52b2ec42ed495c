use tracing::{debug, info, warn};
use vstore_backend::{Backend, BackendError};
use vstore_tree::{apply_mutations, load_tree};
use vstore_types::{Commit, Hash, ObjectKind, VersionError, VersionResult};

use crate::request::{CommitRequest, CommitSettings};

/// Publishes commits onto branches.
///
/// The engine holds no state between calls; any number of engines may work
/// on the same backend concurrently. Only the per-branch compare-and-swap
/// orders writers, so commits to different branches never contend.
pub struct CommitEngine<'a> {
    backend: &'a dyn Backend,
    settings: CommitSettings,
}

impl<'a> CommitEngine<'a> {
    pub fn new(backend: &'a dyn Backend, settings: CommitSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &CommitSettings {
        &self.settings
    }

    /// Current head of a branch. Tags are rejected.
    pub fn branch_head(&self, branch: &str) -> VersionResult<Hash> {
        let reference = self.backend.get_reference(branch)?;
        if reference.is_tag() {
            return Err(VersionError::ImmutableReference(branch.to_string()));
        }
        Ok(reference.hash)
    }

    /// Commit the request's mutations onto its branch and return the new
    /// head.
    ///
    /// With `expected_head` set, a moved branch is an immediate
    /// [`VersionError::ReferenceConflict`]. Without it, a lost race re-reads
    /// the head and rebuilds the commit from the mutations, up to
    /// `max_attempts` times.
    pub fn commit(&self, request: &CommitRequest) -> VersionResult<Hash> {
        let branch = request.branch.as_str();
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let base = self.branch_head(branch)?;
            if let Some(expected) = request.expected_head {
                if base != expected {
                    return Err(VersionError::ReferenceConflict {
                        name: branch.to_string(),
                        expected: Some(expected),
                        actual: Some(base),
                    });
                }
            }
            if request.mutations.is_empty() && !self.settings.allow_empty {
                debug!(branch, head = %base, "empty commit skipped");
                return Ok(base);
            }

            let tree = load_tree(self.backend, &base)?;
            let tree = apply_mutations(self.backend, &tree, &request.mutations)?;
            let tree_hash = self.backend.put_tree(&tree)?;
            let commit = Commit::new(tree_hash, vec![base], request.metadata.clone());
            let hash = self.backend.put_commit(&commit)?;

            debug!(branch, attempt, base = %base, candidate = %hash, "publishing commit");
            match self.backend.cas_reference(branch, &base, &hash) {
                Ok(()) => {
                    debug!(branch, head = %hash, attempt, "commit landed");
                    return Ok(hash);
                }
                Err(BackendError::Conflict { actual, .. }) => {
                    if let Some(expected) = request.expected_head {
                        return Err(VersionError::ReferenceConflict {
                            name: branch.to_string(),
                            expected: Some(expected),
                            actual,
                        });
                    }
                    if attempt >= max_attempts {
                        warn!(branch, attempts = attempt, "commit retries exhausted");
                        return Err(VersionError::ReferenceConflict {
                            name: branch.to_string(),
                            expected: Some(base),
                            actual,
                        });
                    }
                    debug!(branch, attempt, "branch moved, retrying commit");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Persist a prebuilt commit and move `branch` to it from `expected`
    /// with a single compare-and-swap. Never retried.
    pub fn land(&self, branch: &str, expected: &Hash, commit: &Commit) -> VersionResult<Hash> {
        let hash = self.backend.put_commit(commit)?;
        self.advance(branch, expected, &hash)?;
        info!(branch, head = %hash, parents = commit.parents.len(), "landed commit");
        Ok(hash)
    }

    /// Move `branch` from `expected` to an already persisted commit with a
    /// single compare-and-swap.
    pub fn advance(&self, branch: &str, expected: &Hash, new: &Hash) -> VersionResult<()> {
        let head = self.branch_head(branch)?;
        if head != *expected {
            return Err(VersionError::ReferenceConflict {
                name: branch.to_string(),
                expected: Some(*expected),
                actual: Some(head),
            });
        }
        if !self.backend.contains_commit(new)? {
            return Err(VersionError::ObjectNotFound {
                kind: ObjectKind::Commit,
                hash: *new,
            });
        }
        self.backend.cas_reference(branch, expected, new)?;
        Ok(())
    }
}
