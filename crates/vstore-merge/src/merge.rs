use tracing::info;
use vstore_backend::Backend;
use vstore_commit::{CommitEngine, CommitSettings};
use vstore_tree::{load_tree, three_way_merge, MergeResult};
use vstore_types::{Commit, ConflictSet, Hash, VersionError, VersionResult};

use crate::ancestry::common_ancestor;

/// A request to merge `source` into the branch `target`.
#[derive(Clone, Debug)]
pub struct MergeRequest {
    /// Branch or tag whose head is merged in.
    pub source: String,
    /// Branch that receives the merge commit.
    pub target: String,
    /// When set, the merge fails unless `target` is at exactly this hash.
    pub expected_target: Option<Hash>,
    /// Encoded metadata for the merge commit.
    pub metadata: Vec<u8>,
}

impl MergeRequest {
    pub fn new(source: impl Into<String>, target: impl Into<String>, metadata: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            expected_target: None,
            metadata,
        }
    }

    pub fn with_expected_target(mut self, head: Hash) -> Self {
        self.expected_target = Some(head);
        self
    }
}

/// How a merge ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The source was already contained in the target; the target head is
    /// unchanged.
    UpToDate(Hash),
    /// A merge commit was published on the target.
    Merged(Hash),
    /// Keys changed incompatibly on both sides. Nothing was written to any
    /// reference.
    Conflicts(ConflictSet),
}

/// Merges and transplants between references.
pub struct MergeEngine<'a> {
    pub(crate) backend: &'a dyn Backend,
    pub(crate) commits: CommitEngine<'a>,
}

impl<'a> MergeEngine<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self {
            backend,
            commits: CommitEngine::new(backend, CommitSettings::default()),
        }
    }

    /// Current head of `branch`, checked against an optional expectation.
    pub(crate) fn observe(&self, branch: &str, expected: Option<Hash>) -> VersionResult<Hash> {
        let head = self.commits.branch_head(branch)?;
        match expected {
            Some(expected) if expected != head => Err(VersionError::ReferenceConflict {
                name: branch.to_string(),
                expected: Some(expected),
                actual: Some(head),
            }),
            _ => Ok(head),
        }
    }

    /// Merge the source reference into the target branch.
    ///
    /// The merge commit has parents `[target_head, source_head]` and lands
    /// with one compare-and-swap against the observed target head. A moved
    /// target is reported as [`VersionError::ReferenceConflict`].
    pub fn merge(&self, request: &MergeRequest) -> VersionResult<MergeOutcome> {
        let source_head = self.backend.get_reference(&request.source)?.hash;
        let target_head = self.observe(&request.target, request.expected_target)?;

        if source_head == target_head {
            return Ok(MergeOutcome::UpToDate(target_head));
        }
        let base = common_ancestor(self.backend, &target_head, &source_head)?;
        if base == source_head {
            info!(
                source = %request.source,
                target = %request.target,
                "source already merged"
            );
            return Ok(MergeOutcome::UpToDate(target_head));
        }

        let base_tree = load_tree(self.backend, &base)?;
        let ours = load_tree(self.backend, &target_head)?;
        let theirs = load_tree(self.backend, &source_head)?;

        match three_way_merge(&base_tree, &ours, &theirs) {
            MergeResult::Conflicts(conflicts) => {
                info!(
                    source = %request.source,
                    target = %request.target,
                    conflicts = conflicts.len(),
                    "merge has conflicts"
                );
                Ok(MergeOutcome::Conflicts(conflicts))
            }
            MergeResult::Merged(tree) => {
                let tree_hash = self.backend.put_tree(&tree)?;
                let commit = Commit::new(
                    tree_hash,
                    vec![target_head, source_head],
                    request.metadata.clone(),
                );
                let hash = self.commits.land(&request.target, &target_head, &commit)?;
                info!(
                    source = %request.source,
                    target = %request.target,
                    base = %base,
                    head = %hash,
                    "merge landed"
                );
                Ok(MergeOutcome::Merged(hash))
            }
        }
    }
}
