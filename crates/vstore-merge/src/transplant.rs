use tracing::{debug, info};
use vstore_tree::{diff, load_tree};
use vstore_types::{Commit, ConflictSet, Hash, KeyConflict, Tree, VersionError, VersionResult};

use crate::merge::MergeEngine;

/// A request to replay commits onto a branch.
#[derive(Clone, Debug)]
pub struct TransplantRequest {
    /// Branch that receives the replayed commits.
    pub onto: String,
    /// When set, the transplant fails unless `onto` is at exactly this hash.
    pub expected_head: Option<Hash>,
    /// Commits to replay, oldest first.
    pub commits: Vec<Hash>,
}

impl TransplantRequest {
    pub fn new(onto: impl Into<String>, commits: Vec<Hash>) -> Self {
        Self {
            onto: onto.into(),
            expected_head: None,
            commits,
        }
    }

    pub fn with_expected_head(mut self, head: Hash) -> Self {
        self.expected_head = Some(head);
        self
    }
}

impl MergeEngine<'_> {
    /// Replay each commit's change against its first parent onto `onto`.
    ///
    /// The new commits keep the originals' metadata and chain on each
    /// other. The branch moves once, by a single compare-and-swap after the
    /// last commit is built, so a conflict at any step leaves nothing
    /// visible. An empty list returns the current head.
    pub fn transplant(&self, request: &TransplantRequest) -> VersionResult<Hash> {
        let head = self.observe(&request.onto, request.expected_head)?;
        if request.commits.is_empty() {
            return Ok(head);
        }

        let mut tree = load_tree(self.backend, &head)?;
        let mut tip = head;
        for source in &request.commits {
            let commit = self.backend.get_commit(source)?;
            tree = self.replay(source, &commit, &tree)?;
            let tree_hash = self.backend.put_tree(&tree)?;
            tip = self.backend.put_commit(&Commit::new(
                tree_hash,
                vec![tip],
                commit.metadata.clone(),
            ))?;
            debug!(source = %source, replayed = %tip, "replayed commit");
        }

        self.commits.advance(&request.onto, &head, &tip)?;
        info!(
            onto = %request.onto,
            commits = request.commits.len(),
            head = %tip,
            "transplant landed"
        );
        Ok(tip)
    }

    /// Apply one commit's change set to `current`.
    ///
    /// A key conflicts when its current value is neither the commit's old
    /// value nor its new one.
    fn replay(&self, hash: &Hash, commit: &Commit, current: &Tree) -> VersionResult<Tree> {
        let before = match commit.first_parent() {
            Some(parent) => load_tree(self.backend, parent)?,
            None => Tree::empty(),
        };
        let after = self.backend.get_tree(&commit.tree)?;

        let mut entries = current.to_map();
        let mut conflicts = ConflictSet::new();
        for change in diff(&before, &after) {
            let present = entries.get(&change.key).copied();
            if present != change.old && present != change.new {
                conflicts.push(KeyConflict {
                    key: change.key,
                    base: change.old,
                    ours: present,
                    theirs: change.new,
                });
                continue;
            }
            match change.new {
                Some(value) => entries.insert(change.key, value),
                None => entries.remove(&change.key),
            };
        }

        if !conflicts.is_empty() {
            return Err(VersionError::TransplantConflict {
                commit: *hash,
                conflicts,
            });
        }
        Ok(Tree::from_map(entries))
    }
}
