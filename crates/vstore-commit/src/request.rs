use serde::{Deserialize, Serialize};
use vstore_types::{Hash, Mutation};

/// Engine-wide commit behavior.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommitSettings {
    /// Attempts before a contended commit gives up with a conflict.
    pub max_attempts: u32,
    /// When `false`, a commit without mutations returns the current head
    /// instead of creating a new commit.
    pub allow_empty: bool,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            allow_empty: true,
        }
    }
}

/// A request to commit mutations onto a branch.
#[derive(Clone, Debug)]
pub struct CommitRequest {
    pub branch: String,
    /// When set, the commit fails unless the branch is at exactly this
    /// hash, and it is never retried.
    pub expected_head: Option<Hash>,
    pub mutations: Vec<Mutation>,
    /// Encoded commit metadata.
    pub metadata: Vec<u8>,
}

impl CommitRequest {
    pub fn new(branch: impl Into<String>, metadata: Vec<u8>) -> Self {
        Self {
            branch: branch.into(),
            expected_head: None,
            mutations: Vec::new(),
            metadata,
        }
    }

    pub fn with_expected_head(mut self, head: Hash) -> Self {
        self.expected_head = Some(head);
        self
    }

    pub fn with_mutation(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn with_mutations(mut self, mutations: impl IntoIterator<Item = Mutation>) -> Self {
        self.mutations.extend(mutations);
        self
    }
}
