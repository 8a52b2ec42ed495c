//! Storing values and building trees from mutations.

use tracing::debug;
use vstore_backend::Backend;
use vstore_types::{Hash, Mutation, Tree, VersionResult};

/// Store an encoded value and return its content hash.
///
/// The hash depends only on the bytes, so this is safe to call before a
/// commit is known to land.
pub fn put_value(backend: &dyn Backend, bytes: &[u8]) -> VersionResult<Hash> {
    Ok(backend.put_content(bytes)?)
}

/// Load the tree captured by a commit.
pub fn load_tree(backend: &dyn Backend, commit: &Hash) -> VersionResult<Tree> {
    let commit = backend.get_commit(commit)?;
    Ok(backend.get_tree(&commit.tree)?)
}

/// Apply mutations in order on top of `tree`.
///
/// Puts store their content and set the key; deletes remove the key and
/// are a no-op when the key is absent. When several mutations touch the
/// same key, the last one wins.
pub fn apply_mutations(
    backend: &dyn Backend,
    tree: &Tree,
    mutations: &[Mutation],
) -> VersionResult<Tree> {
    let mut entries = tree.to_map();
    for mutation in mutations {
        match mutation {
            Mutation::Put { key, value } => {
                let hash = put_value(backend, value)?;
                entries.insert(key.clone(), hash);
            }
            Mutation::Delete { key } => {
                entries.remove(key);
            }
        }
    }
    debug!(
        mutations = mutations.len(),
        before = tree.len(),
        after = entries.len(),
        "applied mutations"
    );
    Ok(Tree::from_map(entries))
}
