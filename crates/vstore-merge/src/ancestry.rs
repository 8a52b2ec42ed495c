//! Walking the commit DAG.

use std::collections::{HashSet, VecDeque};

use tracing::debug;
use vstore_backend::Backend;
use vstore_types::{Commit, Hash, VersionError, VersionResult};

/// Lazy first-parent walk from a head towards the root commit.
///
/// Yields `(hash, commit)` pairs head first and stops before the root
/// commit. A hash seen twice means the parent links form a cycle, which is
/// reported as [`VersionError::Corruption`] and ends the walk.
pub struct History<'a> {
    backend: &'a dyn Backend,
    next: Option<Hash>,
    seen: HashSet<Hash>,
}

/// Start a new history walk at `head`.
pub fn history<'a>(backend: &'a dyn Backend, head: &Hash) -> History<'a> {
    debug!(head = %head, "starting history walk");
    History {
        backend,
        next: Some(*head),
        seen: HashSet::new(),
    }
}

impl Iterator for History<'_> {
    type Item = VersionResult<(Hash, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        if !self.seen.insert(hash) {
            return Some(Err(VersionError::Corruption(format!(
                "commit history loops back to {hash}"
            ))));
        }
        let commit = match self.backend.get_commit(&hash) {
            Ok(commit) => commit,
            Err(e) => return Some(Err(e.into())),
        };
        if commit.is_root() {
            return None;
        }
        self.next = commit.first_parent().copied();
        Some(Ok((hash, commit)))
    }
}

/// Find the merge base of `a` and `b`.
///
/// Collects every ancestor of `a`, then walks back from `b` stopping at
/// commits in that set. Those commits are the candidates. A candidate that
/// is an ancestor of another candidate is not a lowest common ancestor and
/// is dropped. Among the rest the one nearest to `b` wins.
pub fn common_ancestor(backend: &dyn Backend, a: &Hash, b: &Hash) -> VersionResult<Hash> {
    if a == b {
        return Ok(*a);
    }
    let reach_a = all_ancestors(backend, [*a])?;
    if reach_a.contains(b) {
        debug!(a = %a, b = %b, "b is an ancestor of a");
        return Ok(*b);
    }

    let mut candidates = Vec::new();
    let mut seen = HashSet::from([*b]);
    let mut queue = VecDeque::from([*b]);
    while let Some(hash) = queue.pop_front() {
        if reach_a.contains(&hash) {
            candidates.push(hash);
            continue;
        }
        for parent in backend.get_commit(&hash)?.parents {
            if seen.insert(parent) {
                queue.push_back(parent);
            }
        }
    }

    let mut above = Vec::new();
    for candidate in &candidates {
        above.extend(backend.get_commit(candidate)?.parents);
    }
    let stale = all_ancestors(backend, above)?;
    let base = candidates
        .into_iter()
        .find(|c| !stale.contains(c))
        .ok_or(VersionError::NoCommonAncestor { a: *a, b: *b })?;
    debug!(a = %a, b = %b, base = %base, "found common ancestor");
    Ok(base)
}

/// Every commit reachable from `starts` over all parents, `starts` included.
fn all_ancestors(
    backend: &dyn Backend,
    starts: impl IntoIterator<Item = Hash>,
) -> VersionResult<HashSet<Hash>> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    for start in starts {
        if seen.insert(start) {
            queue.push_back(start);
        }
    }
    while let Some(hash) = queue.pop_front() {
        for parent in backend.get_commit(&hash)?.parents {
            if seen.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    Ok(seen)
}
