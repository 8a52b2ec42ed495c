//! Three-way merge of trees at key granularity.

use std::collections::BTreeSet;

use vstore_types::{ConflictSet, Hash, Key, KeyConflict, Tree};

/// Outcome of [`three_way_merge`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeResult {
    /// Every key resolved.
    Merged(Tree),
    /// At least one key changed differently on both sides.
    Conflicts(ConflictSet),
}

/// Merge `ours` and `theirs` against their common `base`.
///
/// For each key: if only one side changed it, that side wins; if both
/// changed it to the same hash (both deleting counts), that hash is kept;
/// otherwise the key conflicts, including modify against delete.
pub fn three_way_merge(base: &Tree, ours: &Tree, theirs: &Tree) -> MergeResult {
    let keys: BTreeSet<&Key> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();

    let mut merged: Vec<(Key, Hash)> = Vec::new();
    let mut conflicts = ConflictSet::new();

    for key in keys {
        let b = base.get(key).copied();
        let o = ours.get(key).copied();
        let t = theirs.get(key).copied();

        let resolved = if o == t || t == b {
            o
        } else if o == b {
            t
        } else {
            conflicts.push(KeyConflict {
                key: key.clone(),
                base: b,
                ours: o,
                theirs: t,
            });
            continue;
        };
        if let Some(hash) = resolved {
            merged.push((key.clone(), hash));
        }
    }

    if conflicts.is_empty() {
        MergeResult::Merged(merged.into_iter().collect())
    } else {
        MergeResult::Conflicts(conflicts)
    }
}
