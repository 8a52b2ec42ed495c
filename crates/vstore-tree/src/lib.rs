//! Tree and content store for vstore.
//!
//! Trees map keys to content hashes. This crate turns mutations into new
//! trees, compares trees by hash, and merges them three ways at key
//! granularity. Content is never decoded here.
//!
//! # Modules
//!
//! - [`store`] -- store values, load a commit's tree, apply mutations
//! - [`diff`] -- key-level differences between two trees
//! - [`merge`] -- three-way merge against a common base

pub mod diff;
pub mod merge;
pub mod store;

pub use diff::{diff, ChangeKind, DiffEntry};
pub use merge::{three_way_merge, MergeResult};
pub use store::{apply_mutations, load_tree, put_value};
