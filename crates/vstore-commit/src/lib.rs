//! Commit engine for vstore.
//!
//! A commit reads the branch head, applies mutations to the head's tree,
//! persists the new tree and commit, and publishes it with a
//! compare-and-swap on the branch. When another writer wins the race and
//! the caller did not pin an expected head, the engine re-reads the head
//! and tries again, a bounded number of times.

pub mod engine;
pub mod request;

pub use engine::CommitEngine;
pub use request::{CommitRequest, CommitSettings};
