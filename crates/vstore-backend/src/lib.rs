//! Storage backends for vstore.
//!
//! Every backend stores four things: contents (opaque encoded values),
//! trees, commits, and named references. Objects are content-addressed and
//! write-once; references are the only mutable state and only move through
//! compare-and-swap.
//!
//! # Backends
//!
//! All backends implement the [`Backend`] trait:
//!
//! - [`InMemoryBackend`] -- maps behind a single mutex, for tests and embedding
//! - [`KvBackend`] -- four tables on a conditional-write [`KvClient`]
//! - [`GitBackend`] -- a bare libgit2 repository on disk or in a temp dir
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; rewriting the same hash with
//!    different bytes is corruption.
//! 2. Reads verify stored bytes against their address.
//! 3. A reference never moves unless its current hash equals the expected one.
//! 4. Transient failures are retried only for idempotent operations.

pub mod error;
pub mod git;
pub mod kv;
pub mod memory;
pub mod traits;

#[cfg(test)]
mod contract;

pub use error::{BackendError, BackendResult};
pub use git::{GitBackend, GitStorage};
pub use kv::{KvBackend, KvClient, KvConfig, KvError, LocalKvClient};
pub use memory::InMemoryBackend;
pub use traits::{Backend, ReferenceIter};
