//! Foundation types for vstore.
//!
//! vstore is a version store for structured metadata: named references point
//! at immutable, hash-addressed commits, and every commit captures a snapshot
//! of a key to content mapping. Every other vstore crate depends on
//! `vstore-types`.
//!
//! # Key Types
//!
//! - [`Hash`] -- Content address of a stored object (BLAKE3 or git object id)
//! - [`ContentHasher`] -- Domain-separated BLAKE3 hashing per object kind
//! - [`Key`] -- Multi-element application key (e.g. `db.orders`)
//! - [`Tree`] -- Sorted key to content-hash mapping at one point in history
//! - [`Commit`] -- Immutable snapshot node with parent links
//! - [`Reference`] -- Named branch or tag pointing at a commit
//! - [`Mutation`] -- A put or delete of one key inside a commit
//! - [`ConflictSet`] -- Key-level conflicts produced by merges
//! - [`VersionError`] -- The error taxonomy surfaced to callers

pub mod commit;
pub mod conflict;
pub mod error;
pub mod hash;
pub mod hasher;
pub mod key;
pub mod mutation;
pub mod reference;
pub mod tree;

pub use commit::Commit;
pub use conflict::{ConflictSet, KeyConflict};
pub use error::{ErrorKind, ObjectKind, TypeError, VersionError, VersionResult};
pub use hash::{Hash, MAX_HASH_LEN};
pub use hasher::ContentHasher;
pub use key::Key;
pub use mutation::Mutation;
pub use reference::{RefKind, Reference};
pub use tree::{Tree, TreeEntry};
