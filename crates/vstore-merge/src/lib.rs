//! History and merging for vstore.
//!
//! # Operations
//!
//! - [`history`] -- lazy first-parent walk from a head towards the root
//! - [`common_ancestor`] -- merge base of two commits
//! - [`MergeEngine::merge`] -- merge one reference into a branch
//! - [`MergeEngine::transplant`] -- replay commits onto a branch
//!
//! Merges and transplants publish with a single compare-and-swap and are
//! never retried: the caller decides how to react to a moved branch.

pub mod ancestry;
pub mod merge;
pub mod transplant;

pub use ancestry::{common_ancestor, history, History};
pub use merge::{MergeEngine, MergeOutcome, MergeRequest};
pub use transplant::TransplantRequest;
