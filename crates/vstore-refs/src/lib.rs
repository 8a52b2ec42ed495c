//! Reference management for vstore.
//!
//! References are the named entry points into the commit DAG:
//!
//! - **Branches** advance as commits, merges and transplants land.
//! - **Tags** never move once created. They can be deleted.
//!
//! Every fresh branch starts at the shared root commit (empty tree, no
//! parents), which [`ReferenceManager::ensure_root`] persists on demand.
//!
//! # Modules
//!
//! - [`names`] -- git-style reference name rules
//! - [`manager`] -- [`ReferenceManager`], validated reference operations

pub mod manager;
pub mod names;

pub use manager::ReferenceManager;
pub use names::validate_reference_name;
