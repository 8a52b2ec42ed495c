//! Distributed key-value backend.
//!
//! [`KvBackend`] stores everything in four tables on a [`KvClient`], a
//! narrow interface over a service that offers single-key conditional
//! writes and ordered scans. [`LocalKvClient`] provides the same interface
//! in-process.

mod backend;
mod client;
mod config;

pub use backend::KvBackend;
pub use client::{KvClient, KvError, KvResult, LocalKvClient};
pub use config::KvConfig;
