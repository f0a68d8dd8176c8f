//! # Key-Value Store (Subsystem 01)
//!
//! The byte-addressed persistent map underneath the state trie and the
//! canonical chain indices, with scoped transactions:
//!
//! - reads through an open transaction observe its uncommitted writes
//! - `commit` applies the buffered writes atomically
//! - dropping an uncommitted transaction discards them
//!
//! The store is the only shared mutable resource in the core; concurrent
//! block executions against one store are the caller's responsibility to
//! prevent.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod errors;
pub mod ports;

// Re-exports
pub use adapters::memory::{MemoryKeyValueStore, StoreTransaction};
pub use errors::StoreError;
pub use ports::KeyValue;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
