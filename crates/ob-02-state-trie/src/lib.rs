//! # State Trie (Subsystem 02)
//!
//! The authenticated state store: a hexary Merkle-Patricia trie over the
//! key-value port, and the in-memory accounts cache that block execution
//! mutates.
//!
//! ## Components
//!
//! - [`Nibbles`] - half-byte key paths with hex-prefix encoding
//! - [`Node`] - the four trie node kinds and their RLP forms
//! - [`Trie`] / [`SecureTrie`] - get/insert/remove plus lazy root hashing;
//!   the secure variant keccaks keys before descent
//! - [`AccountsCache`] - journaled mutable view over an accounts trie and
//!   its per-account storage tries, with snapshot/revert matching EVM call
//!   frames, warm/cold access sets, and bulk persist

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod errors;
pub mod nibbles;
pub mod node;
pub mod trie;

// Re-exports
pub use cache::{AccessStatus, AccountsCache, Snapshot};
pub use errors::{StateError, TrieError};
pub use nibbles::Nibbles;
pub use node::{Link, Node};
pub use trie::{ordered_trie_root, SecureTrie, Trie};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
