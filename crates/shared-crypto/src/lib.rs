//! # Shared Crypto - Cryptographic Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | Keccak-256 | Trie nodes, block hashes, bloom filters |
//! | `ecdsa` | secp256k1 | Transaction sender recovery, ecrecover |
//!
//! ## Security Properties
//!
//! - **secp256k1**: public-key recovery from (v, r, s), low-S check (EIP-2)
//! - **Keccak-256**: the pre-NIST Keccak padding, not SHA3-256

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;

// Re-exports
pub use ecdsa::{recover_address, sign_digest, RecoverableSignature};
pub use errors::CryptoError;
pub use hashing::{keccak256, Keccak256Hasher, EMPTY_CODE_HASH, EMPTY_TRIE_ROOT};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
