//! # Shared Types - Chain Data Model
//!
//! Core value objects and entities shared by every Obsidian subsystem.
//!
//! ## Clusters
//!
//! - **Value objects**: `Address`, `Hash`, `StorageKey`, `StorageValue`,
//!   `Bytes`, 256-bit words
//! - **Chain**: `BlockHeader`, `BlockBody`, `Transaction`, `Receipt`, `Log`,
//!   `Bloom`
//! - **State**: `Account`
//! - **Consensus rules**: `Fork`, `ForkSchedule`, `ChainConfig`
//! - **Wire format**: RLP encoding and decoding
//!
//! All consensus-committed encodings are RLP; `serde` derives are carried
//! on entities for the surrounding subsystems' own serialization needs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entities;
pub mod errors;
pub mod fork;
pub mod rlp;
pub mod transaction;
pub mod value_objects;

// Re-exports
pub use entities::{Account, BlockBody, BlockHeader, Bloom, Log, Receipt, ReceiptOutcome};
pub use errors::RlpError;
pub use fork::{ChainConfig, Fork, ForkSchedule};
pub use transaction::{
    AccessListEntry, AccessListTransaction, DynamicFeeTransaction, LegacyTransaction, Transaction,
    TxSignature, TxType,
};
pub use value_objects::{Address, Bytes, Hash, StorageKey, StorageValue, U256, U512};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
