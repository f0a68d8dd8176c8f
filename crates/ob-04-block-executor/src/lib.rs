//! # Block Executor (Subsystem 04)
//!
//! Drives the state transition: per-block validation (gas limit, base
//! fee, body commitments), per-transaction execution through the EVM,
//! block and ommer rewards, post-execution commitment verification, and
//! atomic persistence into the canonical chain store.
//!
//! A rejected block disposes its store transaction; the persisted state
//! is bit-identical to before the call.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain_store;
pub mod errors;
pub mod executor;
pub mod fees;
pub mod ports;
pub mod rewards;
pub mod tx;

// Re-exports
pub use chain_store::ChainStore;
pub use errors::{BlockError, TxError};
pub use executor::execute_block;
pub use ports::{ExecutionObserver, NoopObserver};
pub use tx::{process_transaction, TransactionOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
