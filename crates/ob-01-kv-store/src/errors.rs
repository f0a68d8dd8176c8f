//! Error types for key-value storage.

use thiserror::Error;

/// Errors from store and transaction operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A write reached a transaction that was already committed or
    /// disposed.
    #[error("transaction is closed")]
    TransactionClosed,

    /// The backing adapter failed; the message is adapter-specific.
    #[error("storage backend error: {0}")]
    Backend(String),
}
