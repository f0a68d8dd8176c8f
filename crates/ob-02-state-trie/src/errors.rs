//! Error types for the trie and accounts cache.

use ob_01_kv_store::StoreError;
use shared_types::{Address, Hash, RlpError, U256};
use thiserror::Error;

/// Errors from trie traversal and commitment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrieError {
    /// The store failed underneath the trie.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A referenced node is absent from the store.
    #[error("missing trie node: {0}")]
    MissingNode(Hash),

    /// A stored node failed to decode.
    #[error("corrupt trie node: {0}")]
    CorruptNode(#[from] RlpError),
}

/// Errors from the accounts cache.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Underlying trie failure.
    #[error("trie error: {0}")]
    Trie(#[from] TrieError),

    /// A balance subtraction would underflow.
    #[error("insufficient balance at {address}: required {required}, available {available}")]
    InsufficientBalance {
        /// Debited account.
        address: Address,
        /// Amount requested.
        required: U256,
        /// Amount held.
        available: U256,
    },

    /// Code referenced by an account is absent from the store.
    #[error("missing code: {0}")]
    MissingCode(Hash),
}

impl From<StoreError> for StateError {
    fn from(err: StoreError) -> Self {
        StateError::Trie(TrieError::Store(err))
    }
}
