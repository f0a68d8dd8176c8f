//! Error types for transaction and block execution.

use ob_01_kv_store::StoreError;
use ob_02_state_trie::{StateError, TrieError};
use shared_types::{Hash, RlpError, TxType, U256};
use thiserror::Error;

/// Reasons a transaction is invalid before or during execution. Any of
/// these fails the whole block: a block may not contain an invalid
/// transaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    /// Signature malformed or unrecoverable.
    #[error("invalid transaction signature")]
    InvalidSignature,

    /// Transaction type not yet activated by the fork schedule.
    #[error("transaction type {0:?} not supported by the active fork")]
    TypeNotSupported(TxType),

    /// Chain id does not match the configured chain.
    #[error("wrong chain id: expected {expected}, got {actual}")]
    WrongChainId {
        /// Configured chain id.
        expected: u64,
        /// Chain id carried by the transaction.
        actual: u64,
    },

    /// Sender nonce mismatch.
    #[error("invalid nonce: account at {expected}, transaction carries {actual}")]
    InvalidNonce {
        /// Account nonce.
        expected: u64,
        /// Transaction nonce.
        actual: u64,
    },

    /// Sender cannot cover gas and value up front.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Up-front cost in wei.
        required: U256,
        /// Sender balance.
        available: U256,
    },

    /// Gas limit below the intrinsic cost.
    #[error("intrinsic gas too low: limit {limit}, intrinsic {intrinsic}")]
    IntrinsicGasTooLow {
        /// Transaction gas limit.
        limit: u64,
        /// Intrinsic cost.
        intrinsic: u64,
    },

    /// Transaction would push the block over its gas limit.
    #[error("block gas limit exceeded: used {used} + limit {tx_limit} > {block_limit}")]
    GasLimitExceeded {
        /// Gas used by prior transactions.
        used: u64,
        /// This transaction's gas limit.
        tx_limit: u64,
        /// Block gas limit.
        block_limit: u64,
    },

    /// EIP-1559 fee cap below the block base fee.
    #[error("max fee {max_fee} below base fee {base_fee}")]
    FeeCapTooLow {
        /// Transaction fee cap.
        max_fee: U256,
        /// Block base fee.
        base_fee: U256,
    },

    /// EIP-1559 priority fee above the fee cap.
    #[error("priority fee {priority_fee} above max fee {max_fee}")]
    PriorityFeeTooHigh {
        /// Declared tip.
        priority_fee: U256,
        /// Fee cap.
        max_fee: U256,
    },

    /// Infrastructure failure in the state store.
    #[error("state error: {0}")]
    State(#[from] StateError),
}

/// Reasons a block (and therefore the whole `persist_blocks` batch) is
/// rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// Header/body list lengths differ.
    #[error("headers and bodies length mismatch: {headers} vs {bodies}")]
    LengthMismatch {
        /// Headers supplied.
        headers: usize,
        /// Bodies supplied.
        bodies: usize,
    },

    /// The header's parent is not the expected chain tip.
    #[error("parent not found: {0}")]
    ParentNotFound(Hash),

    /// No chain tip installed; the store needs a genesis block.
    #[error("chain store has no genesis")]
    MissingGenesis,

    /// Body transactions do not hash to the header's transactions root.
    #[error("bad transactions root: header {expected}, computed {computed}")]
    BadTransactionsRoot {
        /// Header commitment.
        expected: Hash,
        /// Root of the supplied body.
        computed: Hash,
    },

    /// Body ommers do not hash to the header's ommers hash.
    #[error("bad ommers hash: header {expected}, computed {computed}")]
    BadOmmersHash {
        /// Header commitment.
        expected: Hash,
        /// Hash of the supplied ommers.
        computed: Hash,
    },

    /// Gas limit out of bounds relative to the parent.
    #[error("bad gas limit {limit} against parent {parent_limit}")]
    BadGasLimit {
        /// Header gas limit.
        limit: u64,
        /// Parent gas limit (elasticity-adjusted at the London
        /// transition).
        parent_limit: u64,
    },

    /// Header base fee differs from the derived value.
    #[error("bad base fee: header {header:?}, expected {expected:?}")]
    BadBaseFee {
        /// Header value.
        header: Option<U256>,
        /// Derived value.
        expected: Option<U256>,
    },

    /// Computed state root differs from the header.
    #[error("bad state root: header {expected}, computed {computed}")]
    BadStateRoot {
        /// Header commitment.
        expected: Hash,
        /// Root after execution.
        computed: Hash,
    },

    /// Computed receipts root differs from the header.
    #[error("bad receipts root: header {expected}, computed {computed}")]
    BadReceiptsRoot {
        /// Header commitment.
        expected: Hash,
        /// Root of the computed receipts.
        computed: Hash,
    },

    /// OR of receipt blooms differs from the header bloom.
    #[error("bad logs bloom")]
    BadBloom,

    /// Header gas used differs from the execution total.
    #[error("bad gas used: header {expected}, computed {computed}")]
    BadGasUsed {
        /// Header value.
        expected: u64,
        /// Cumulative gas of the executed transactions.
        computed: u64,
    },

    /// A transaction in the block is invalid.
    #[error("invalid transaction at index {index}: {error}")]
    Transaction {
        /// Position in the block.
        index: usize,
        /// The failure.
        error: TxError,
    },

    /// Stored chain data failed to decode.
    #[error("corrupt chain data: {0}")]
    CorruptChainData(#[from] RlpError),

    /// Key-value store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// State store failure.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Trie failure.
    #[error("trie error: {0}")]
    Trie(#[from] TrieError),
}
