//! # Ports
//!
//! The seams the interpreter depends on: mutable account state, block
//! context, and historical block hashes for BLOCKHASH.

use ob_02_state_trie::{AccessStatus, Snapshot, StateError};
use shared_types::{Address, Bytes, Hash, StorageKey, StorageValue, U256};

/// Mutable world state as the interpreter sees it.
///
/// Production: `AccountsCache` via the adapter in
/// [`crate::adapters::state`]. The snapshot methods must nest with call
/// frames; `revert` restores every field touched since the checkpoint.
pub trait StateAccess {
    /// Balance in wei.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn balance(&mut self, address: Address) -> Result<U256, StateError>;

    /// Account nonce.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn nonce(&mut self, address: Address) -> Result<u64, StateError>;

    /// Contract code.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn code(&mut self, address: Address) -> Result<Bytes, StateError>;

    /// Keccak of the contract code.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn code_hash(&mut self, address: Address) -> Result<Hash, StateError>;

    /// True if the account is present in state.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn account_exists(&mut self, address: Address) -> Result<bool, StateError>;

    /// True if absent or empty per EIP-161.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn is_empty_account(&mut self, address: Address) -> Result<bool, StateError>;

    /// Current storage value.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn storage(&mut self, address: Address, key: StorageKey)
        -> Result<StorageValue, StateError>;

    /// Transaction-start storage value (EIP-1283/2200).
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn original_storage(
        &mut self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError>;

    /// Write a storage slot.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn set_storage(
        &mut self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), StateError>;

    /// Overwrite a nonce.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), StateError>;

    /// Increment a nonce.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn increment_nonce(&mut self, address: Address) -> Result<(), StateError>;

    /// Install contract code.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError>;

    /// Credit wei.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError>;

    /// Move wei between accounts.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` if the sender is short.
    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), StateError>;

    /// Queue a self-destruct; returns true the first time.
    ///
    /// # Errors
    ///
    /// Propagates state-store failures.
    fn selfdestruct(
        &mut self,
        address: Address,
        beneficiary: Address,
    ) -> Result<bool, StateError>;

    /// True if already queued this transaction.
    fn has_selfdestructed(&self, address: Address) -> bool;

    /// Mark an account touched (EIP-161).
    fn touch(&mut self, address: Address);

    /// Record an account access; prior warmth (EIP-2929).
    fn access_address(&mut self, address: Address) -> AccessStatus;

    /// Record a slot access; prior warmth (EIP-2929).
    fn access_slot(&mut self, address: Address, key: StorageKey) -> AccessStatus;

    /// Checkpoint for frame entry.
    fn snapshot(&self) -> Snapshot;

    /// Undo everything since the checkpoint.
    fn revert(&mut self, snapshot: Snapshot);

    /// Fold the checkpoint into the enclosing frame.
    fn commit(&mut self, snapshot: Snapshot);
}

/// Block-level execution context.
#[derive(Clone, Debug)]
pub struct BlockEnv {
    /// Block height.
    pub number: u64,
    /// Block timestamp.
    pub timestamp: u64,
    /// Fee recipient.
    pub coinbase: Address,
    /// Difficulty (prevrandao after the Merge).
    pub difficulty: U256,
    /// Block gas limit.
    pub gas_limit: u64,
    /// EIP-1559 base fee, when London is active.
    pub base_fee: Option<U256>,
    /// Chain id exposed by CHAINID.
    pub chain_id: u64,
}

/// Transaction-level execution context.
#[derive(Clone, Copy, Debug)]
pub struct TxEnv {
    /// Transaction originator.
    pub origin: Address,
    /// Effective gas price exposed by GASPRICE.
    pub gas_price: U256,
}

/// Historical block hash lookup for BLOCKHASH.
pub trait BlockHashes {
    /// Hash of the block at `number`, if within reach.
    fn block_hash(&self, number: u64) -> Option<Hash>;
}

/// A lookup that knows no history; BLOCKHASH reads zero.
pub struct NoBlockHashes;

impl BlockHashes for NoBlockHashes {
    fn block_hash(&self, _number: u64) -> Option<Hash> {
        None
    }
}
