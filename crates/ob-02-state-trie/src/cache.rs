//! # Accounts Cache
//!
//! The mutable in-memory view over an accounts trie that block execution
//! mutates. Every change is journaled so snapshots can be taken and
//! reverted along EVM call-frame boundaries; `persist` flushes dirty
//! accounts and storage into the underlying store and yields the new state
//! root.
//!
//! The cache also owns the transaction-scoped sets: touched accounts
//! (EIP-161 reaping), queued self-destructs, warm addresses and slots
//! (EIP-2929), and the original storage values net gas metering consults.

use crate::errors::{StateError, TrieError};
use crate::trie::SecureTrie;
use ob_01_kv_store::KeyValue;
use shared_types::rlp;
use shared_types::{Account, Address, Bytes, Fork, Hash, StorageKey, StorageValue, U256};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Warm/cold classification of an access (EIP-2929).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessStatus {
    /// Seen before in this transaction.
    Warm,
    /// First access; surcharged under Berlin rules.
    Cold,
}

/// Opaque checkpoint into the journal; returned by
/// [`AccountsCache::snapshot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot(usize);

#[derive(Clone, Debug)]
struct AccountEntry {
    account: Account,
    /// Present in the trie, or materialized by a write this block.
    exists: bool,
    dirty: bool,
}

#[derive(Clone, Debug)]
enum JournalEntry {
    BalanceChange {
        address: Address,
        prev: U256,
    },
    NonceChange {
        address: Address,
        prev: u64,
    },
    CodeChange {
        address: Address,
        prev_code_hash: Hash,
    },
    StorageChange {
        address: Address,
        key: StorageKey,
        prev: StorageValue,
        prev_dirty: bool,
    },
    Materialized {
        address: Address,
    },
    Touched {
        address: Address,
    },
    SelfDestructQueued {
        address: Address,
    },
    WarmedAddress {
        address: Address,
    },
    WarmedSlot {
        address: Address,
        key: StorageKey,
    },
}

/// Journaled mutable view over an accounts trie and its storage tries.
pub struct AccountsCache<'db> {
    db: &'db dyn KeyValue,
    trie: SecureTrie<'db>,
    accounts: HashMap<Address, AccountEntry>,
    codes: HashMap<Hash, Bytes>,
    storage: HashMap<Address, HashMap<StorageKey, StorageValue>>,
    dirty_storage: HashMap<Address, HashSet<StorageKey>>,
    original_storage: HashMap<(Address, StorageKey), StorageValue>,
    touched: HashSet<Address>,
    selfdestructs: HashSet<Address>,
    pending_deletes: HashSet<Address>,
    warm_addresses: HashSet<Address>,
    warm_slots: HashSet<(Address, StorageKey)>,
    journal: Vec<JournalEntry>,
}

impl<'db> AccountsCache<'db> {
    /// A cache over an empty accounts trie.
    #[must_use]
    pub fn new(db: &'db dyn KeyValue) -> Self {
        Self::at_root(db, Hash::EMPTY_TRIE)
    }

    /// A cache rooted at a committed state root.
    #[must_use]
    pub fn at_root(db: &'db dyn KeyValue, root: Hash) -> Self {
        Self {
            db,
            trie: SecureTrie::at_root(db, root),
            accounts: HashMap::new(),
            codes: HashMap::new(),
            storage: HashMap::new(),
            dirty_storage: HashMap::new(),
            original_storage: HashMap::new(),
            touched: HashSet::new(),
            selfdestructs: HashSet::new(),
            pending_deletes: HashSet::new(),
            warm_addresses: HashSet::new(),
            warm_slots: HashSet::new(),
            journal: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    fn load_entry(&mut self, address: Address) -> Result<&mut AccountEntry, StateError> {
        match self.accounts.entry(address) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(slot) => {
                let (account, exists) = match self.trie.get(address.as_bytes())? {
                    Some(bytes) => (
                        Account::decode(&bytes).map_err(TrieError::CorruptNode)?,
                        true,
                    ),
                    None => (Account::default(), false),
                };
                Ok(slot.insert(AccountEntry {
                    account,
                    exists,
                    dirty: false,
                }))
            }
        }
    }

    fn materialize(&mut self, address: Address) -> Result<(), StateError> {
        let entry = self.load_entry(address)?;
        if !entry.exists {
            entry.exists = true;
            self.journal.push(JournalEntry::Materialized { address });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Read surface
    // -------------------------------------------------------------------------

    /// The account record for `address`; absent addresses read as the
    /// default account.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn get_account(&mut self, address: Address) -> Result<Account, StateError> {
        Ok(self.load_entry(address)?.account)
    }

    /// True if the address is present in state.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn account_exists(&mut self, address: Address) -> Result<bool, StateError> {
        Ok(self.load_entry(address)?.exists)
    }

    /// True if the address is absent or empty per EIP-161.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn is_empty_account(&mut self, address: Address) -> Result<bool, StateError> {
        let entry = self.load_entry(address)?;
        Ok(!entry.exists || entry.account.is_empty())
    }

    /// Balance in wei.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn balance(&mut self, address: Address) -> Result<U256, StateError> {
        Ok(self.load_entry(address)?.account.balance)
    }

    /// Account nonce.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn nonce(&mut self, address: Address) -> Result<u64, StateError> {
        Ok(self.load_entry(address)?.account.nonce)
    }

    /// Code hash; `Hash::EMPTY_CODE` for codeless accounts.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn code_hash(&mut self, address: Address) -> Result<Hash, StateError> {
        Ok(self.load_entry(address)?.account.code_hash)
    }

    /// The account's code.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures or a dangling code hash.
    pub fn code(&mut self, address: Address) -> Result<Bytes, StateError> {
        let hash = self.code_hash(address)?;
        if hash == Hash::EMPTY_CODE {
            return Ok(Bytes::new());
        }
        if let Some(code) = self.codes.get(&hash) {
            return Ok(code.clone());
        }
        let bytes = self
            .db
            .get(hash.as_bytes())?
            .ok_or(StateError::MissingCode(hash))?;
        let code = Bytes::from_vec(bytes);
        self.codes.insert(hash, code.clone());
        Ok(code)
    }

    /// Current value of a storage slot; absent slots read as zero.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn get_storage(
        &mut self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        if let Some(value) = self.storage.get(&address).and_then(|slots| slots.get(&key)) {
            return Ok(*value);
        }
        let root = self.load_entry(address)?.account.storage_root;
        let value = if root == Hash::EMPTY_TRIE {
            StorageValue::ZERO
        } else {
            let trie = SecureTrie::at_root(self.db, root);
            match trie.get(key.as_bytes())? {
                Some(encoded) => {
                    let word = rlp::decode(&encoded)
                        .and_then(|item| item.as_u256())
                        .map_err(TrieError::CorruptNode)?;
                    StorageValue::from_word(word)
                }
                None => StorageValue::ZERO,
            }
        };
        self.storage.entry(address).or_default().insert(key, value);
        Ok(value)
    }

    /// The slot's value at the start of the current transaction, for net
    /// gas metering (EIP-1283/2200).
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn get_original_storage(
        &mut self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        if let Some(value) = self.original_storage.get(&(address, key)) {
            return Ok(*value);
        }
        let current = self.get_storage(address, key)?;
        self.original_storage.insert((address, key), current);
        Ok(current)
    }

    // -------------------------------------------------------------------------
    // Write surface
    // -------------------------------------------------------------------------

    /// Overwrite the balance.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn set_balance(&mut self, address: Address, balance: U256) -> Result<(), StateError> {
        self.materialize(address)?;
        let entry = self.load_entry(address)?;
        let prev = entry.account.balance;
        entry.account.balance = balance;
        entry.dirty = true;
        self.journal.push(JournalEntry::BalanceChange { address, prev });
        self.touch(address);
        Ok(())
    }

    /// Credit `amount` wei. A zero credit still touches the account.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let balance = self.balance(address)?;
        self.set_balance(address, balance.saturating_add(amount))
    }

    /// Debit `amount` wei.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` if the account holds less than
    /// `amount`.
    pub fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let balance = self.balance(address)?;
        if balance < amount {
            return Err(StateError::InsufficientBalance {
                address,
                required: amount,
                available: balance,
            });
        }
        self.set_balance(address, balance - amount)
    }

    /// Move `amount` wei between accounts.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` if the sender holds less than
    /// `amount`.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), StateError> {
        self.sub_balance(from, amount)?;
        self.add_balance(to, amount)
    }

    /// Set the nonce.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), StateError> {
        self.materialize(address)?;
        let entry = self.load_entry(address)?;
        let prev = entry.account.nonce;
        entry.account.nonce = nonce;
        entry.dirty = true;
        self.journal.push(JournalEntry::NonceChange { address, prev });
        Ok(())
    }

    /// Increment the nonce by one.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn increment_nonce(&mut self, address: Address) -> Result<(), StateError> {
        let nonce = self.nonce(address)?;
        self.set_nonce(address, nonce.saturating_add(1))
    }

    /// Install code, hashing it and caching the bytes for `persist`.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError> {
        self.materialize(address)?;
        let hash = if code.is_empty() {
            Hash::EMPTY_CODE
        } else {
            Hash::keccak(code.as_slice())
        };
        let entry = self.load_entry(address)?;
        let prev_code_hash = entry.account.code_hash;
        entry.account.code_hash = hash;
        entry.dirty = true;
        if hash != Hash::EMPTY_CODE {
            self.codes.insert(hash, code);
        }
        self.journal.push(JournalEntry::CodeChange {
            address,
            prev_code_hash,
        });
        Ok(())
    }

    /// Write a storage slot. Writing zero queues deletion of the key at
    /// `persist`.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn set_storage(
        &mut self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), StateError> {
        let prev = self.get_storage(address, key)?;
        self.original_storage.entry((address, key)).or_insert(prev);
        let prev_dirty = self
            .dirty_storage
            .get(&address)
            .is_some_and(|keys| keys.contains(&key));

        self.journal.push(JournalEntry::StorageChange {
            address,
            key,
            prev,
            prev_dirty,
        });
        self.storage.entry(address).or_default().insert(key, value);
        self.dirty_storage.entry(address).or_default().insert(key);
        self.load_entry(address)?.dirty = true;
        Ok(())
    }

    /// Mark an account touched (EIP-161).
    pub fn touch(&mut self, address: Address) {
        if self.touched.insert(address) {
            self.journal.push(JournalEntry::Touched { address });
        }
    }

    /// Queue the contract for deletion at transaction end, moving its full
    /// balance to `beneficiary` immediately. A self-beneficiary burns the
    /// balance. Returns true the first time the contract is queued.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn selfdestruct(
        &mut self,
        address: Address,
        beneficiary: Address,
    ) -> Result<bool, StateError> {
        let balance = self.balance(address)?;
        if beneficiary != address {
            self.add_balance(beneficiary, balance)?;
        }
        self.set_balance(address, U256::zero())?;

        let newly_queued = self.selfdestructs.insert(address);
        if newly_queued {
            self.journal.push(JournalEntry::SelfDestructQueued { address });
        }
        Ok(newly_queued)
    }

    /// True if the contract is queued for deletion this transaction.
    #[must_use]
    pub fn has_selfdestructed(&self, address: Address) -> bool {
        self.selfdestructs.contains(&address)
    }

    // -------------------------------------------------------------------------
    // Warm/cold access sets (EIP-2929)
    // -------------------------------------------------------------------------

    /// Record an account access, returning its prior warmth.
    pub fn access_address(&mut self, address: Address) -> AccessStatus {
        if self.warm_addresses.insert(address) {
            self.journal.push(JournalEntry::WarmedAddress { address });
            AccessStatus::Cold
        } else {
            AccessStatus::Warm
        }
    }

    /// Record a storage slot access, returning its prior warmth.
    pub fn access_slot(&mut self, address: Address, key: StorageKey) -> AccessStatus {
        if self.warm_slots.insert((address, key)) {
            self.journal.push(JournalEntry::WarmedSlot { address, key });
            AccessStatus::Cold
        } else {
            AccessStatus::Warm
        }
    }

    /// True if the address is warm.
    #[must_use]
    pub fn is_warm_address(&self, address: Address) -> bool {
        self.warm_addresses.contains(&address)
    }

    /// True if the slot is warm.
    #[must_use]
    pub fn is_warm_slot(&self, address: Address, key: StorageKey) -> bool {
        self.warm_slots.contains(&(address, key))
    }

    /// Warm an address during transaction setup, outside any snapshot.
    pub fn prewarm_address(&mut self, address: Address) {
        self.warm_addresses.insert(address);
    }

    /// Warm a slot during transaction setup, outside any snapshot.
    pub fn prewarm_slot(&mut self, address: Address, key: StorageKey) {
        self.warm_slots.insert((address, key));
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    /// Checkpoint the journal; pairs with [`Self::revert`] or
    /// [`Self::commit`] in call-frame order.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.journal.len())
    }

    /// Undo every change since `snapshot`.
    pub fn revert(&mut self, snapshot: Snapshot) {
        while self.journal.len() > snapshot.0 {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            self.undo(entry);
        }
    }

    /// Fold the snapshot into the enclosing frame. Journal entries are
    /// retained so an outer revert still undoes them.
    pub fn commit(&mut self, snapshot: Snapshot) {
        debug_assert!(snapshot.0 <= self.journal.len());
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::BalanceChange { address, prev } => {
                if let Some(entry) = self.accounts.get_mut(&address) {
                    entry.account.balance = prev;
                }
            }
            JournalEntry::NonceChange { address, prev } => {
                if let Some(entry) = self.accounts.get_mut(&address) {
                    entry.account.nonce = prev;
                }
            }
            JournalEntry::CodeChange {
                address,
                prev_code_hash,
            } => {
                if let Some(entry) = self.accounts.get_mut(&address) {
                    entry.account.code_hash = prev_code_hash;
                }
            }
            JournalEntry::StorageChange {
                address,
                key,
                prev,
                prev_dirty,
            } => {
                if let Some(slots) = self.storage.get_mut(&address) {
                    slots.insert(key, prev);
                }
                if !prev_dirty {
                    if let Some(keys) = self.dirty_storage.get_mut(&address) {
                        keys.remove(&key);
                    }
                }
            }
            JournalEntry::Materialized { address } => {
                if let Some(entry) = self.accounts.get_mut(&address) {
                    entry.exists = false;
                }
            }
            JournalEntry::Touched { address } => {
                self.touched.remove(&address);
            }
            JournalEntry::SelfDestructQueued { address } => {
                self.selfdestructs.remove(&address);
            }
            JournalEntry::WarmedAddress { address } => {
                self.warm_addresses.remove(&address);
            }
            JournalEntry::WarmedSlot { address, key } => {
                self.warm_slots.remove(&(address, key));
            }
        }
    }

    // -------------------------------------------------------------------------
    // Transaction lifecycle
    // -------------------------------------------------------------------------

    /// Reset transaction-scoped state. Called before each transaction.
    pub fn begin_transaction(&mut self) {
        self.journal.clear();
        self.original_storage.clear();
        self.touched.clear();
        self.selfdestructs.clear();
        self.warm_addresses.clear();
        self.warm_slots.clear();
    }

    /// Apply queued self-destructs and, when the fork reaps, delete empty
    /// touched accounts (EIP-161). Clears the transaction-scoped sets.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie failures.
    pub fn finalize_transaction(&mut self, fork: Fork) -> Result<(), StateError> {
        let destructed: Vec<Address> = self.selfdestructs.iter().copied().collect();
        for address in destructed {
            self.delete_account(address);
        }

        if fork.reaps_empty_accounts() {
            let touched: Vec<Address> = self.touched.iter().copied().collect();
            for address in touched {
                let reapable = {
                    let entry = self.load_entry(address)?;
                    entry.exists && entry.account.is_empty()
                };
                if reapable {
                    trace!(?address, "reaping empty touched account");
                    self.delete_account(address);
                }
            }
        }

        self.begin_transaction();
        Ok(())
    }

    fn delete_account(&mut self, address: Address) {
        self.pending_deletes.insert(address);
        self.accounts.insert(
            address,
            AccountEntry {
                account: Account::default(),
                exists: false,
                dirty: false,
            },
        );
        self.storage.remove(&address);
        self.dirty_storage.remove(&address);
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Flush dirty accounts, dirty storage tries, and new code into the
    /// store, returning the new state root.
    ///
    /// # Errors
    ///
    /// Returns `StateError` on trie or store failures.
    pub fn persist(&mut self) -> Result<Hash, StateError> {
        // Storage tries first, so account records carry fresh roots.
        let dirty_addresses: Vec<Address> = self.dirty_storage.keys().copied().collect();
        for address in dirty_addresses {
            let Some(keys) = self.dirty_storage.remove(&address) else {
                continue;
            };
            let root = self.load_entry(address)?.account.storage_root;
            let mut storage_trie = SecureTrie::at_root(self.db, root);
            for key in keys {
                let value = self
                    .storage
                    .get(&address)
                    .and_then(|slots| slots.get(&key))
                    .copied()
                    .unwrap_or(StorageValue::ZERO);
                if value.is_zero() {
                    storage_trie.remove(key.as_bytes())?;
                } else {
                    storage_trie.insert(key.as_bytes(), rlp::encode_u256(value.into_word()))?;
                }
            }
            let new_root = storage_trie.root_hash()?;
            let entry = self.load_entry(address)?;
            entry.account.storage_root = new_root;
            entry.dirty = true;
        }

        for (hash, code) in &self.codes {
            self.db.put(hash.as_bytes(), code.as_slice())?;
        }

        for address in std::mem::take(&mut self.pending_deletes) {
            self.trie.remove(address.as_bytes())?;
        }

        for (address, entry) in &mut self.accounts {
            if entry.dirty && entry.exists {
                self.trie
                    .insert(address.as_bytes(), entry.account.encode())?;
                entry.dirty = false;
            }
        }

        let root = self.trie.root_hash()?;
        trace!(?root, "persisted accounts cache");
        Ok(root)
    }
}

// =============================================================================
// TESTS
// =============================================================================
