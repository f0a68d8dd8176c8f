//! # State Adapter
//!
//! Binds [`StateAccess`] to the accounts cache of the state subsystem.

use crate::ports::StateAccess;
use ob_02_state_trie::{AccessStatus, AccountsCache, Snapshot, StateError};
use shared_types::{Address, Bytes, Hash, StorageKey, StorageValue, U256};

impl StateAccess for AccountsCache<'_> {
    fn balance(&mut self, address: Address) -> Result<U256, StateError> {
        AccountsCache::balance(self, address)
    }

    fn nonce(&mut self, address: Address) -> Result<u64, StateError> {
        AccountsCache::nonce(self, address)
    }

    fn code(&mut self, address: Address) -> Result<Bytes, StateError> {
        AccountsCache::code(self, address)
    }

    fn code_hash(&mut self, address: Address) -> Result<Hash, StateError> {
        AccountsCache::code_hash(self, address)
    }

    fn account_exists(&mut self, address: Address) -> Result<bool, StateError> {
        AccountsCache::account_exists(self, address)
    }

    fn is_empty_account(&mut self, address: Address) -> Result<bool, StateError> {
        AccountsCache::is_empty_account(self, address)
    }

    fn storage(
        &mut self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        AccountsCache::get_storage(self, address, key)
    }

    fn original_storage(
        &mut self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        AccountsCache::get_original_storage(self, address, key)
    }

    fn set_storage(
        &mut self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), StateError> {
        AccountsCache::set_storage(self, address, key, value)
    }

    fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), StateError> {
        AccountsCache::set_nonce(self, address, nonce)
    }

    fn increment_nonce(&mut self, address: Address) -> Result<(), StateError> {
        AccountsCache::increment_nonce(self, address)
    }

    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError> {
        AccountsCache::set_code(self, address, code)
    }

    fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        AccountsCache::add_balance(self, address, amount)
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), StateError> {
        AccountsCache::transfer(self, from, to, amount)
    }

    fn selfdestruct(
        &mut self,
        address: Address,
        beneficiary: Address,
    ) -> Result<bool, StateError> {
        AccountsCache::selfdestruct(self, address, beneficiary)
    }

    fn has_selfdestructed(&self, address: Address) -> bool {
        AccountsCache::has_selfdestructed(self, address)
    }

    fn touch(&mut self, address: Address) {
        AccountsCache::touch(self, address);
    }

    fn access_address(&mut self, address: Address) -> AccessStatus {
        AccountsCache::access_address(self, address)
    }

    fn access_slot(&mut self, address: Address, key: StorageKey) -> AccessStatus {
        AccountsCache::access_slot(self, address, key)
    }

    fn snapshot(&self) -> Snapshot {
        AccountsCache::snapshot(self)
    }

    fn revert(&mut self, snapshot: Snapshot) {
        AccountsCache::revert(self, snapshot);
    }

    fn commit(&mut self, snapshot: Snapshot) {
        AccountsCache::commit(self, snapshot);
    }
}
