//! # Storage Ports
//!
//! The interface the trie and chain-index layers require from a
//! byte-keyed store. Implementations use interior mutability so one open
//! transaction can back several tries at once.

use crate::errors::StoreError;

/// Abstract byte-keyed map.
///
/// Production adapters wrap an on-disk database; tests and block execution
/// run against [`crate::MemoryKeyValueStore`] and its transactions.
pub trait KeyValue: Send + Sync {
    /// Get a value by key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert or overwrite a key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the enclosing
    /// transaction is closed.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Remove a key. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the enclosing
    /// transaction is closed.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Check whether a key is present.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails.
    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}
