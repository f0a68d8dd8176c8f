//! # In-Memory Store Adapter
//!
//! A `HashMap` behind a `parking_lot` lock, plus the buffered transaction
//! used for atomic block persistence. Production deployments swap in an
//! on-disk adapter behind the same [`KeyValue`] port.

use crate::errors::StoreError;
use crate::ports::KeyValue;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

/// In-memory key-value store.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKeyValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Open a transaction over this store. Writes are buffered in an
    /// overlay until [`StoreTransaction::commit`]; dropping the
    /// transaction discards them.
    #[must_use]
    pub fn begin_transaction(&self) -> StoreTransaction<'_> {
        StoreTransaction {
            store: self,
            overlay: RwLock::new(HashMap::new()),
            closed: RwLock::new(false),
        }
    }

    /// A stable fingerprint of the full store contents, for asserting that
    /// a rejected block left the persisted state untouched.
    #[must_use]
    pub fn content_snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut entries: Vec<_> = self
            .data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }
}

impl KeyValue for MemoryKeyValueStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.data.write().remove(key);
        Ok(())
    }
}

/// A buffered write transaction over a [`MemoryKeyValueStore`].
///
/// The overlay maps keys to `Some(value)` for pending writes and `None`
/// for pending deletes. Reads consult the overlay first, so the
/// transaction observes its own uncommitted writes.
pub struct StoreTransaction<'a> {
    store: &'a MemoryKeyValueStore,
    overlay: RwLock<HashMap<Vec<u8>, Option<Vec<u8>>>>,
    closed: RwLock<bool>,
}

impl StoreTransaction<'_> {
    /// Number of buffered operations.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.overlay.read().len()
    }

    /// Apply all buffered writes to the store atomically.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` if already committed or disposed.
    pub fn commit(self) -> Result<(), StoreError> {
        if *self.closed.read() {
            return Err(StoreError::TransactionClosed);
        }
        let overlay = std::mem::take(&mut *self.overlay.write());
        trace!(writes = overlay.len(), "committing store transaction");
        let mut data = self.store.data.write();
        for (key, value) in overlay {
            match value {
                Some(value) => {
                    data.insert(key, value);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        *self.closed.write() = true;
        Ok(())
    }

    /// Discard all buffered writes. Dropping the transaction has the same
    /// effect; the explicit form documents intent at call sites.
    pub fn dispose(self) {
        trace!(
            writes = self.overlay.read().len(),
            "disposing store transaction"
        );
        *self.closed.write() = true;
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if *self.closed.read() {
            return Err(StoreError::TransactionClosed);
        }
        Ok(())
    }
}

impl KeyValue for StoreTransaction<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(pending) = self.overlay.read().get(key) {
            return Ok(pending.clone());
        }
        self.store.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        self.overlay
            .write()
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        self.overlay.write().insert(key.to_vec(), None);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
