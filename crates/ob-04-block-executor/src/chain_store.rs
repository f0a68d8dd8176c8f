//! # Chain Store
//!
//! Canonical chain persistence over the key-value store:
//!
//! - `"H" ‖ number → blockHash` (canonical index)
//! - `"h" ‖ blockHash → RLP(header)`
//! - `"b" ‖ blockHash → RLP(body)`
//! - `"r" ‖ blockHash → RLP(receipts)`
//! - `"best" → blockHash` (canonical tip)
//!
//! `persist_blocks` applies a batch atomically: every block executes
//! inside one store transaction that commits only if the whole batch
//! validates.

use crate::errors::BlockError;
use crate::executor::execute_block;
use crate::ports::NoopObserver;
use ob_01_kv_store::{KeyValue, MemoryKeyValueStore};
use ob_03_evm::BlockHashes;
use shared_types::rlp::{self, RlpList};
use shared_types::{BlockBody, BlockHeader, ChainConfig, Hash, Receipt};
use std::sync::Arc;
use tracing::{debug, info};

const KEY_BEST: &[u8] = b"best";

fn canonical_key(number: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(b'H');
    key.extend_from_slice(&number.to_be_bytes());
    key
}

fn header_key(hash: &Hash) -> Vec<u8> {
    prefixed_key(b'h', hash)
}

fn body_key(hash: &Hash) -> Vec<u8> {
    prefixed_key(b'b', hash)
}

fn receipts_key(hash: &Hash) -> Vec<u8> {
    prefixed_key(b'r', hash)
}

fn prefixed_key(prefix: u8, hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(prefix);
    key.extend_from_slice(hash.as_bytes());
    key
}

/// Canonical-index view over an open transaction, backing BLOCKHASH for
/// in-flight blocks.
struct CanonicalView<'a> {
    db: &'a dyn KeyValue,
}

impl BlockHashes for CanonicalView<'_> {
    fn block_hash(&self, number: u64) -> Option<Hash> {
        let bytes = self.db.get(&canonical_key(number)).ok()??;
        Hash::from_slice(&bytes)
    }
}

/// The canonical chain database consumed by the surrounding subsystems.
pub struct ChainStore {
    db: Arc<MemoryKeyValueStore>,
    config: ChainConfig,
}

impl ChainStore {
    /// A store over `db` configured for `config`'s chain.
    #[must_use]
    pub fn new(db: Arc<MemoryKeyValueStore>, config: ChainConfig) -> Self {
        Self { db, config }
    }

    /// The chain configuration.
    #[must_use]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Install block zero. The genesis state itself is expected to have
    /// been persisted by the caller (genesis construction is outside the
    /// core).
    ///
    /// # Errors
    ///
    /// Returns `BlockError::Store` on store failures.
    pub fn install_genesis(&self, header: &BlockHeader) -> Result<(), BlockError> {
        let hash = header.hash();
        self.db.put(&header_key(&hash), &header.encode())?;
        self.db.put(&body_key(&hash), &BlockBody::default().encode())?;
        self.db.put(&canonical_key(header.number), hash.as_bytes())?;
        self.db.put(KEY_BEST, hash.as_bytes())?;
        info!(?hash, "installed genesis block");
        Ok(())
    }

    /// Hash of block zero.
    ///
    /// # Errors
    ///
    /// Returns `MissingGenesis` when no genesis is installed.
    pub fn genesis_hash(&self) -> Result<Hash, BlockError> {
        self.db
            .get(&canonical_key(0))?
            .and_then(|bytes| Hash::from_slice(&bytes))
            .ok_or(BlockError::MissingGenesis)
    }

    /// The canonical tip header.
    ///
    /// # Errors
    ///
    /// Returns `MissingGenesis` when the store is empty.
    pub fn best_header(&self) -> Result<BlockHeader, BlockError> {
        let hash = self
            .db
            .get(KEY_BEST)?
            .and_then(|bytes| Hash::from_slice(&bytes))
            .ok_or(BlockError::MissingGenesis)?;
        self.header_by_hash(&hash)?.ok_or(BlockError::MissingGenesis)
    }

    /// Header by block hash.
    ///
    /// # Errors
    ///
    /// Returns `BlockError` on store failures or corrupt stored data.
    pub fn header_by_hash(&self, hash: &Hash) -> Result<Option<BlockHeader>, BlockError> {
        match self.db.get(&header_key(hash))? {
            Some(bytes) => Ok(Some(BlockHeader::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Header by canonical block number.
    ///
    /// # Errors
    ///
    /// Returns `BlockError` on store failures or corrupt stored data.
    pub fn header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, BlockError> {
        match self.db.get(&canonical_key(number))? {
            Some(bytes) => match Hash::from_slice(&bytes) {
                Some(hash) => self.header_by_hash(&hash),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Canonical child of `header`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `BlockError` on store failures or corrupt stored data.
    pub fn successor_header(&self, header: &BlockHeader) -> Result<Option<BlockHeader>, BlockError> {
        let Some(child) = self.header_by_number(header.number + 1)? else {
            return Ok(None);
        };
        if child.parent_hash == header.hash() {
            Ok(Some(child))
        } else {
            Ok(None)
        }
    }

    /// Block body by hash.
    ///
    /// # Errors
    ///
    /// Returns `BlockError` on store failures or corrupt stored data.
    pub fn body(&self, hash: &Hash) -> Result<Option<BlockBody>, BlockError> {
        match self.db.get(&body_key(hash))? {
            Some(bytes) => Ok(Some(BlockBody::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Receipts of the block at `hash`.
    ///
    /// # Errors
    ///
    /// Returns `BlockError` on store failures or corrupt stored data.
    pub fn receipts(&self, hash: &Hash) -> Result<Option<Vec<Receipt>>, BlockError> {
        let Some(bytes) = self.db.get(&receipts_key(hash))? else {
            return Ok(None);
        };
        let item = rlp::decode(&bytes)?;
        let receipts = item
            .as_list()?
            .iter()
            .map(|entry| Ok(Receipt::decode(entry.as_bytes()?)?))
            .collect::<Result<Vec<_>, BlockError>>()?;
        Ok(Some(receipts))
    }

    /// Validate and apply a batch of blocks extending the canonical tip.
    /// The whole batch commits atomically; any failure leaves the store
    /// bit-identical to before the call.
    ///
    /// # Errors
    ///
    /// Returns the first validation or execution failure.
    pub fn persist_blocks(
        &self,
        headers: &[BlockHeader],
        bodies: &[BlockBody],
    ) -> Result<(), BlockError> {
        if headers.len() != bodies.len() {
            return Err(BlockError::LengthMismatch {
                headers: headers.len(),
                bodies: bodies.len(),
            });
        }
        if headers.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin_transaction();
        let mut parent = self.best_header()?;

        for (header, body) in headers.iter().zip(bodies.iter()) {
            if header.parent_hash != parent.hash() {
                txn.dispose();
                return Err(BlockError::ParentNotFound(header.parent_hash));
            }

            let view = CanonicalView { db: &txn };
            let receipts = match execute_block(
                &txn,
                &self.config,
                &parent,
                header,
                body,
                &view,
                &NoopObserver,
            ) {
                Ok(receipts) => receipts,
                Err(err) => {
                    txn.dispose();
                    return Err(err);
                }
            };

            let hash = header.hash();
            let mut encoded_receipts = RlpList::new();
            for receipt in &receipts {
                encoded_receipts.append_bytes(&receipt.encode());
            }

            let result = txn
                .put(&header_key(&hash), &header.encode())
                .and_then(|()| txn.put(&body_key(&hash), &body.encode()))
                .and_then(|()| txn.put(&receipts_key(&hash), &encoded_receipts.finish()))
                .and_then(|()| txn.put(&canonical_key(header.number), hash.as_bytes()))
                .and_then(|()| txn.put(KEY_BEST, hash.as_bytes()));
            if let Err(err) = result {
                txn.dispose();
                return Err(err.into());
            }

            debug!(number = header.number, ?hash, "block validated");
            parent = header.clone();
        }

        txn.commit()?;
        info!(
            blocks = headers.len(),
            tip = headers.last().map(|header| header.number),
            "persisted block batch"
        );
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
