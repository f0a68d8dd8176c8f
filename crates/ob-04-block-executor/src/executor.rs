//! # Block Executor
//!
//! Applies one block to its parent state: pre-execution validation of the
//! body commitments, gas limit and base fee, per-transaction execution,
//! rewards, and post-execution verification of the state root, receipts
//! root, bloom, and gas-used commitments.

use crate::errors::BlockError;
use crate::fees;
use crate::ports::ExecutionObserver;
use crate::rewards::apply_rewards;
use crate::tx::process_transaction;
use ob_01_kv_store::KeyValue;
use ob_02_state_trie::{ordered_trie_root, AccountsCache};
use ob_03_evm::{BlockEnv, BlockHashes};
use shared_types::{BlockBody, BlockHeader, Bloom, ChainConfig, Receipt};
use tracing::{debug, warn};

/// Execute `body` under `header` against the state committed by `parent`,
/// writing state through `db` (normally an open store transaction).
/// Returns the receipts on success; any validation failure rejects the
/// block.
///
/// # Errors
///
/// Returns `BlockError` when a commitment check or a transaction fails;
/// the caller is responsible for disposing the store transaction so the
/// persisted state is untouched.
pub fn execute_block(
    db: &dyn KeyValue,
    config: &ChainConfig,
    parent: &BlockHeader,
    header: &BlockHeader,
    body: &BlockBody,
    block_hashes: &dyn BlockHashes,
    observer: &dyn ExecutionObserver,
) -> Result<Vec<Receipt>, BlockError> {
    let fork = config.fork_at(header.number);
    debug!(number = header.number, ?fork, "executing block");

    // Body commitments first: the header must describe this body.
    let transactions_root = ordered_trie_root(
        body.transactions.iter().map(shared_types::Transaction::encode),
    )?;
    if transactions_root != header.transactions_root {
        return Err(BlockError::BadTransactionsRoot {
            expected: header.transactions_root,
            computed: transactions_root,
        });
    }
    let ommers_hash = body.ommers_hash();
    if ommers_hash != header.ommers_hash {
        return Err(BlockError::BadOmmersHash {
            expected: header.ommers_hash,
            computed: ommers_hash,
        });
    }

    let parent_limit = fees::effective_parent_gas_limit(config, parent, header.number);
    fees::validate_gas_limit(header, parent_limit)?;
    fees::validate_base_fee(config, parent, header)?;

    let block_env = BlockEnv {
        number: header.number,
        timestamp: header.timestamp,
        coinbase: header.coinbase,
        difficulty: header.difficulty,
        gas_limit: header.gas_limit,
        base_fee: header.base_fee,
        chain_id: config.chain_id,
    };

    let mut cache = AccountsCache::at_root(db, parent.state_root);
    let mut receipts = Vec::with_capacity(body.transactions.len());
    let mut cumulative_gas_used = 0u64;

    for (index, tx) in body.transactions.iter().enumerate() {
        let outcome = process_transaction(
            &mut cache,
            config,
            &block_env,
            block_hashes,
            tx,
            cumulative_gas_used,
        )
        .map_err(|error| BlockError::Transaction { index, error })?;

        cumulative_gas_used = outcome.receipt.cumulative_gas_used;
        observer.transaction_executed(index, &outcome.receipt);
        receipts.push(outcome.receipt);
    }

    apply_rewards(&mut cache, fork, header, &body.ommers)?;

    let state_root = cache.persist()?;
    observer.state_root_computed(state_root, header.state_root);
    if state_root != header.state_root {
        warn!(
            number = header.number,
            computed = ?state_root,
            expected = ?header.state_root,
            "state root mismatch"
        );
        return Err(BlockError::BadStateRoot {
            expected: header.state_root,
            computed: state_root,
        });
    }

    let receipts_root = ordered_trie_root(receipts.iter().map(Receipt::encode))?;
    if receipts_root != header.receipts_root {
        return Err(BlockError::BadReceiptsRoot {
            expected: header.receipts_root,
            computed: receipts_root,
        });
    }

    let mut bloom = Bloom::new();
    for receipt in &receipts {
        bloom.union(&receipt.bloom);
    }
    if bloom != header.logs_bloom {
        return Err(BlockError::BadBloom);
    }

    if cumulative_gas_used != header.gas_used {
        return Err(BlockError::BadGasUsed {
            expected: header.gas_used,
            computed: cumulative_gas_used,
        });
    }

    Ok(receipts)
}
