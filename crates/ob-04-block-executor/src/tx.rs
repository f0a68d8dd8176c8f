//! # Transaction Processor
//!
//! Executes one transaction end to end: signature and nonce validation,
//! intrinsic gas, the up-front gas purchase, EVM execution, refunds,
//! coinbase payment, empty-account reaping, and receipt construction.
//!
//! The same entry point doubles as a dry-run hook: run it against a cache
//! over a disposable store transaction and throw both away.

use crate::errors::TxError;
use ob_02_state_trie::AccountsCache;
use ob_03_evm::interpreter::create_address;
use ob_03_evm::precompiles::{active_precompile_count, precompile_address};
use ob_03_evm::{
    BlockEnv, BlockHashes, CallKind, Evm, GasSchedule, Message, TxEnv, VmError,
};
use shared_types::{
    Address, ChainConfig, Fork, Receipt, ReceiptOutcome, Transaction, TxType, U256, U512,
};
use tracing::debug;

/// Result of applying one transaction.
#[derive(Clone, Debug)]
pub struct TransactionOutcome {
    /// The receipt committed under the receipts root.
    pub receipt: Receipt,
    /// Gas this transaction consumed, after the capped refund.
    pub gas_used: u64,
    /// Whether execution succeeded.
    pub success: bool,
    /// Address of the created contract, for successful creation
    /// transactions.
    pub contract_address: Option<Address>,
}

/// Execute `tx` against `cache` in block context, producing its receipt.
///
/// # Errors
///
/// Returns `TxError` when the transaction is invalid; the block
/// containing it must be rejected. Execution-level faults (out of gas,
/// reverts) are not errors: they produce a failed receipt.
#[allow(clippy::too_many_lines)]
pub fn process_transaction(
    cache: &mut AccountsCache<'_>,
    config: &ChainConfig,
    block: &BlockEnv,
    block_hashes: &dyn BlockHashes,
    tx: &Transaction,
    cumulative_gas_used: u64,
) -> Result<TransactionOutcome, TxError> {
    let fork = config.fork_at(block.number);
    let schedule = GasSchedule::for_fork(fork);

    validate_envelope(tx, fork, config)?;

    let sender = tx.recover_sender().map_err(|_| TxError::InvalidSignature)?;

    if let Some(base_fee) = block.base_fee {
        if tx.max_fee_per_gas() < base_fee {
            return Err(TxError::FeeCapTooLow {
                max_fee: tx.max_fee_per_gas(),
                base_fee,
            });
        }
        if tx.max_priority_fee_per_gas() > tx.max_fee_per_gas() {
            return Err(TxError::PriorityFeeTooHigh {
                priority_fee: tx.max_priority_fee_per_gas(),
                max_fee: tx.max_fee_per_gas(),
            });
        }
    }

    if cumulative_gas_used + tx.gas_limit() > block.gas_limit {
        return Err(TxError::GasLimitExceeded {
            used: cumulative_gas_used,
            tx_limit: tx.gas_limit(),
            block_limit: block.gas_limit,
        });
    }

    let account_nonce = cache.nonce(sender)?;
    if account_nonce != tx.nonce() {
        return Err(TxError::InvalidNonce {
            expected: account_nonce,
            actual: tx.nonce(),
        });
    }

    let balance = cache.balance(sender)?;
    let upfront = U512::from(tx.max_fee_per_gas()) * U512::from(tx.gas_limit())
        + U512::from(tx.value());
    if U512::from(balance) < upfront {
        return Err(TxError::InsufficientBalance {
            required: U256::try_from(upfront).unwrap_or(U256::MAX),
            available: balance,
        });
    }

    let intrinsic = schedule.intrinsic_gas(tx.data().as_slice(), tx.is_create(), tx.access_list());
    if intrinsic > tx.gas_limit() {
        return Err(TxError::IntrinsicGasTooLow {
            limit: tx.gas_limit(),
            intrinsic,
        });
    }

    let effective_gas_price = tx.effective_gas_price(block.base_fee);

    // Execution proper starts here; the per-transaction scoped state
    // (warm sets, original storage, touched accounts) opens now.
    cache.begin_transaction();

    let (message, created_address) = build_message(tx, sender, tx.gas_limit() - intrinsic);

    if fork.has_access_lists() {
        cache.prewarm_address(sender);
        cache.prewarm_address(message.recipient);
        for n in 1..=active_precompile_count(fork) {
            cache.prewarm_address(precompile_address(n));
        }
        for entry in tx.access_list() {
            cache.prewarm_address(entry.address);
            for key in &entry.storage_keys {
                cache.prewarm_slot(entry.address, *key);
            }
        }
    }

    cache.sub_balance(sender, effective_gas_price * U256::from(tx.gas_limit()))?;
    cache.increment_nonce(sender)?;

    let tx_env = TxEnv {
        origin: sender,
        gas_price: effective_gas_price,
    };
    let outcome = {
        let mut evm = Evm::new(cache, block, tx_env, fork, block_hashes);
        evm.execute(message)
    };

    // Infrastructure faults are not consensus outcomes.
    if let ob_03_evm::computation::OutcomeStatus::Failed(VmError::State(err)) = &outcome.status {
        return Err(err.clone().into());
    }

    let used_before_refund = tx.gas_limit() - outcome.gas_remaining;
    let refund_cap = used_before_refund / fork.max_refund_quotient();
    let refund = u64::try_from(outcome.refund.max(0)).unwrap_or(0).min(refund_cap);
    let gas_remaining = outcome.gas_remaining + refund;
    let gas_used = tx.gas_limit() - gas_remaining;

    cache.add_balance(sender, effective_gas_price * U256::from(gas_remaining))?;

    let coinbase_fee_per_gas = match block.base_fee {
        // The base-fee share is burned; the coinbase keeps the tip.
        Some(base_fee) => effective_gas_price - base_fee,
        None => effective_gas_price,
    };
    cache.add_balance(block.coinbase, coinbase_fee_per_gas * U256::from(gas_used))?;

    let success = outcome.status.is_success();
    let logs = outcome.logs;

    cache.finalize_transaction(fork)?;

    let receipt_outcome = if fork.has_status_receipts() {
        ReceiptOutcome::Status(success)
    } else {
        // Pre-Byzantium receipts commit the intermediate state root after
        // the transaction is fully applied, reaping included.
        ReceiptOutcome::StateRoot(cache.persist()?)
    };

    debug!(
        ?sender,
        gas_used,
        success,
        tx_type = ?tx.tx_type(),
        "transaction processed"
    );

    Ok(TransactionOutcome {
        receipt: Receipt::new(
            tx.tx_type().byte(),
            receipt_outcome,
            cumulative_gas_used + gas_used,
            logs,
        ),
        gas_used,
        success,
        contract_address: if success { created_address } else { None },
    })
}

fn validate_envelope(tx: &Transaction, fork: Fork, config: &ChainConfig) -> Result<(), TxError> {
    match tx.tx_type() {
        TxType::Legacy => {}
        TxType::AccessList => {
            if !fork.has_access_lists() {
                return Err(TxError::TypeNotSupported(TxType::AccessList));
            }
        }
        TxType::DynamicFee => {
            if !fork.has_base_fee() {
                return Err(TxError::TypeNotSupported(TxType::DynamicFee));
            }
        }
    }

    if let Some(chain_id) = tx.chain_id() {
        if tx.tx_type() == TxType::Legacy && !fork.has_replay_protection() {
            return Err(TxError::InvalidSignature);
        }
        if chain_id != config.chain_id {
            return Err(TxError::WrongChainId {
                expected: config.chain_id,
                actual: chain_id,
            });
        }
    }

    if fork.requires_low_s() && !tx.signature().has_low_s() {
        return Err(TxError::InvalidSignature);
    }
    Ok(())
}

fn build_message(tx: &Transaction, sender: Address, gas: u64) -> (Message, Option<Address>) {
    match tx.to() {
        Some(to) => (
            Message {
                kind: CallKind::Call,
                depth: 0,
                gas,
                sender,
                recipient: to,
                code_address: to,
                value: tx.value(),
                transfers_value: true,
                input: tx.data().clone(),
                is_static: false,
                created_address: None,
            },
            None,
        ),
        None => {
            let created = create_address(sender, tx.nonce());
            (
                Message {
                    kind: CallKind::Create,
                    depth: 0,
                    gas,
                    sender,
                    recipient: created,
                    code_address: created,
                    value: tx.value(),
                    transfers_value: true,
                    input: tx.data().clone(),
                    is_static: false,
                    created_address: Some(created),
                },
                Some(created),
            )
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
