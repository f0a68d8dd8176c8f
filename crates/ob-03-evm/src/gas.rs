//! # Gas Schedule
//!
//! Per-fork gas pricing: the flat opcode table, the repriced state-access
//! ops across Tangerine/Istanbul/Berlin, the SSTORE families (legacy,
//! EIP-1283/2200 net metering, EIP-2929 cold surcharges, EIP-3529
//! refunds), memory expansion, and transaction intrinsic costs.
//!
//! Cost derivation widens through `u128` before narrowing; saturation to
//! `u64::MAX` guarantees an out-of-gas rather than a wrapped charge.

use crate::errors::VmError;
use crate::opcodes::Opcode;
use shared_types::{AccessListEntry, Fork, StorageValue, U256};

/// Per-fork gas cost table.
#[derive(Clone, Copy, Debug)]
pub struct GasSchedule {
    /// Fork this table prices.
    pub fork: Fork,

    // Flat tiers
    /// Cheap environment reads.
    pub base: u64,
    /// Arithmetic and stack shuffling.
    pub very_low: u64,
    /// Multiplication-class arithmetic.
    pub low: u64,
    /// Modular arithmetic and JUMP.
    pub mid: u64,
    /// JUMPI.
    pub high: u64,
    /// JUMPDEST marker.
    pub jumpdest: u64,

    // Repriced state access (zero under Berlin rules; the warm/cold
    // surcharges below price those ops instead)
    /// BALANCE.
    pub balance: u64,
    /// SLOAD.
    pub sload: u64,
    /// EXTCODESIZE / EXTCODECOPY base.
    pub extcode: u64,
    /// EXTCODEHASH.
    pub extcodehash: u64,
    /// CALL-family base.
    pub call: u64,
    /// SELFDESTRUCT base.
    pub selfdestruct: u64,
    /// SELFDESTRUCT to a dead account with a balance.
    pub selfdestruct_new_account: u64,

    // Cold/warm access (EIP-2929; zero before Berlin)
    /// First touch of an account.
    pub cold_account_access: u64,
    /// First touch of a storage slot.
    pub cold_sload: u64,
    /// Any subsequent touch.
    pub warm_access: u64,

    // Hashing, copying, logging
    /// EXP base.
    pub exp: u64,
    /// EXP per byte of exponent.
    pub exp_byte: u64,
    /// KECCAK256 base.
    pub keccak256: u64,
    /// KECCAK256 per word.
    pub keccak256_word: u64,
    /// Copy ops per word.
    pub copy_word: u64,
    /// BLOCKHASH.
    pub blockhash: u64,
    /// LOG base.
    pub log: u64,
    /// LOG per topic.
    pub log_topic: u64,
    /// LOG per data byte.
    pub log_data: u64,

    // Calls and creation
    /// Surcharge for a non-zero-value call.
    pub call_value: u64,
    /// Gas stipend handed to the callee of a value call.
    pub call_stipend: u64,
    /// Surcharge for calling a dead account with value.
    pub call_new_account: u64,
    /// CREATE / CREATE2 base.
    pub create: u64,
    /// Deposit cost per byte of returned contract code.
    pub code_deposit_byte: u64,

    // SSTORE family
    /// Zero to non-zero store.
    pub sstore_set: u64,
    /// Any other store (already reduced by the cold cost under Berlin).
    pub sstore_reset: u64,
    /// Refund for clearing a slot.
    pub sstore_clear_refund: u64,
    /// No-op store under net metering (the warm read cost).
    pub sstore_noop: u64,
    /// Minimum gas left to attempt an SSTORE (EIP-2200; zero before).
    pub sstore_sentry: u64,
    /// SELFDESTRUCT refund (zero from London).
    pub selfdestruct_refund: u64,

    // Transaction intrinsics
    /// Base cost of any transaction.
    pub tx_base: u64,
    /// Additional cost of a creation transaction.
    pub tx_create: u64,
    /// Per zero byte of calldata.
    pub tx_data_zero: u64,
    /// Per non-zero byte of calldata.
    pub tx_data_nonzero: u64,
    /// Per access-list address (EIP-2930).
    pub tx_access_list_address: u64,
    /// Per access-list storage key (EIP-2930).
    pub tx_access_list_slot: u64,
}

impl GasSchedule {
    /// The schedule for a fork.
    #[must_use]
    pub fn for_fork(fork: Fork) -> Self {
        let mut schedule = Self::frontier(fork);
        if fork >= Fork::Homestead {
            schedule.tx_create = 32_000;
        }
        if fork >= Fork::Tangerine {
            schedule.balance = 400;
            schedule.sload = 200;
            schedule.extcode = 700;
            schedule.call = 700;
            schedule.selfdestruct = 5_000;
            schedule.selfdestruct_new_account = 25_000;
        }
        if fork >= Fork::SpuriousDragon {
            schedule.exp_byte = 50;
        }
        if fork >= Fork::Constantinople {
            schedule.extcodehash = 400;
            schedule.sstore_noop = 200;
        }
        if fork >= Fork::Istanbul {
            schedule.balance = 700;
            schedule.sload = 800;
            schedule.extcodehash = 700;
            schedule.sstore_noop = 800;
            schedule.sstore_sentry = 2_300;
            schedule.tx_data_nonzero = 16;
        }
        if fork >= Fork::Berlin {
            // Warm/cold pricing replaces the flat costs entirely.
            schedule.balance = 0;
            schedule.sload = 0;
            schedule.extcode = 0;
            schedule.extcodehash = 0;
            schedule.call = 0;
            schedule.selfdestruct = 5_000;
            schedule.cold_account_access = 2_600;
            schedule.cold_sload = 2_100;
            schedule.warm_access = 100;
            schedule.sstore_noop = 100;
            schedule.sstore_reset = 5_000 - 2_100;
        }
        if fork >= Fork::London {
            schedule.sstore_clear_refund = 4_800;
            schedule.selfdestruct_refund = 0;
        }
        schedule
    }

    fn frontier(fork: Fork) -> Self {
        Self {
            fork,
            base: 2,
            very_low: 3,
            low: 5,
            mid: 8,
            high: 10,
            jumpdest: 1,
            balance: 20,
            sload: 50,
            extcode: 20,
            extcodehash: 400,
            call: 40,
            selfdestruct: 0,
            selfdestruct_new_account: 0,
            cold_account_access: 0,
            cold_sload: 0,
            warm_access: 0,
            exp: 10,
            exp_byte: 10,
            keccak256: 30,
            keccak256_word: 6,
            copy_word: 3,
            blockhash: 20,
            log: 375,
            log_topic: 375,
            log_data: 8,
            call_value: 9_000,
            call_stipend: 2_300,
            call_new_account: 25_000,
            create: 32_000,
            code_deposit_byte: 200,
            sstore_set: 20_000,
            sstore_reset: 5_000,
            sstore_clear_refund: 15_000,
            sstore_noop: 200,
            sstore_sentry: 0,
            selfdestruct_refund: 24_000,
            tx_base: 21_000,
            tx_create: 0,
            tx_data_zero: 4,
            tx_data_nonzero: 68,
            tx_access_list_address: 2_400,
            tx_access_list_slot: 1_900,
        }
    }

    /// Flat cost charged before an opcode's handler runs. Opcodes with
    /// dynamic pricing return zero here and charge inside their handler.
    #[must_use]
    pub fn flat_cost(&self, opcode: Opcode) -> u64 {
        use Opcode::*;
        match opcode {
            Stop | Return | Revert | Invalid => 0,

            Add | Sub | Not | Lt | Gt | SLt | SGt | Eq | IsZero | And | Or | Xor | Byte
            | Shl | Shr | Sar | CallDataLoad | MLoad | MStore | MStore8 => self.very_low,

            Mul | Div | SDiv | Mod | SMod | SignExtend | SelfBalance => self.low,

            AddMod | MulMod | Jump => self.mid,
            JumpI => self.high,
            JumpDest => self.jumpdest,

            Address | Origin | Caller | CallValue | CallDataSize | CodeSize | GasPrice
            | Coinbase | Timestamp | Number | Difficulty | GasLimit | ChainId | BaseFee
            | Pop | Pc | MSize | Gas | ReturnDataSize => self.base,

            BlockHash => self.blockhash,

            // Dynamic pricing lives in the handlers.
            Exp | Keccak256 | Balance | CallDataCopy | CodeCopy | ExtCodeSize | ExtCodeCopy
            | ReturnDataCopy | ExtCodeHash | SLoad | SStore | Log0 | Log1 | Log2 | Log3
            | Log4 | Create | Create2 | Call | CallCode | DelegateCall | StaticCall
            | SelfDestruct => 0,

            _ => {
                if opcode.push_size().is_some()
                    || opcode.dup_depth().is_some()
                    || opcode.swap_depth().is_some()
                {
                    self.very_low
                } else {
                    0
                }
            }
        }
    }

    /// EXP cost for a given exponent.
    #[must_use]
    pub fn exp_cost(&self, exponent: U256) -> u64 {
        if exponent.is_zero() {
            return self.exp;
        }
        let bytes = u64::from(256 - exponent.leading_zeros()).div_ceil(8);
        self.exp.saturating_add(self.exp_byte.saturating_mul(bytes))
    }

    /// KECCAK256 cost over `size` bytes, excluding memory expansion.
    #[must_use]
    pub fn keccak_cost(&self, size: u64) -> u64 {
        self.keccak256
            .saturating_add(self.keccak256_word.saturating_mul(size.div_ceil(32)))
    }

    /// Per-word copy cost for the *COPY family, excluding base and
    /// memory expansion.
    #[must_use]
    pub fn copy_cost(&self, size: u64) -> u64 {
        self.copy_word.saturating_mul(size.div_ceil(32))
    }

    /// LOG cost, excluding memory expansion.
    #[must_use]
    pub fn log_cost(&self, topics: usize, size: u64) -> u64 {
        self.log
            .saturating_add(self.log_topic.saturating_mul(topics as u64))
            .saturating_add(self.log_data.saturating_mul(size))
    }

    /// SSTORE cost and refund delta for a transition, given the slot's
    /// original (transaction-start) and current values.
    ///
    /// # Errors
    ///
    /// Returns `OutOfGas` when gas left is at or below the EIP-2200
    /// sentry.
    pub fn sstore_cost(
        &self,
        original: StorageValue,
        current: StorageValue,
        new: StorageValue,
        is_cold: bool,
        gas_left: u64,
    ) -> Result<(u64, i64), VmError> {
        if self.sstore_sentry > 0 && gas_left <= self.sstore_sentry {
            return Err(VmError::OutOfGas);
        }

        if !self.fork.uses_net_gas_metering() {
            // Legacy rule: priced on current/new only.
            let cost = if current.is_zero() && !new.is_zero() {
                self.sstore_set
            } else {
                self.sstore_reset
            };
            let refund = if !current.is_zero() && new.is_zero() {
                self.sstore_clear_refund as i64
            } else {
                0
            };
            return Ok((cost, refund));
        }

        let mut cost = 0u64;
        if self.fork.charges_cold_access() && is_cold {
            cost += self.cold_sload;
        }

        if current == new {
            return Ok((cost + self.sstore_noop, 0));
        }

        let mut refund = 0i64;
        if original == current {
            if original.is_zero() {
                cost += self.sstore_set;
            } else {
                cost += self.sstore_reset;
                if new.is_zero() {
                    refund += self.sstore_clear_refund as i64;
                }
            }
        } else {
            cost += self.sstore_noop;
            if !original.is_zero() {
                if current.is_zero() {
                    refund -= self.sstore_clear_refund as i64;
                }
                if new.is_zero() {
                    refund += self.sstore_clear_refund as i64;
                }
            }
            if original == new {
                if original.is_zero() {
                    refund += (self.sstore_set - self.sstore_noop) as i64;
                } else {
                    refund += (self.sstore_reset - self.sstore_noop) as i64;
                }
            }
        }
        Ok((cost, refund))
    }

    /// Intrinsic cost of a transaction before any opcode runs.
    #[must_use]
    pub fn intrinsic_gas(
        &self,
        data: &[u8],
        is_create: bool,
        access_list: &[AccessListEntry],
    ) -> u64 {
        let zero_bytes = data.iter().filter(|&&b| b == 0).count() as u128;
        let nonzero_bytes = data.len() as u128 - zero_bytes;

        let mut total = u128::from(self.tx_base);
        if is_create {
            total += u128::from(self.tx_create);
        }
        total += zero_bytes * u128::from(self.tx_data_zero);
        total += nonzero_bytes * u128::from(self.tx_data_nonzero);
        for entry in access_list {
            total += u128::from(self.tx_access_list_address);
            total += entry.storage_keys.len() as u128 * u128::from(self.tx_access_list_slot);
        }
        u64::try_from(total).unwrap_or(u64::MAX)
    }
}

// =============================================================================
// MEMORY EXPANSION
// =============================================================================

/// Total memory cost for `words` words: `3·w + w²/512`.
#[must_use]
pub fn memory_cost(words: u64) -> u64 {
    let words = u128::from(words);
    let cost = 3 * words + words * words / 512;
    u64::try_from(cost).unwrap_or(u64::MAX)
}

/// Incremental cost of growing memory from `current_words` to cover
/// `new_size` bytes.
#[must_use]
pub fn memory_expansion_cost(current_words: u64, new_size: u64) -> u64 {
    let new_words = new_size.div_ceil(32);
    if new_words <= current_words {
        return 0;
    }
    memory_cost(new_words).saturating_sub(memory_cost(current_words))
}

/// Gas forwarded to a child call under EIP-150: all but one 64th.
#[must_use]
pub fn all_but_one_64th(gas: u64) -> u64 {
    gas - gas / 64
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn value(word: u64) -> StorageValue {
        StorageValue::from_word(U256::from(word))
    }

    #[test]
    fn test_fork_repricings() {
        assert_eq!(GasSchedule::for_fork(Fork::Frontier).call, 40);
        assert_eq!(GasSchedule::for_fork(Fork::Tangerine).call, 700);
        assert_eq!(GasSchedule::for_fork(Fork::Frontier).sload, 50);
        assert_eq!(GasSchedule::for_fork(Fork::Istanbul).sload, 800);
        assert_eq!(GasSchedule::for_fork(Fork::Berlin).sload, 0);
        assert_eq!(GasSchedule::for_fork(Fork::Berlin).cold_sload, 2_100);
        assert_eq!(GasSchedule::for_fork(Fork::Homestead).exp_byte, 10);
        assert_eq!(GasSchedule::for_fork(Fork::SpuriousDragon).exp_byte, 50);
        assert_eq!(GasSchedule::for_fork(Fork::Istanbul).tx_data_nonzero, 16);
        assert_eq!(GasSchedule::for_fork(Fork::Berlin).sstore_clear_refund, 15_000);
        assert_eq!(GasSchedule::for_fork(Fork::London).sstore_clear_refund, 4_800);
        assert_eq!(GasSchedule::for_fork(Fork::London).selfdestruct_refund, 0);
    }

    #[test]
    fn test_frontier_creation_tx_has_no_surcharge() {
        let frontier = GasSchedule::for_fork(Fork::Frontier);
        assert_eq!(frontier.intrinsic_gas(&[], true, &[]), 21_000);
        let homestead = GasSchedule::for_fork(Fork::Homestead);
        assert_eq!(homestead.intrinsic_gas(&[], true, &[]), 53_000);
    }

    #[test]
    fn test_intrinsic_gas_data_and_access_list() {
        let schedule = GasSchedule::for_fork(Fork::Berlin);
        // Two non-zero bytes and one zero byte at 16/4 wei per byte
        assert_eq!(
            schedule.intrinsic_gas(&[0x60, 0x00, 0x01], false, &[]),
            21_000 + 16 + 4 + 16
        );

        let entries = vec![AccessListEntry {
            address: shared_types::Address::ZERO,
            storage_keys: vec![shared_types::StorageKey::ZERO; 2],
        }];
        assert_eq!(
            schedule.intrinsic_gas(&[], false, &entries),
            21_000 + 2_400 + 2 * 1_900
        );
    }

    #[test]
    fn test_exp_cost_by_byte_width() {
        let schedule = GasSchedule::for_fork(Fork::SpuriousDragon);
        assert_eq!(schedule.exp_cost(U256::zero()), 10);
        assert_eq!(schedule.exp_cost(U256::from(255u64)), 10 + 50);
        assert_eq!(schedule.exp_cost(U256::from(256u64)), 10 + 100);
    }

    #[test]
    fn test_memory_cost_quadratic() {
        assert_eq!(memory_cost(0), 0);
        assert_eq!(memory_cost(1), 3);
        assert_eq!(memory_cost(32), 98);
        assert_eq!(memory_expansion_cost(0, 32), 3);
        assert_eq!(memory_expansion_cost(1, 32), 0);
        assert_eq!(memory_expansion_cost(1, 64), 3);
        // Enormous requests saturate instead of wrapping
        assert_eq!(memory_expansion_cost(0, u64::MAX), u64::MAX);
    }

    #[test]
    fn test_all_but_one_64th() {
        assert_eq!(all_but_one_64th(6_400), 6_300);
        assert_eq!(all_but_one_64th(63), 63);
    }

    #[test]
    fn test_sstore_legacy_rules() {
        let schedule = GasSchedule::for_fork(Fork::Byzantium);
        let (cost, refund) = schedule
            .sstore_cost(value(0), value(0), value(1), false, 100_000)
            .unwrap();
        assert_eq!((cost, refund), (20_000, 0));

        let (cost, refund) = schedule
            .sstore_cost(value(1), value(1), value(0), false, 100_000)
            .unwrap();
        assert_eq!((cost, refund), (5_000, 15_000));

        let (cost, refund) = schedule
            .sstore_cost(value(1), value(1), value(2), false, 100_000)
            .unwrap();
        assert_eq!((cost, refund), (5_000, 0));
    }

    #[test]
    fn test_sstore_berlin_cold_set() {
        // Worked example: cold zero-to-nonzero under Berlin is 22100.
        let schedule = GasSchedule::for_fork(Fork::Berlin);
        let (cost, refund) = schedule
            .sstore_cost(value(0), value(0), value(1), true, 100_000)
            .unwrap();
        assert_eq!((cost, refund), (22_100, 0));
    }

    #[test]
    fn test_sstore_berlin_same_tx_reversal() {
        // Second write in the same transaction undoing the first refunds
        // set-cost minus the warm read.
        let schedule = GasSchedule::for_fork(Fork::Berlin);
        let (cost, refund) = schedule
            .sstore_cost(value(0), value(1), value(0), false, 100_000)
            .unwrap();
        assert_eq!(cost, 100);
        assert_eq!(refund, 19_900);
    }

    #[test]
    fn test_sstore_london_clear_refund() {
        let schedule = GasSchedule::for_fork(Fork::London);
        let (cost, refund) = schedule
            .sstore_cost(value(1), value(1), value(0), false, 100_000)
            .unwrap();
        assert_eq!(cost, 2_900);
        assert_eq!(refund, 4_800);
    }

    #[test]
    fn test_sstore_sentry() {
        let schedule = GasSchedule::for_fork(Fork::Istanbul);
        assert_eq!(
            schedule.sstore_cost(value(0), value(0), value(1), false, 2_300),
            Err(VmError::OutOfGas)
        );
        // Pre-Istanbul has no sentry
        let schedule = GasSchedule::for_fork(Fork::Constantinople);
        assert!(schedule
            .sstore_cost(value(0), value(0), value(1), false, 2_300)
            .is_ok());
    }
}
