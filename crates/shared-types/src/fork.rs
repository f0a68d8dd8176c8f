//! # Fork Schedule
//!
//! Named consensus rule sets and their activation heights. The schedule
//! maps a block number to the greatest activated fork; the fork selects the
//! gas table, opcode availability, and feature flags throughout the core.

use crate::value_objects::U256;
use serde::{Deserialize, Serialize};

/// Wei per whole ether; used to spell rewards.
const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;

/// A named set of consensus rules, in activation order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Fork {
    /// Launch rules.
    Frontier,
    /// EIP-2/7: DELEGATECALL, low-S signatures, create-failure semantics.
    Homestead,
    /// Irregular state change; no rule differences in the core.
    Dao,
    /// EIP-150: IO-heavy repricing, the 63/64 call gas rule.
    Tangerine,
    /// EIP-155/160/161/170: replay protection, empty-account reaping,
    /// code-size limit.
    SpuriousDragon,
    /// EIP-140/211/214/658: REVERT, RETURNDATA, STATICCALL, status receipts.
    Byzantium,
    /// EIP-145/1014/1052/1283: shifts, CREATE2, EXTCODEHASH, net metering.
    Constantinople,
    /// Constantinople with EIP-1283 retracted.
    Petersburg,
    /// EIP-152/1344/1884/2028/2200: blake2f, CHAINID, repricing, net
    /// metering reinstated.
    Istanbul,
    /// Difficulty bomb delay only.
    MuirGlacier,
    /// EIP-2565/2929/2930: modexp repricing, cold/warm access, typed
    /// access-list transactions.
    Berlin,
    /// EIP-1559/3198/3529/3541: base fee, BASEFEE opcode, refund cuts,
    /// 0xEF code rejection.
    London,
    /// Difficulty bomb delay only.
    ArrowGlacier,
    /// Difficulty bomb delay only.
    GrayGlacier,
    /// The Merge: block rewards end. Forward-compatibility hook.
    Paris,
    /// Withdrawals era. Forward-compatibility hook.
    Shanghai,
}

impl Fork {
    /// Base fee is committed in headers from London.
    #[must_use]
    pub fn has_base_fee(self) -> bool {
        self >= Fork::London
    }

    /// Empty touched accounts are deleted at transaction end (EIP-161).
    #[must_use]
    pub fn reaps_empty_accounts(self) -> bool {
        self >= Fork::SpuriousDragon
    }

    /// Typed access-list transactions and warm/cold pricing (EIP-2929/2930).
    #[must_use]
    pub fn has_access_lists(self) -> bool {
        self >= Fork::Berlin
    }

    /// Cold-access surcharges apply (EIP-2929).
    #[must_use]
    pub fn charges_cold_access(self) -> bool {
        self >= Fork::Berlin
    }

    /// REVERT and the return-data buffer exist (EIP-140/211).
    #[must_use]
    pub fn has_revert(self) -> bool {
        self >= Fork::Byzantium
    }

    /// STATICCALL exists (EIP-214).
    #[must_use]
    pub fn has_static_call(self) -> bool {
        self >= Fork::Byzantium
    }

    /// DELEGATECALL exists (Homestead).
    #[must_use]
    pub fn has_delegate_call(self) -> bool {
        self >= Fork::Homestead
    }

    /// Receipts carry a status bit instead of an intermediate state root.
    #[must_use]
    pub fn has_status_receipts(self) -> bool {
        self >= Fork::Byzantium
    }

    /// CREATE2, SHL/SHR/SAR, EXTCODEHASH (Constantinople).
    #[must_use]
    pub fn has_create2(self) -> bool {
        self >= Fork::Constantinople
    }

    /// CHAINID and SELFBALANCE (Istanbul).
    #[must_use]
    pub fn has_chain_id_opcode(self) -> bool {
        self >= Fork::Istanbul
    }

    /// The 63/64 call gas reservation (EIP-150).
    #[must_use]
    pub fn caps_call_gas(self) -> bool {
        self >= Fork::Tangerine
    }

    /// Replay-protected signing digests (EIP-155).
    #[must_use]
    pub fn has_replay_protection(self) -> bool {
        self >= Fork::SpuriousDragon
    }

    /// Deployed code limited to 24576 bytes (EIP-170).
    #[must_use]
    pub fn limits_code_size(self) -> bool {
        self >= Fork::SpuriousDragon
    }

    /// Deployed code may not begin with 0xEF (EIP-3541).
    #[must_use]
    pub fn rejects_ef_code(self) -> bool {
        self >= Fork::London
    }

    /// High-S signatures are invalid (EIP-2).
    #[must_use]
    pub fn requires_low_s(self) -> bool {
        self >= Fork::Homestead
    }

    /// SSTORE uses original/current/new net metering (EIP-1283, retracted
    /// in Petersburg, reinstated by EIP-2200).
    #[must_use]
    pub fn uses_net_gas_metering(self) -> bool {
        self == Fork::Constantinople || self >= Fork::Istanbul
    }

    /// Divisor of the refund cap: gas_used / 2 before London, / 5 after
    /// (EIP-3529).
    #[must_use]
    pub fn max_refund_quotient(self) -> u64 {
        if self >= Fork::London {
            5
        } else {
            2
        }
    }

    /// SELFDESTRUCT refunds 24000 before London; nothing after (EIP-3529).
    #[must_use]
    pub fn refunds_selfdestruct(self) -> bool {
        self < Fork::London
    }

    /// Static mining reward for a block at this fork, in wei.
    #[must_use]
    pub fn block_reward(self) -> U256 {
        let ether = U256::from(WEI_PER_ETHER);
        if self >= Fork::Paris {
            U256::zero()
        } else if self >= Fork::Constantinople {
            ether * 2
        } else if self >= Fork::Byzantium {
            ether * 3
        } else {
            ether * 5
        }
    }
}

/// Ordered fork activation list. Later entries shadow earlier ones at the
/// same height, matching how a Petersburg fix-up replaces Constantinople.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkSchedule {
    transitions: Vec<(u64, Fork)>,
}

impl ForkSchedule {
    /// Build a schedule from `(activation_block, fork)` pairs. Pairs are
    /// sorted by activation height, preserving insertion order for ties.
    #[must_use]
    pub fn new(mut transitions: Vec<(u64, Fork)>) -> Self {
        transitions.sort_by_key(|(block, _)| *block);
        Self { transitions }
    }

    /// A schedule with a single fork active from genesis; test and
    /// private-network convenience.
    #[must_use]
    pub fn single(fork: Fork) -> Self {
        Self {
            transitions: vec![(0, fork)],
        }
    }

    /// The mainnet activation history.
    #[must_use]
    pub fn mainnet() -> Self {
        Self::new(vec![
            (0, Fork::Frontier),
            (1_150_000, Fork::Homestead),
            (1_920_000, Fork::Dao),
            (2_463_000, Fork::Tangerine),
            (2_675_000, Fork::SpuriousDragon),
            (4_370_000, Fork::Byzantium),
            (7_280_000, Fork::Constantinople),
            (7_280_000, Fork::Petersburg),
            (9_069_000, Fork::Istanbul),
            (9_200_000, Fork::MuirGlacier),
            (12_244_000, Fork::Berlin),
            (12_965_000, Fork::London),
            (13_773_000, Fork::ArrowGlacier),
            (15_050_000, Fork::GrayGlacier),
        ])
    }

    /// The greatest fork with activation height at or below `block_number`.
    /// Blocks below the first activation run Frontier rules.
    #[must_use]
    pub fn fork_at(&self, block_number: u64) -> Fork {
        let mut active = Fork::Frontier;
        for &(activation, fork) in &self.transitions {
            if activation > block_number {
                break;
            }
            active = fork;
        }
        active
    }

    /// Activation height of a fork, if scheduled.
    #[must_use]
    pub fn activation_of(&self, fork: Fork) -> Option<u64> {
        self.transitions
            .iter()
            .find(|(_, f)| *f == fork)
            .map(|(block, _)| *block)
    }
}

/// Chain-level configuration handed to the executor by the surrounding
/// chain database.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// EIP-155 chain id bound into signing digests.
    pub chain_id: u64,
    /// devp2p network id; carried for the surrounding subsystems.
    pub network_id: u64,
    /// Fork activation schedule.
    pub schedule: ForkSchedule,
    /// Base fee of the first block with EIP-1559 active, in wei.
    pub initial_base_fee: U256,
}

impl ChainConfig {
    /// Mainnet configuration.
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            chain_id: 1,
            network_id: 1,
            schedule: ForkSchedule::mainnet(),
            initial_base_fee: U256::from(1_000_000_000u64),
        }
    }

    /// A single-fork configuration for tests and private networks.
    #[must_use]
    pub fn with_fork(fork: Fork) -> Self {
        Self {
            chain_id: 1,
            network_id: 1,
            schedule: ForkSchedule::single(fork),
            initial_base_fee: U256::from(1_000_000_000u64),
        }
    }

    /// The fork active at `block_number`.
    #[must_use]
    pub fn fork_at(&self, block_number: u64) -> Fork {
        self.schedule.fork_at(block_number)
    }
}

// =============================================================================
// TESTS
// =============================================================================
