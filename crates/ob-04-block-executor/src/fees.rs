//! # Gas Limit and Base Fee
//!
//! Parent/child gas-limit bounds and EIP-1559 base-fee derivation.

use crate::errors::BlockError;
use shared_types::{BlockHeader, ChainConfig, U256};

/// Minimum block gas limit.
pub const MIN_GAS_LIMIT: u64 = 5_000;

/// Divisor bounding per-block gas limit movement.
pub const GAS_LIMIT_BOUND_DIVISOR: u64 = 1_024;

/// EIP-1559 elasticity: the London transition doubles the limit.
pub const ELASTICITY_MULTIPLIER: u64 = 2;

/// Divisor of the per-block base fee delta.
pub const BASE_FEE_CHANGE_DENOMINATOR: u64 = 8;

/// The parent gas limit a child is validated against; doubled across the
/// London transition block (EIP-1559 elasticity).
#[must_use]
pub fn effective_parent_gas_limit(config: &ChainConfig, parent: &BlockHeader, number: u64) -> u64 {
    let parent_fork = config.fork_at(parent.number);
    let fork = config.fork_at(number);
    if fork.has_base_fee() && !parent_fork.has_base_fee() {
        parent.gas_limit * ELASTICITY_MULTIPLIER
    } else {
        parent.gas_limit
    }
}

/// Validate a header's gas limit against the (adjusted) parent limit:
/// the move must stay under parent/1024 and the limit at or above 5000.
///
/// # Errors
///
/// Returns `BadGasLimit` when either bound is violated.
pub fn validate_gas_limit(header: &BlockHeader, parent_limit: u64) -> Result<(), BlockError> {
    let delta = header.gas_limit.abs_diff(parent_limit);
    if delta >= parent_limit / GAS_LIMIT_BOUND_DIVISOR || header.gas_limit < MIN_GAS_LIMIT {
        return Err(BlockError::BadGasLimit {
            limit: header.gas_limit,
            parent_limit,
        });
    }
    Ok(())
}

/// The base fee a block at `number` must commit, derived from its parent;
/// `None` before London.
#[must_use]
pub fn expected_base_fee(config: &ChainConfig, parent: &BlockHeader, number: u64) -> Option<U256> {
    let fork = config.fork_at(number);
    if !fork.has_base_fee() {
        return None;
    }
    if !config.fork_at(parent.number).has_base_fee() {
        return Some(config.initial_base_fee);
    }

    let parent_base = parent.base_fee.unwrap_or(config.initial_base_fee);
    let target = parent.gas_limit / ELASTICITY_MULTIPLIER;
    if target == 0 {
        return Some(parent_base);
    }

    Some(match parent.gas_used.cmp(&target) {
        std::cmp::Ordering::Equal => parent_base,
        std::cmp::Ordering::Greater => {
            let delta_used = U256::from(parent.gas_used - target);
            let delta = parent_base * delta_used
                / U256::from(target)
                / U256::from(BASE_FEE_CHANGE_DENOMINATOR);
            parent_base + delta.max(U256::one())
        }
        std::cmp::Ordering::Less => {
            let delta_used = U256::from(target - parent.gas_used);
            let delta = parent_base * delta_used
                / U256::from(target)
                / U256::from(BASE_FEE_CHANGE_DENOMINATOR);
            parent_base.saturating_sub(delta)
        }
    })
}

/// Validate a header's base-fee commitment.
///
/// # Errors
///
/// Returns `BadBaseFee` when the committed value differs from the derived
/// one (including presence before London).
pub fn validate_base_fee(
    config: &ChainConfig,
    parent: &BlockHeader,
    header: &BlockHeader,
) -> Result<(), BlockError> {
    let expected = expected_base_fee(config, parent, header.number);
    if header.base_fee != expected {
        return Err(BlockError::BadBaseFee {
            header: header.base_fee,
            expected,
        });
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Bloom, Bytes, Fork, ForkSchedule, Hash};

    fn header(number: u64, gas_limit: u64, gas_used: u64, base_fee: Option<U256>) -> BlockHeader {
        BlockHeader {
            parent_hash: Hash::ZERO,
            ommers_hash: Hash::ZERO,
            coinbase: shared_types::Address::ZERO,
            state_root: Hash::EMPTY_TRIE,
            transactions_root: Hash::EMPTY_TRIE,
            receipts_root: Hash::EMPTY_TRIE,
            logs_bloom: Bloom::new(),
            difficulty: U256::one(),
            number,
            gas_limit,
            gas_used,
            timestamp: 0,
            extra_data: Bytes::new(),
            mix_hash: Hash::ZERO,
            nonce: [0u8; 8],
            base_fee,
        }
    }

    fn london_config() -> ChainConfig {
        ChainConfig::with_fork(Fork::London)
    }

    /// London activates at block 10.
    fn transition_config() -> ChainConfig {
        let mut config = ChainConfig::with_fork(Fork::Berlin);
        config.schedule = ForkSchedule::new(vec![(0, Fork::Berlin), (10, Fork::London)]);
        config
    }

    #[test]
    fn test_gas_limit_bounds() {
        let parent_limit = 10_240_000;
        // Delta strictly below parent/1024 = 10000
        assert!(validate_gas_limit(&header(1, 10_249_999, 0, None), parent_limit).is_ok());
        assert!(validate_gas_limit(&header(1, 10_250_000, 0, None), parent_limit).is_err());
        assert!(validate_gas_limit(&header(1, 10_230_001, 0, None), parent_limit).is_ok());
        assert!(validate_gas_limit(&header(1, 10_230_000, 0, None), parent_limit).is_err());
        assert!(validate_gas_limit(&header(1, 4_999, 0, None), 5_000).is_err());
    }

    #[test]
    fn test_first_london_block_uses_initial_base_fee() {
        let config = transition_config();
        let parent = header(9, 15_000_000, 10_000_000, None);
        assert_eq!(
            expected_base_fee(&config, &parent, 10),
            Some(U256::from(1_000_000_000u64))
        );
        // Pre-London blocks carry none
        assert_eq!(expected_base_fee(&config, &parent, 9), None);
    }

    #[test]
    fn test_elasticity_doubles_parent_limit_at_transition() {
        let config = transition_config();
        let parent = header(9, 15_000_000, 0, None);
        assert_eq!(effective_parent_gas_limit(&config, &parent, 10), 30_000_000);
        assert_eq!(effective_parent_gas_limit(&config, &parent, 9), 15_000_000);
    }

    #[test]
    fn test_base_fee_unchanged_at_target() {
        let config = london_config();
        let base = U256::from(1_000_000_000u64);
        let parent = header(5, 30_000_000, 15_000_000, Some(base));
        assert_eq!(expected_base_fee(&config, &parent, 6), Some(base));
    }

    #[test]
    fn test_base_fee_increases_when_above_target() {
        let config = london_config();
        let base = U256::from(1_000_000_000u64);
        // Full blocks raise the base fee by 1/8
        let parent = header(5, 30_000_000, 30_000_000, Some(base));
        assert_eq!(
            expected_base_fee(&config, &parent, 6),
            Some(U256::from(1_125_000_000u64))
        );
    }

    #[test]
    fn test_base_fee_decreases_when_below_target() {
        let config = london_config();
        let base = U256::from(1_000_000_000u64);
        // Empty blocks cut it by 1/8
        let parent = header(5, 30_000_000, 0, Some(base));
        assert_eq!(
            expected_base_fee(&config, &parent, 6),
            Some(U256::from(875_000_000u64))
        );
    }

    #[test]
    fn test_base_fee_increase_has_unit_floor() {
        let config = london_config();
        // Tiny base fee: the computed delta rounds to zero but one wei
        // still applies.
        let parent = header(5, 30_000_000, 15_000_001, Some(U256::from(7u64)));
        assert_eq!(expected_base_fee(&config, &parent, 6), Some(U256::from(8u64)));
    }

    #[test]
    fn test_validate_base_fee_presence() {
        let config = london_config();
        let base = U256::from(1_000_000_000u64);
        let parent = header(5, 30_000_000, 15_000_000, Some(base));
        let good = header(6, 30_000_000, 0, Some(base));
        assert!(validate_base_fee(&config, &parent, &good).is_ok());

        let missing = header(6, 30_000_000, 0, None);
        assert!(validate_base_fee(&config, &parent, &missing).is_err());
    }
}
