//! # Block Rewards
//!
//! Static mining rewards per era, plus ommer inclusion and authorship
//! rewards. Everything here is a no-op once the merge zeroes the reward.

use ob_02_state_trie::{AccountsCache, StateError};
use shared_types::{BlockHeader, Fork, U256};
use tracing::debug;

/// Ommers deeper than this earn nothing.
const MAX_OMMER_DEPTH: u64 = 8;

/// Credit the block author and every ommer author.
///
/// The miner earns the era's base reward plus 1/32 of it per included
/// ommer; each ommer author earns `base · (8 − depth) / 8` for an ommer
/// `depth` blocks behind the including header.
///
/// # Errors
///
/// Propagates state failures.
pub fn apply_rewards(
    cache: &mut AccountsCache<'_>,
    fork: Fork,
    header: &BlockHeader,
    ommers: &[BlockHeader],
) -> Result<(), StateError> {
    let base = fork.block_reward();
    if base.is_zero() {
        return Ok(());
    }

    let mut miner_reward = base;
    for ommer in ommers {
        miner_reward += base / 32;

        let depth = header.number.saturating_sub(ommer.number);
        if depth == 0 || depth >= MAX_OMMER_DEPTH {
            continue;
        }
        let ommer_reward = base * U256::from(MAX_OMMER_DEPTH - depth) / U256::from(MAX_OMMER_DEPTH);
        cache.add_balance(ommer.coinbase, ommer_reward)?;
    }

    debug!(
        number = header.number,
        ommers = ommers.len(),
        "applying block rewards"
    );
    cache.add_balance(header.coinbase, miner_reward)
}

// =============================================================================
// TESTS
// =============================================================================
