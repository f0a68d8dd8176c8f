//! # RIPEMD-160 (0x03)
//!
//! Output is the 20-byte digest left-padded to a 32-byte word.

use super::{precompile_address, Precompile, PrecompileOutput};
use crate::errors::PrecompileError;
use ripemd::{Digest, Ripemd160};
use shared_types::{Address, Bytes};

const RIPEMD_BASE_GAS: u64 = 600;
const RIPEMD_WORD_GAS: u64 = 120;

/// The RIPEMD-160 precompile.
pub struct Ripemd160Hash;

impl Precompile for Ripemd160Hash {
    fn execute(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        let words = (input.len() as u64).div_ceil(32);
        let gas = RIPEMD_BASE_GAS.saturating_add(RIPEMD_WORD_GAS.saturating_mul(words));
        if gas > gas_limit {
            return Err(PrecompileError::OutOfGas);
        }

        let digest = Ripemd160::digest(input);
        let mut padded = vec![0u8; 32];
        padded[12..].copy_from_slice(&digest);
        Ok(PrecompileOutput {
            gas_used: gas,
            output: Bytes::from_vec(padded),
        })
    }

    fn address(&self) -> Address {
        precompile_address(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_padded() {
        let result = Ripemd160Hash.execute(&[], 1_000).unwrap();
        assert_eq!(result.gas_used, 600);
        assert_eq!(result.output.len(), 32);
        assert_eq!(&result.output.as_slice()[..12], &[0u8; 12]);
        assert_eq!(
            hex::encode(&result.output.as_slice()[12..]),
            "9c1185a5c5e9fc54612808977ee8f548b2258d31"
        );
    }
}
