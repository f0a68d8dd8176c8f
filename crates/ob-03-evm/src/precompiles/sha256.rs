//! # SHA-256 (0x02)

use super::{precompile_address, Precompile, PrecompileOutput};
use crate::errors::PrecompileError;
use sha2::{Digest, Sha256};
use shared_types::{Address, Bytes};

const SHA256_BASE_GAS: u64 = 60;
const SHA256_WORD_GAS: u64 = 12;

/// The SHA-256 precompile.
pub struct Sha256Hash;

impl Precompile for Sha256Hash {
    fn execute(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        let words = (input.len() as u64).div_ceil(32);
        let gas = SHA256_BASE_GAS.saturating_add(SHA256_WORD_GAS.saturating_mul(words));
        if gas > gas_limit {
            return Err(PrecompileError::OutOfGas);
        }

        let digest = Sha256::digest(input);
        Ok(PrecompileOutput {
            gas_used: gas,
            output: Bytes::from_slice(&digest),
        })
    }

    fn address(&self) -> Address {
        precompile_address(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let result = Sha256Hash.execute(&[], 100).unwrap();
        assert_eq!(result.gas_used, 60);
        assert_eq!(
            hex::encode(result.output.as_slice()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_word_pricing() {
        let result = Sha256Hash.execute(&[0u8; 33], 1_000).unwrap();
        assert_eq!(result.gas_used, 60 + 2 * 12);
    }
}
