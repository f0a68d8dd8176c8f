//! # Identity (0x04)
//!
//! Returns its input; the cheapest way to copy memory before MCOPY
//! existed.

use super::{precompile_address, Precompile, PrecompileOutput};
use crate::errors::PrecompileError;
use shared_types::{Address, Bytes};

const IDENTITY_BASE_GAS: u64 = 15;
const IDENTITY_WORD_GAS: u64 = 3;

/// The identity precompile.
pub struct Identity;

impl Precompile for Identity {
    fn execute(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        let words = (input.len() as u64).div_ceil(32);
        let gas = IDENTITY_BASE_GAS.saturating_add(IDENTITY_WORD_GAS.saturating_mul(words));
        if gas > gas_limit {
            return Err(PrecompileError::OutOfGas);
        }
        Ok(PrecompileOutput {
            gas_used: gas,
            output: Bytes::from_slice(input),
        })
    }

    fn address(&self) -> Address {
        precompile_address(4)
    }
}
