//! # ecrecover (0x01)
//!
//! Recovers the signer address from a 32-byte digest and an (v, r, s)
//! signature. Unrecoverable inputs return empty output, not an error.

use super::{precompile_address, Precompile, PrecompileOutput};
use crate::errors::PrecompileError;
use shared_crypto::{recover_address, RecoverableSignature};
use shared_types::{Address, Bytes};

const ECRECOVER_GAS: u64 = 3_000;

/// The ecrecover precompile.
pub struct EcRecover;

impl Precompile for EcRecover {
    fn execute(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        if ECRECOVER_GAS > gas_limit {
            return Err(PrecompileError::OutOfGas);
        }

        let mut padded = [0u8; 128];
        let len = input.len().min(128);
        padded[..len].copy_from_slice(&input[..len]);

        let output = recover(&padded).unwrap_or_default();
        Ok(PrecompileOutput {
            gas_used: ECRECOVER_GAS,
            output,
        })
    }

    fn address(&self) -> Address {
        precompile_address(1)
    }
}

fn recover(padded: &[u8; 128]) -> Option<Bytes> {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&padded[..32]);

    // v is a 32-byte big-endian word that must be 27 or 28.
    if padded[32..63] != [0u8; 31] {
        return None;
    }
    let v = padded[63];
    if v != 27 && v != 28 {
        return None;
    }

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&padded[64..96]);
    s.copy_from_slice(&padded[96..128]);

    let signature = RecoverableSignature::new(r, s, v - 27);
    let address = recover_address(&digest, &signature).ok()?;

    let mut word = vec![0u8; 32];
    word[12..].copy_from_slice(&address);
    Some(Bytes::from_vec(word))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::{keccak256, sign_digest};

    #[test]
    fn test_recover_known_signer() {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let digest = keccak256(b"ecrecover input");
        let sig = sign_digest(&digest, &secret).unwrap();

        let mut input = vec![0u8; 128];
        input[..32].copy_from_slice(&digest);
        input[63] = 27 + sig.v;
        input[64..96].copy_from_slice(&sig.r);
        input[96..128].copy_from_slice(&sig.s);

        let result = EcRecover.execute(&input, 10_000).unwrap();
        assert_eq!(result.gas_used, 3_000);
        assert_eq!(
            hex::encode(&result.output.as_slice()[12..]),
            "7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_bad_v_returns_empty() {
        let mut input = vec![0u8; 128];
        input[63] = 29;
        let result = EcRecover.execute(&input, 10_000).unwrap();
        assert!(result.output.is_empty());
    }

    #[test]
    fn test_out_of_gas() {
        assert!(matches!(
            EcRecover.execute(&[], 2_999),
            Err(PrecompileError::OutOfGas)
        ));
    }
}
