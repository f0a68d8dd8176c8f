//! # ECDSA Recovery (secp256k1)
//!
//! Public-key recovery from `(v, r, s)` signatures over a 32-byte prehash.
//! This is the primitive behind transaction sender extraction and the
//! `ecrecover` precompile.
//!
//! ## Security Properties
//!
//! - Low-S detection for EIP-2 enforcement (the caller decides whether a
//!   high-S signature is acceptable for its fork)
//! - RFC 6979 deterministic nonces when signing (no RNG dependency)

use crate::errors::CryptoError;
use crate::hashing::keccak256;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

/// Upper half of the secp256k1 group order; an S above this is "high".
const SECP256K1_N_HALF: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b,
    0x20, 0xa0,
];

/// A recoverable ECDSA signature in Ethereum's `(r, s, v)` form.
///
/// `v` is the normalized recovery id (0 or 1); chain-id folding for legacy
/// transactions is the caller's concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// r component (32 bytes, big-endian).
    pub r: [u8; 32],
    /// s component (32 bytes, big-endian).
    pub s: [u8; 32],
    /// Recovery id (0 or 1).
    pub v: u8,
}

impl RecoverableSignature {
    /// Create a signature from raw components.
    #[must_use]
    pub const fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    /// Returns true if the S component is in the lower half of the curve
    /// order (required by EIP-2 from Homestead onward).
    #[must_use]
    pub fn has_low_s(&self) -> bool {
        self.s <= SECP256K1_N_HALF
    }
}

/// Recover the 20-byte address that signed `digest`.
///
/// The address is the low 160 bits of the Keccak-256 of the uncompressed
/// public key.
///
/// # Errors
///
/// Returns `CryptoError` when the recovery id is out of range, the
/// signature components are malformed, or no point can be recovered.
pub fn recover_address(
    digest: &[u8; 32],
    signature: &RecoverableSignature,
) -> Result<[u8; 20], CryptoError> {
    if signature.v > 1 {
        return Err(CryptoError::InvalidRecoveryId(signature.v));
    }

    let mut raw = [0u8; 64];
    raw[..32].copy_from_slice(&signature.r);
    raw[32..].copy_from_slice(&signature.s);
    let mut sig = Signature::from_slice(&raw).map_err(|_| CryptoError::InvalidSignature)?;
    let mut recovery_bit = signature.v;

    // k256 refuses high-S signatures during recovery; normalizing flips the
    // recovery bit.
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_bit ^= 1;
    }

    let recovery_id =
        RecoveryId::from_byte(recovery_bit).ok_or(CryptoError::InvalidRecoveryId(recovery_bit))?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_of_key(&key))
}

/// Sign a 32-byte digest, producing a recoverable signature.
///
/// # Errors
///
/// Returns `CryptoError::InvalidPrivateKey` if the secret is out of range.
pub fn sign_digest(
    digest: &[u8; 32],
    secret: &[u8; 32],
) -> Result<RecoverableSignature, CryptoError> {
    let key =
        SigningKey::from_bytes(secret.into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(digest)
        .map_err(|_| CryptoError::InvalidPrivateKey)?;

    let bytes = sig.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    Ok(RecoverableSignature::new(r, s, recovery_id.to_byte()))
}

/// Address of the signer behind a verifying key.
fn address_of_key(key: &VerifyingKey) -> [u8; 20] {
    let point = key.to_encoded_point(false);
    // Uncompressed SEC1 is 0x04 || x || y; the address hashes only x || y.
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    address
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret() -> [u8; 32] {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        secret
    }

    #[test]
    fn test_sign_and_recover_roundtrip() {
        let secret = test_secret();
        let digest = keccak256(b"obsidian");

        let sig = sign_digest(&digest, &secret).unwrap();
        let recovered = recover_address(&digest, &sig).unwrap();

        // Address of secret key 0x...01 is well-known.
        assert_eq!(
            hex::encode(recovered),
            "7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_wrong_digest_recovers_different_address() {
        let secret = test_secret();
        let digest = keccak256(b"message one");
        let sig = sign_digest(&digest, &secret).unwrap();

        let other = keccak256(b"message two");
        let recovered = recover_address(&other, &sig).unwrap();
        assert_ne!(
            hex::encode(recovered),
            "7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_invalid_recovery_id() {
        let sig = RecoverableSignature::new([1u8; 32], [1u8; 32], 4);
        let digest = [0u8; 32];
        assert!(matches!(
            recover_address(&digest, &sig),
            Err(CryptoError::InvalidRecoveryId(4))
        ));
    }

    #[test]
    fn test_low_s_detection() {
        let secret = test_secret();
        let digest = keccak256(b"low s");
        // sign_digest produces normalized signatures
        let sig = sign_digest(&digest, &secret).unwrap();
        assert!(sig.has_low_s());

        let high = RecoverableSignature::new([1u8; 32], [0xffu8; 32], 0);
        assert!(!high.has_low_s());
    }
}
