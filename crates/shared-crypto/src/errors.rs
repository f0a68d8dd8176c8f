//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors from hashing and signature operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Signature bytes do not form a valid curve signature.
    #[error("invalid signature")]
    InvalidSignature,

    /// Recovery id is not 0 or 1.
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// No public key could be recovered from the signature.
    #[error("signature recovery failed")]
    RecoveryFailed,

    /// Secret key bytes are out of range for the curve.
    #[error("invalid private key")]
    InvalidPrivateKey,
}
