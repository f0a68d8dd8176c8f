//! # Keccak-256 Hashing
//!
//! All consensus commitments (trie roots, block hashes, bloom positions,
//! contract addresses) are Keccak-256 digests. This is the original Keccak
//! padding, not the NIST SHA3-256 variant.

use sha3::{Digest, Keccak256};

/// Keccak-256 output (256-bit).
pub type Hash256 = [u8; 32];

/// Root hash of an empty trie: `keccak256(rlp(""))` = `keccak256(0x80)`.
pub const EMPTY_TRIE_ROOT: Hash256 = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8,
    0x6e, 0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63,
    0xb4, 0x21,
];

/// Hash of empty code: `keccak256("")`.
pub const EMPTY_CODE_HASH: Hash256 = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03,
    0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85,
    0xa4, 0x70,
];

/// Stateful Keccak-256 hasher for multi-part inputs.
pub struct Keccak256Hasher {
    inner: Keccak256,
}

impl Keccak256Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Keccak256::new(),
        }
    }

    /// Update with data.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finalize and return the digest.
    #[must_use]
    pub fn finalize(self) -> Hash256 {
        self.inner.finalize().into()
    }
}

impl Default for Keccak256Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash data with Keccak-256 (one-shot).
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash multiple inputs as one concatenated message.
#[must_use]
pub fn keccak256_many(inputs: &[&[u8]]) -> Hash256 {
    let mut hasher = Keccak256::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize().into()
}
