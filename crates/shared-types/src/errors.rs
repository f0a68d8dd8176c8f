//! Error types for the shared data model.

use thiserror::Error;

/// Errors from RLP decoding.
///
/// Encoding is infallible; decoding rejects every non-canonical form so a
/// decode-reencode cycle is the identity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RlpError {
    /// Input ended before the announced payload.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Trailing bytes after the top-level item.
    #[error("trailing bytes after item")]
    TrailingBytes,

    /// A long-form length with leading zero bytes, or a short payload
    /// encoded in long form.
    #[error("non-canonical length encoding")]
    NonCanonical,

    /// An integer field with leading zero bytes.
    #[error("non-canonical integer: leading zeros")]
    LeadingZeros,

    /// Expected a byte string, found a list (or vice versa).
    #[error("unexpected item kind: expected {expected}")]
    UnexpectedKind {
        /// "bytes" or "list".
        expected: &'static str,
    },

    /// A list had the wrong number of items for the entity being decoded.
    #[error("unexpected list length: expected {expected}, got {actual}")]
    UnexpectedListLength {
        /// Items required by the entity.
        expected: usize,
        /// Items present in the input.
        actual: usize,
    },

    /// A fixed-width field (hash, address, bloom) had the wrong length.
    #[error("unexpected field length: expected {expected}, got {actual}")]
    UnexpectedFieldLength {
        /// Required byte length.
        expected: usize,
        /// Byte length in the input.
        actual: usize,
    },

    /// An integer field overflowed its target width.
    #[error("integer overflow decoding field")]
    IntegerOverflow,

    /// A typed-envelope byte was not recognized.
    #[error("unknown envelope type: 0x{0:02x}")]
    UnknownEnvelopeType(u8),
}
