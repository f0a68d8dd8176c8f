//! # RLP Encoding and Decoding
//!
//! Recursive length prefix, the wire format behind every consensus
//! commitment: trie nodes, headers, transactions, and receipts.
//!
//! The encoder builds lists through [`RlpList`]; nested structures append
//! their already-encoded form with [`RlpList::append_raw`]. The decoder
//! parses into a borrowed [`Item`] tree and enforces canonical form, so
//! decoding then re-encoding is the identity.

use crate::errors::RlpError;
use crate::value_objects::{Address, Hash, U256};

// =============================================================================
// ENCODING
// =============================================================================

/// RLP-encode a byte string.
#[must_use]
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 9);
    append_bytes_to(&mut out, data);
    out
}

/// RLP-encode an unsigned 64-bit integer (minimal big-endian).
#[must_use]
pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_bytes(&trim_leading_zeros(&value.to_be_bytes()))
}

/// RLP-encode a 256-bit word (minimal big-endian).
#[must_use]
pub fn encode_u256(value: U256) -> Vec<u8> {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    encode_bytes(&trim_leading_zeros(&bytes))
}

/// Wrap already-encoded items into a list.
#[must_use]
pub fn wrap_list(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    append_list_header(&mut out, payload.len());
    out.extend_from_slice(payload);
    out
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

fn append_bytes_to(out: &mut Vec<u8>, data: &[u8]) {
    if data.len() == 1 && data[0] < 0x80 {
        out.push(data[0]);
    } else if data.len() < 56 {
        out.push(0x80 + data.len() as u8);
        out.extend_from_slice(data);
    } else {
        let len_bytes = trim_leading_zeros(&data.len().to_be_bytes());
        out.push(0xb7 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(data);
    }
}

fn append_list_header(out: &mut Vec<u8>, payload_len: usize) {
    if payload_len < 56 {
        out.push(0xc0 + payload_len as u8);
    } else {
        let len_bytes = trim_leading_zeros(&payload_len.to_be_bytes());
        out.push(0xf7 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
    }
}

/// Builder for an RLP list.
///
/// Items are appended in order; `finish` prepends the list header.
#[derive(Default)]
pub struct RlpList {
    payload: Vec<u8>,
}

impl RlpList {
    /// Creates an empty list builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a byte string item.
    pub fn append_bytes(&mut self, data: &[u8]) -> &mut Self {
        append_bytes_to(&mut self.payload, data);
        self
    }

    /// Append an unsigned 64-bit integer item.
    pub fn append_u64(&mut self, value: u64) -> &mut Self {
        self.append_bytes(&trim_leading_zeros(&value.to_be_bytes()))
    }

    /// Append a 256-bit word item.
    pub fn append_u256(&mut self, value: U256) -> &mut Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        self.append_bytes(&trim_leading_zeros(&bytes))
    }

    /// Append a 32-byte hash item.
    pub fn append_hash(&mut self, hash: &Hash) -> &mut Self {
        self.append_bytes(hash.as_bytes())
    }

    /// Append a 20-byte address item.
    pub fn append_address(&mut self, address: &Address) -> &mut Self {
        self.append_bytes(address.as_bytes())
    }

    /// Append an optional address; `None` encodes as the empty string
    /// (contract-creation `to` field).
    pub fn append_optional_address(&mut self, address: Option<&Address>) -> &mut Self {
        match address {
            Some(addr) => self.append_address(addr),
            None => self.append_bytes(&[]),
        }
    }

    /// Append an already-encoded item (nested list or pre-built node).
    pub fn append_raw(&mut self, encoded: &[u8]) -> &mut Self {
        self.payload.extend_from_slice(encoded);
        self
    }

    /// Finish the list, producing the full encoding.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        wrap_list(&self.payload)
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// A decoded RLP item borrowing from the input buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item<'a> {
    /// A byte string.
    Bytes(&'a [u8]),
    /// A list of items.
    List(Vec<Item<'a>>),
}

/// Decode exactly one item from `data`, rejecting trailing bytes.
///
/// # Errors
///
/// Returns `RlpError` on truncated, non-canonical, or malformed input.
pub fn decode(data: &[u8]) -> Result<Item<'_>, RlpError> {
    let (item, consumed) = decode_item(data)?;
    if consumed != data.len() {
        return Err(RlpError::TrailingBytes);
    }
    Ok(item)
}

fn decode_item(data: &[u8]) -> Result<(Item<'_>, usize), RlpError> {
    let &prefix = data.first().ok_or(RlpError::UnexpectedEof)?;
    match prefix {
        0x00..=0x7f => Ok((Item::Bytes(&data[..1]), 1)),
        0x80..=0xb7 => {
            let len = (prefix - 0x80) as usize;
            let payload = data.get(1..1 + len).ok_or(RlpError::UnexpectedEof)?;
            // A single byte below 0x80 must use the literal form.
            if len == 1 && payload[0] < 0x80 {
                return Err(RlpError::NonCanonical);
            }
            Ok((Item::Bytes(payload), 1 + len))
        }
        0xb8..=0xbf => {
            let (len, header) = decode_long_length(data, prefix - 0xb7)?;
            if len < 56 {
                return Err(RlpError::NonCanonical);
            }
            let payload = data
                .get(header..header + len)
                .ok_or(RlpError::UnexpectedEof)?;
            Ok((Item::Bytes(payload), header + len))
        }
        0xc0..=0xf7 => {
            let len = (prefix - 0xc0) as usize;
            let payload = data.get(1..1 + len).ok_or(RlpError::UnexpectedEof)?;
            Ok((Item::List(decode_list_payload(payload)?), 1 + len))
        }
        0xf8..=0xff => {
            let (len, header) = decode_long_length(data, prefix - 0xf7)?;
            if len < 56 {
                return Err(RlpError::NonCanonical);
            }
            let payload = data
                .get(header..header + len)
                .ok_or(RlpError::UnexpectedEof)?;
            Ok((Item::List(decode_list_payload(payload)?), header + len))
        }
    }
}

fn decode_long_length(data: &[u8], len_of_len: u8) -> Result<(usize, usize), RlpError> {
    let len_of_len = len_of_len as usize;
    let len_bytes = data.get(1..1 + len_of_len).ok_or(RlpError::UnexpectedEof)?;
    if len_bytes[0] == 0 {
        return Err(RlpError::NonCanonical);
    }
    if len_of_len > core::mem::size_of::<usize>() {
        return Err(RlpError::IntegerOverflow);
    }
    let mut len = 0usize;
    for &b in len_bytes {
        len = (len << 8) | b as usize;
    }
    Ok((len, 1 + len_of_len))
}

fn decode_list_payload(mut payload: &[u8]) -> Result<Vec<Item<'_>>, RlpError> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, consumed) = decode_item(payload)?;
        items.push(item);
        payload = &payload[consumed..];
    }
    Ok(items)
}

impl<'a> Item<'a> {
    /// The item as a byte string.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedKind` if the item is a list.
    pub fn as_bytes(&self) -> Result<&'a [u8], RlpError> {
        match self {
            Item::Bytes(bytes) => Ok(bytes),
            Item::List(_) => Err(RlpError::UnexpectedKind { expected: "bytes" }),
        }
    }

    /// The item as a list of sub-items.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedKind` if the item is a byte string.
    pub fn as_list(&self) -> Result<&[Item<'a>], RlpError> {
        match self {
            Item::List(items) => Ok(items),
            Item::Bytes(_) => Err(RlpError::UnexpectedKind { expected: "list" }),
        }
    }

    /// The item as a list with exactly `expected` entries.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedListLength` on any other arity.
    pub fn as_list_of(&self, expected: usize) -> Result<&[Item<'a>], RlpError> {
        let items = self.as_list()?;
        if items.len() != expected {
            return Err(RlpError::UnexpectedListLength {
                expected,
                actual: items.len(),
            });
        }
        Ok(items)
    }

    /// The item as a canonical unsigned 64-bit integer.
    ///
    /// # Errors
    ///
    /// Rejects leading zeros and values wider than 8 bytes.
    pub fn as_u64(&self) -> Result<u64, RlpError> {
        let bytes = self.as_bytes()?;
        check_canonical_integer(bytes)?;
        if bytes.len() > 8 {
            return Err(RlpError::IntegerOverflow);
        }
        let mut value = 0u64;
        for &b in bytes {
            value = (value << 8) | u64::from(b);
        }
        Ok(value)
    }

    /// The item as a canonical 256-bit word.
    ///
    /// # Errors
    ///
    /// Rejects leading zeros and values wider than 32 bytes.
    pub fn as_u256(&self) -> Result<U256, RlpError> {
        let bytes = self.as_bytes()?;
        check_canonical_integer(bytes)?;
        if bytes.len() > 32 {
            return Err(RlpError::IntegerOverflow);
        }
        Ok(U256::from_big_endian(bytes))
    }

    /// The item as a 32-byte hash.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedFieldLength` unless exactly 32 bytes.
    pub fn as_hash(&self) -> Result<Hash, RlpError> {
        let bytes = self.as_bytes()?;
        Hash::from_slice(bytes).ok_or(RlpError::UnexpectedFieldLength {
            expected: 32,
            actual: bytes.len(),
        })
    }

    /// The item as a 20-byte address.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedFieldLength` unless exactly 20 bytes.
    pub fn as_address(&self) -> Result<Address, RlpError> {
        let bytes = self.as_bytes()?;
        Address::from_slice(bytes).ok_or(RlpError::UnexpectedFieldLength {
            expected: 20,
            actual: bytes.len(),
        })
    }

    /// The item as an optional address; the empty string decodes to `None`.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedFieldLength` for any non-empty, non-20-byte string.
    pub fn as_optional_address(&self) -> Result<Option<Address>, RlpError> {
        let bytes = self.as_bytes()?;
        if bytes.is_empty() {
            return Ok(None);
        }
        self.as_address().map(Some)
    }
}

fn check_canonical_integer(bytes: &[u8]) -> Result<(), RlpError> {
    if bytes.first() == Some(&0) {
        return Err(RlpError::LeadingZeros);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
