//! # Transactions
//!
//! The three transaction envelopes (legacy, EIP-2930 access list,
//! EIP-1559 dynamic fee), their signing digests, and sender recovery.

use crate::errors::RlpError;
use crate::rlp::{self, Item, RlpList};
use crate::value_objects::{Address, Bytes, Hash, StorageKey, U256};
use serde::{Deserialize, Serialize};
use shared_crypto::{recover_address, sign_digest, CryptoError, RecoverableSignature};

// =============================================================================
// TYPES AND SIGNATURE
// =============================================================================

/// EIP-2718 envelope type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    /// Untyped RLP transaction.
    Legacy,
    /// Type 0x01, EIP-2930.
    AccessList,
    /// Type 0x02, EIP-1559.
    DynamicFee,
}

impl TxType {
    /// The envelope byte; zero for legacy.
    #[must_use]
    pub fn byte(self) -> u8 {
        match self {
            TxType::Legacy => 0,
            TxType::AccessList => 1,
            TxType::DynamicFee => 2,
        }
    }
}

/// One entry of an EIP-2930 access list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListEntry {
    /// Pre-warmed account.
    pub address: Address,
    /// Pre-warmed storage slots under that account.
    pub storage_keys: Vec<StorageKey>,
}

impl AccessListEntry {
    fn encode(&self) -> Vec<u8> {
        let mut keys = RlpList::new();
        for key in &self.storage_keys {
            keys.append_bytes(key.as_bytes());
        }
        let mut list = RlpList::new();
        list.append_address(&self.address).append_raw(&keys.finish());
        list.finish()
    }

    fn decode_item(item: &Item<'_>) -> Result<Self, RlpError> {
        let fields = item.as_list_of(2)?;
        let storage_keys = fields[1]
            .as_list()?
            .iter()
            .map(|key| {
                let bytes = key.as_bytes()?;
                if bytes.len() != 32 {
                    return Err(RlpError::UnexpectedFieldLength {
                        expected: 32,
                        actual: bytes.len(),
                    });
                }
                let mut raw = [0u8; 32];
                raw.copy_from_slice(bytes);
                Ok(StorageKey::new(raw))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            address: fields[0].as_address()?,
            storage_keys,
        })
    }
}

fn encode_access_list(entries: &[AccessListEntry]) -> Vec<u8> {
    let mut list = RlpList::new();
    for entry in entries {
        list.append_raw(&entry.encode());
    }
    list.finish()
}

fn decode_access_list(item: &Item<'_>) -> Result<Vec<AccessListEntry>, RlpError> {
    item.as_list()?
        .iter()
        .map(AccessListEntry::decode_item)
        .collect()
}

/// Transaction signature. For legacy transactions `v` is the raw recovery
/// value (27/28 or the EIP-155 chain-folded form); typed transactions store
/// the bare y-parity bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    /// Raw v / y-parity.
    pub v: u64,
    /// r component.
    pub r: U256,
    /// s component.
    pub s: U256,
}

impl TxSignature {
    /// The y-parity bit, unfolding EIP-155 chain ids for legacy values.
    #[must_use]
    pub fn y_parity(&self) -> u8 {
        match self.v {
            27 | 28 => (self.v - 27) as u8,
            v if v >= 35 => ((v - 35) % 2) as u8,
            v => (v % 2) as u8,
        }
    }

    /// Chain id folded into a legacy `v`, if any (EIP-155).
    #[must_use]
    pub fn legacy_chain_id(&self) -> Option<u64> {
        if self.v >= 35 {
            Some((self.v - 35) / 2)
        } else {
            None
        }
    }

    /// True if the S component is in the lower half of the curve order.
    #[must_use]
    pub fn has_low_s(&self) -> bool {
        self.to_recoverable().has_low_s()
    }

    fn to_recoverable(&self) -> RecoverableSignature {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        self.r.to_big_endian(&mut r);
        self.s.to_big_endian(&mut s);
        RecoverableSignature::new(r, s, self.y_parity())
    }
}

// =============================================================================
// TRANSACTION VARIANTS
// =============================================================================

/// Untyped RLP transaction, optionally replay-protected (EIP-155).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTransaction {
    /// Sender nonce.
    pub nonce: u64,
    /// Price per gas unit in wei.
    pub gas_price: U256,
    /// Gas ceiling for this transaction.
    pub gas_limit: u64,
    /// Recipient; `None` creates a contract.
    pub to: Option<Address>,
    /// Transferred value in wei.
    pub value: U256,
    /// Calldata or init code.
    pub data: Bytes,
    /// Signature.
    pub signature: TxSignature,
}

/// EIP-2930 typed transaction with a warm-up access list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListTransaction {
    /// Chain id bound into the digest.
    pub chain_id: u64,
    /// Sender nonce.
    pub nonce: u64,
    /// Price per gas unit in wei.
    pub gas_price: U256,
    /// Gas ceiling for this transaction.
    pub gas_limit: u64,
    /// Recipient; `None` creates a contract.
    pub to: Option<Address>,
    /// Transferred value in wei.
    pub value: U256,
    /// Calldata or init code.
    pub data: Bytes,
    /// Pre-warmed accounts and slots.
    pub access_list: Vec<AccessListEntry>,
    /// Signature.
    pub signature: TxSignature,
}

/// EIP-1559 typed transaction with a fee cap and priority fee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFeeTransaction {
    /// Chain id bound into the digest.
    pub chain_id: u64,
    /// Sender nonce.
    pub nonce: u64,
    /// Tip per gas unit paid to the coinbase, in wei.
    pub max_priority_fee_per_gas: U256,
    /// Total per-gas ceiling, in wei.
    pub max_fee_per_gas: U256,
    /// Gas ceiling for this transaction.
    pub gas_limit: u64,
    /// Recipient; `None` creates a contract.
    pub to: Option<Address>,
    /// Transferred value in wei.
    pub value: U256,
    /// Calldata or init code.
    pub data: Bytes,
    /// Pre-warmed accounts and slots.
    pub access_list: Vec<AccessListEntry>,
    /// Signature.
    pub signature: TxSignature,
}

/// A signed transaction of any supported envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    /// Untyped RLP transaction.
    Legacy(LegacyTransaction),
    /// Type 0x01.
    AccessList(AccessListTransaction),
    /// Type 0x02.
    DynamicFee(DynamicFeeTransaction),
}

impl Transaction {
    /// Envelope type.
    #[must_use]
    pub fn tx_type(&self) -> TxType {
        match self {
            Transaction::Legacy(_) => TxType::Legacy,
            Transaction::AccessList(_) => TxType::AccessList,
            Transaction::DynamicFee(_) => TxType::DynamicFee,
        }
    }

    /// Sender nonce.
    #[must_use]
    pub fn nonce(&self) -> u64 {
        match self {
            Transaction::Legacy(tx) => tx.nonce,
            Transaction::AccessList(tx) => tx.nonce,
            Transaction::DynamicFee(tx) => tx.nonce,
        }
    }

    /// Gas ceiling.
    #[must_use]
    pub fn gas_limit(&self) -> u64 {
        match self {
            Transaction::Legacy(tx) => tx.gas_limit,
            Transaction::AccessList(tx) => tx.gas_limit,
            Transaction::DynamicFee(tx) => tx.gas_limit,
        }
    }

    /// Recipient; `None` for contract creation.
    #[must_use]
    pub fn to(&self) -> Option<Address> {
        match self {
            Transaction::Legacy(tx) => tx.to,
            Transaction::AccessList(tx) => tx.to,
            Transaction::DynamicFee(tx) => tx.to,
        }
    }

    /// Transferred value.
    #[must_use]
    pub fn value(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.value,
            Transaction::AccessList(tx) => tx.value,
            Transaction::DynamicFee(tx) => tx.value,
        }
    }

    /// Calldata or init code.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        match self {
            Transaction::Legacy(tx) => &tx.data,
            Transaction::AccessList(tx) => &tx.data,
            Transaction::DynamicFee(tx) => &tx.data,
        }
    }

    /// Access list; empty for legacy transactions.
    #[must_use]
    pub fn access_list(&self) -> &[AccessListEntry] {
        match self {
            Transaction::Legacy(_) => &[],
            Transaction::AccessList(tx) => &tx.access_list,
            Transaction::DynamicFee(tx) => &tx.access_list,
        }
    }

    /// Chain id: explicit on typed envelopes, EIP-155-folded on legacy.
    #[must_use]
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Transaction::Legacy(tx) => tx.signature.legacy_chain_id(),
            Transaction::AccessList(tx) => Some(tx.chain_id),
            Transaction::DynamicFee(tx) => Some(tx.chain_id),
        }
    }

    /// The signature.
    #[must_use]
    pub fn signature(&self) -> &TxSignature {
        match self {
            Transaction::Legacy(tx) => &tx.signature,
            Transaction::AccessList(tx) => &tx.signature,
            Transaction::DynamicFee(tx) => &tx.signature,
        }
    }

    /// True for contract-creation transactions.
    #[must_use]
    pub fn is_create(&self) -> bool {
        self.to().is_none()
    }

    /// The most the sender can pay per gas unit. Used for the up-front
    /// balance check.
    #[must_use]
    pub fn max_fee_per_gas(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.gas_price,
            Transaction::AccessList(tx) => tx.gas_price,
            Transaction::DynamicFee(tx) => tx.max_fee_per_gas,
        }
    }

    /// The tip ceiling per gas unit.
    #[must_use]
    pub fn max_priority_fee_per_gas(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.gas_price,
            Transaction::AccessList(tx) => tx.gas_price,
            Transaction::DynamicFee(tx) => tx.max_priority_fee_per_gas,
        }
    }

    /// Per-gas price actually charged: `min(maxFee, baseFee + tip)` for
    /// dynamic-fee transactions, the declared gas price otherwise.
    #[must_use]
    pub fn effective_gas_price(&self, base_fee: Option<U256>) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.gas_price,
            Transaction::AccessList(tx) => tx.gas_price,
            Transaction::DynamicFee(tx) => {
                let base = base_fee.unwrap_or_default();
                tx.max_fee_per_gas
                    .min(base.saturating_add(tx.max_priority_fee_per_gas))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Encoding
    // -------------------------------------------------------------------------

    /// Consensus encoding: raw RLP for legacy, `type || rlp(payload)` for
    /// typed envelopes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Transaction::Legacy(tx) => {
                let mut list = RlpList::new();
                list.append_u64(tx.nonce)
                    .append_u256(tx.gas_price)
                    .append_u64(tx.gas_limit)
                    .append_optional_address(tx.to.as_ref())
                    .append_u256(tx.value)
                    .append_bytes(tx.data.as_slice())
                    .append_u64(tx.signature.v)
                    .append_u256(tx.signature.r)
                    .append_u256(tx.signature.s);
                list.finish()
            }
            Transaction::AccessList(tx) => {
                let mut list = RlpList::new();
                list.append_u64(tx.chain_id)
                    .append_u64(tx.nonce)
                    .append_u256(tx.gas_price)
                    .append_u64(tx.gas_limit)
                    .append_optional_address(tx.to.as_ref())
                    .append_u256(tx.value)
                    .append_bytes(tx.data.as_slice())
                    .append_raw(&encode_access_list(&tx.access_list))
                    .append_u64(tx.signature.v)
                    .append_u256(tx.signature.r)
                    .append_u256(tx.signature.s);
                envelope(1, list.finish())
            }
            Transaction::DynamicFee(tx) => {
                let mut list = RlpList::new();
                list.append_u64(tx.chain_id)
                    .append_u64(tx.nonce)
                    .append_u256(tx.max_priority_fee_per_gas)
                    .append_u256(tx.max_fee_per_gas)
                    .append_u64(tx.gas_limit)
                    .append_optional_address(tx.to.as_ref())
                    .append_u256(tx.value)
                    .append_bytes(tx.data.as_slice())
                    .append_raw(&encode_access_list(&tx.access_list))
                    .append_u64(tx.signature.v)
                    .append_u256(tx.signature.r)
                    .append_u256(tx.signature.s);
                envelope(2, list.finish())
            }
        }
    }

    /// Decode a transaction from its consensus encoding.
    ///
    /// # Errors
    ///
    /// Returns `RlpError` on malformed input or unknown envelope types.
    pub fn decode(data: &[u8]) -> Result<Self, RlpError> {
        match data.first() {
            Some(&byte) if byte <= 0x7f => {
                let item = rlp::decode(&data[1..])?;
                match byte {
                    1 => Self::decode_access_list_payload(&item),
                    2 => Self::decode_dynamic_fee_payload(&item),
                    other => Err(RlpError::UnknownEnvelopeType(other)),
                }
            }
            Some(_) => Self::decode_legacy_payload(&rlp::decode(data)?),
            None => Err(RlpError::UnexpectedEof),
        }
    }

    /// Decode a transaction from a body item: a nested list for legacy, an
    /// opaque byte string for typed envelopes.
    ///
    /// # Errors
    ///
    /// Returns `RlpError` on malformed input.
    pub fn decode_item(item: &Item<'_>) -> Result<Self, RlpError> {
        match item {
            Item::List(_) => Self::decode_legacy_payload(item),
            Item::Bytes(bytes) => {
                match bytes.first() {
                    // Typed envelopes only; a legacy tx is never a string.
                    Some(&byte) if byte <= 0x7f => Self::decode(bytes),
                    Some(&byte) => Err(RlpError::UnknownEnvelopeType(byte)),
                    None => Err(RlpError::UnexpectedEof),
                }
            }
        }
    }

    fn decode_legacy_payload(item: &Item<'_>) -> Result<Self, RlpError> {
        let fields = item.as_list_of(9)?;
        Ok(Transaction::Legacy(LegacyTransaction {
            nonce: fields[0].as_u64()?,
            gas_price: fields[1].as_u256()?,
            gas_limit: fields[2].as_u64()?,
            to: fields[3].as_optional_address()?,
            value: fields[4].as_u256()?,
            data: Bytes::from_slice(fields[5].as_bytes()?),
            signature: TxSignature {
                v: fields[6].as_u64()?,
                r: fields[7].as_u256()?,
                s: fields[8].as_u256()?,
            },
        }))
    }

    fn decode_access_list_payload(item: &Item<'_>) -> Result<Self, RlpError> {
        let fields = item.as_list_of(11)?;
        Ok(Transaction::AccessList(AccessListTransaction {
            chain_id: fields[0].as_u64()?,
            nonce: fields[1].as_u64()?,
            gas_price: fields[2].as_u256()?,
            gas_limit: fields[3].as_u64()?,
            to: fields[4].as_optional_address()?,
            value: fields[5].as_u256()?,
            data: Bytes::from_slice(fields[6].as_bytes()?),
            access_list: decode_access_list(&fields[7])?,
            signature: TxSignature {
                v: fields[8].as_u64()?,
                r: fields[9].as_u256()?,
                s: fields[10].as_u256()?,
            },
        }))
    }

    fn decode_dynamic_fee_payload(item: &Item<'_>) -> Result<Self, RlpError> {
        let fields = item.as_list_of(12)?;
        Ok(Transaction::DynamicFee(DynamicFeeTransaction {
            chain_id: fields[0].as_u64()?,
            nonce: fields[1].as_u64()?,
            max_priority_fee_per_gas: fields[2].as_u256()?,
            max_fee_per_gas: fields[3].as_u256()?,
            gas_limit: fields[4].as_u64()?,
            to: fields[5].as_optional_address()?,
            value: fields[6].as_u256()?,
            data: Bytes::from_slice(fields[7].as_bytes()?),
            access_list: decode_access_list(&fields[8])?,
            signature: TxSignature {
                v: fields[9].as_u64()?,
                r: fields[10].as_u256()?,
                s: fields[11].as_u256()?,
            },
        }))
    }

    /// Keccak of the consensus encoding; the transaction hash.
    #[must_use]
    pub fn hash(&self) -> Hash {
        Hash::keccak(&self.encode())
    }

    // -------------------------------------------------------------------------
    // Signing
    // -------------------------------------------------------------------------

    /// The digest the sender signed. For legacy transactions the digest
    /// shape follows the signature's own v (EIP-155 when chain-folded).
    #[must_use]
    pub fn signing_digest(&self) -> Hash {
        match self {
            Transaction::Legacy(tx) => legacy_signing_digest(tx, tx.signature.legacy_chain_id()),
            Transaction::AccessList(tx) => {
                let mut list = RlpList::new();
                list.append_u64(tx.chain_id)
                    .append_u64(tx.nonce)
                    .append_u256(tx.gas_price)
                    .append_u64(tx.gas_limit)
                    .append_optional_address(tx.to.as_ref())
                    .append_u256(tx.value)
                    .append_bytes(tx.data.as_slice())
                    .append_raw(&encode_access_list(&tx.access_list));
                Hash::keccak(&envelope(1, list.finish()))
            }
            Transaction::DynamicFee(tx) => {
                let mut list = RlpList::new();
                list.append_u64(tx.chain_id)
                    .append_u64(tx.nonce)
                    .append_u256(tx.max_priority_fee_per_gas)
                    .append_u256(tx.max_fee_per_gas)
                    .append_u64(tx.gas_limit)
                    .append_optional_address(tx.to.as_ref())
                    .append_u256(tx.value)
                    .append_bytes(tx.data.as_slice())
                    .append_raw(&encode_access_list(&tx.access_list));
                Hash::keccak(&envelope(2, list.finish()))
            }
        }
    }

    /// Recover the sender address from the signature.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError` for malformed or unrecoverable signatures.
    pub fn recover_sender(&self) -> Result<Address, CryptoError> {
        let digest = self.signing_digest();
        let recovered = recover_address(digest.as_bytes(), &self.signature().to_recoverable())?;
        Ok(Address::new(recovered))
    }

    /// Sign the transaction with a raw secret key, replacing its signature.
    /// For legacy transactions `chain_id` selects EIP-155 (`Some`) or
    /// pre-Spurious (`None`) encoding; typed envelopes ignore it.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidPrivateKey` for out-of-range secrets.
    pub fn sign(mut self, secret: &[u8; 32], chain_id: Option<u64>) -> Result<Self, CryptoError> {
        let digest = match &self {
            Transaction::Legacy(tx) => legacy_signing_digest(tx, chain_id),
            _ => self.signing_digest(),
        };
        let sig = sign_digest(digest.as_bytes(), secret)?;
        let v = match &self {
            Transaction::Legacy(_) => match chain_id {
                Some(id) => 35 + id * 2 + u64::from(sig.v),
                None => 27 + u64::from(sig.v),
            },
            _ => u64::from(sig.v),
        };
        let signature = TxSignature {
            v,
            r: U256::from_big_endian(&sig.r),
            s: U256::from_big_endian(&sig.s),
        };
        match &mut self {
            Transaction::Legacy(tx) => tx.signature = signature,
            Transaction::AccessList(tx) => tx.signature = signature,
            Transaction::DynamicFee(tx) => tx.signature = signature,
        }
        Ok(self)
    }
}

fn envelope(tx_type: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 1);
    out.push(tx_type);
    out.extend_from_slice(&payload);
    out
}

fn legacy_signing_digest(tx: &LegacyTransaction, chain_id: Option<u64>) -> Hash {
    let mut list = RlpList::new();
    list.append_u64(tx.nonce)
        .append_u256(tx.gas_price)
        .append_u64(tx.gas_limit)
        .append_optional_address(tx.to.as_ref())
        .append_u256(tx.value)
        .append_bytes(tx.data.as_slice());
    if let Some(id) = chain_id {
        list.append_u64(id).append_u64(0).append_u64(0);
    }
    Hash::keccak(&list.finish())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> [u8; 32] {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        secret
    }

    /// Address of secret key 0x...01.
    fn known_sender() -> Address {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hex::decode("7e5f4552091a69125d5dfcb7b8c2659029395bdf").unwrap());
        Address::new(bytes)
    }

    fn unsigned_legacy() -> Transaction {
        Transaction::Legacy(LegacyTransaction {
            nonce: 0,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21_000,
            to: Some(Address::new([0x11; 20])),
            value: U256::from(1_000u64),
            data: Bytes::new(),
            signature: TxSignature {
                v: 0,
                r: U256::zero(),
                s: U256::zero(),
            },
        })
    }

    #[test]
    fn test_legacy_eip155_sign_and_recover() {
        let tx = unsigned_legacy().sign(&secret(), Some(1)).unwrap();
        assert_eq!(tx.chain_id(), Some(1));
        assert!(tx.signature().v == 37 || tx.signature().v == 38);
        assert_eq!(tx.recover_sender().unwrap(), known_sender());
    }

    #[test]
    fn test_legacy_pre_eip155_sign_and_recover() {
        let tx = unsigned_legacy().sign(&secret(), None).unwrap();
        assert_eq!(tx.chain_id(), None);
        assert!(tx.signature().v == 27 || tx.signature().v == 28);
        assert_eq!(tx.recover_sender().unwrap(), known_sender());
    }

    #[test]
    fn test_dynamic_fee_sign_and_recover() {
        let tx = Transaction::DynamicFee(DynamicFeeTransaction {
            chain_id: 1,
            nonce: 3,
            max_priority_fee_per_gas: U256::from(2_000_000_000u64),
            max_fee_per_gas: U256::from(100_000_000_000u64),
            gas_limit: 100_000,
            to: None,
            value: U256::zero(),
            data: Bytes::from_slice(&[0x60, 0x01]),
            access_list: vec![AccessListEntry {
                address: Address::new([0x22; 20]),
                storage_keys: vec![StorageKey::new([0x01; 32])],
            }],
            signature: TxSignature {
                v: 0,
                r: U256::zero(),
                s: U256::zero(),
            },
        })
        .sign(&secret(), None)
        .unwrap();

        assert_eq!(tx.recover_sender().unwrap(), known_sender());
        assert!(tx.signature().v <= 1);
    }

    #[test]
    fn test_envelope_roundtrips() {
        let legacy = unsigned_legacy().sign(&secret(), Some(1)).unwrap();
        assert_eq!(Transaction::decode(&legacy.encode()).unwrap(), legacy);

        let typed = Transaction::AccessList(AccessListTransaction {
            chain_id: 1,
            nonce: 9,
            gas_price: U256::from(30_000_000_000u64),
            gas_limit: 60_000,
            to: Some(Address::new([0x42; 20])),
            value: U256::from(5u64),
            data: Bytes::from_slice(b"abi"),
            access_list: vec![AccessListEntry {
                address: Address::new([0x42; 20]),
                storage_keys: vec![],
            }],
            signature: TxSignature {
                v: 1,
                r: U256::from(7u64),
                s: U256::from(8u64),
            },
        });
        let encoded = typed.encode();
        assert_eq!(encoded[0], 1);
        assert_eq!(Transaction::decode(&encoded).unwrap(), typed);

        let dynamic = Transaction::DynamicFee(DynamicFeeTransaction {
            chain_id: 5,
            nonce: 0,
            max_priority_fee_per_gas: U256::one(),
            max_fee_per_gas: U256::from(2u64),
            gas_limit: 21_000,
            to: Some(Address::ZERO),
            value: U256::zero(),
            data: Bytes::new(),
            access_list: vec![],
            signature: TxSignature {
                v: 0,
                r: U256::from(1u64),
                s: U256::from(2u64),
            },
        });
        let encoded = dynamic.encode();
        assert_eq!(encoded[0], 2);
        assert_eq!(Transaction::decode(&encoded).unwrap(), dynamic);
    }

    #[test]
    fn test_effective_gas_price() {
        let tx = Transaction::DynamicFee(DynamicFeeTransaction {
            chain_id: 1,
            nonce: 0,
            max_priority_fee_per_gas: U256::from(2u64),
            max_fee_per_gas: U256::from(10u64),
            gas_limit: 21_000,
            to: Some(Address::ZERO),
            value: U256::zero(),
            data: Bytes::new(),
            access_list: vec![],
            signature: TxSignature {
                v: 0,
                r: U256::zero(),
                s: U256::zero(),
            },
        });

        // Tip fits under the cap
        assert_eq!(
            tx.effective_gas_price(Some(U256::from(5u64))),
            U256::from(7u64)
        );
        // Cap binds
        assert_eq!(
            tx.effective_gas_price(Some(U256::from(9u64))),
            U256::from(10u64)
        );
    }

    #[test]
    fn test_unknown_envelope_type_rejected() {
        assert_eq!(
            Transaction::decode(&[0x03, 0xc0]),
            Err(RlpError::UnknownEnvelopeType(3))
        );
    }
}
