//! # Chain Entities
//!
//! Accounts, headers, bodies, logs, receipts, and the logs bloom. Every
//! entity carries its consensus RLP encoding alongside `serde` derives for
//! the surrounding subsystems.

use crate::errors::RlpError;
use crate::rlp::{self, Item, RlpList};
use crate::transaction::Transaction;
use crate::value_objects::{Address, Bytes, Hash, U256};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

// =============================================================================
// ACCOUNT
// =============================================================================

/// The state-trie value for one address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Number of transactions sent (EOA) or contracts created (contract).
    pub nonce: u64,
    /// Balance in wei.
    pub balance: U256,
    /// Root of the account's storage trie.
    pub storage_root: Hash,
    /// Keccak-256 of the account's code.
    pub code_hash: Hash,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            storage_root: Hash::EMPTY_TRIE,
            code_hash: Hash::EMPTY_CODE,
        }
    }
}

impl Account {
    /// An account is empty iff nonce, balance, and code are all absent
    /// (EIP-161). Empty touched accounts are reaped from Spurious Dragon.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code_hash == Hash::EMPTY_CODE
    }

    /// True if the account has code.
    #[must_use]
    pub fn has_code(&self) -> bool {
        self.code_hash != Hash::EMPTY_CODE
    }

    /// RLP encoding stored as the trie value.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut list = RlpList::new();
        list.append_u64(self.nonce)
            .append_u256(self.balance)
            .append_hash(&self.storage_root)
            .append_hash(&self.code_hash);
        list.finish()
    }

    /// Decode an account from its trie value.
    ///
    /// # Errors
    ///
    /// Returns `RlpError` on malformed input.
    pub fn decode(data: &[u8]) -> Result<Self, RlpError> {
        let item = rlp::decode(data)?;
        let fields = item.as_list_of(4)?;
        Ok(Self {
            nonce: fields[0].as_u64()?,
            balance: fields[1].as_u256()?,
            storage_root: fields[2].as_hash()?,
            code_hash: fields[3].as_hash()?,
        })
    }
}

// =============================================================================
// LOGS BLOOM
// =============================================================================

/// 2048-bit bloom filter over the addresses and topics of a block's logs.
///
/// Each accrued input sets three bits, taken from the first three 16-bit
/// big-endian slices of its Keccak-256 digest, each reduced mod 2048.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bloom(#[serde_as(as = "serde_with::Bytes")] pub [u8; 256]);

impl Default for Bloom {
    fn default() -> Self {
        Self([0u8; 256])
    }
}

impl Bloom {
    /// The empty bloom.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one input into the filter.
    pub fn accrue(&mut self, input: &[u8]) {
        let digest = Hash::keccak(input);
        for i in [0usize, 2, 4] {
            let bit = (usize::from(digest.0[i] & 0x07) << 8) | usize::from(digest.0[i + 1]);
            self.0[255 - bit / 8] |= 1 << (bit % 8);
        }
    }

    /// Fold a log's address and topics into the filter.
    pub fn accrue_log(&mut self, log: &Log) {
        self.accrue(log.address.as_bytes());
        for topic in &log.topics {
            self.accrue(topic.as_bytes());
        }
    }

    /// Bloom of a slice of logs.
    #[must_use]
    pub fn from_logs(logs: &[Log]) -> Self {
        let mut bloom = Self::new();
        for log in logs {
            bloom.accrue_log(log);
        }
        bloom
    }

    /// Bitwise OR with another bloom.
    pub fn union(&mut self, other: &Bloom) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= b;
        }
    }

    /// True if every bit of `other` is set in `self`.
    #[must_use]
    pub fn contains(&self, other: &Bloom) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| a & b == *b)
    }

    /// True if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 256] {
        &self.0
    }

    /// Decode from a 256-byte field.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedFieldLength` unless exactly 256 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, RlpError> {
        if slice.len() != 256 {
            return Err(RlpError::UnexpectedFieldLength {
                expected: 256,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; 256];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }
}

impl core::fmt::Debug for Bloom {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let set = self.0.iter().map(|b| b.count_ones()).sum::<u32>();
        write!(f, "Bloom({set} bits set)")
    }
}

// =============================================================================
// LOG
// =============================================================================

/// One log record emitted by a LOG0..LOG4 opcode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Emitting contract.
    pub address: Address,
    /// Zero to four indexed topics.
    pub topics: Vec<Hash>,
    /// Unindexed payload.
    pub data: Bytes,
}

impl Log {
    /// Creates a log record.
    #[must_use]
    pub fn new(address: Address, topics: Vec<Hash>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }

    /// RLP encoding: `[address, [topics...], data]`.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut topics = RlpList::new();
        for topic in &self.topics {
            topics.append_hash(topic);
        }
        let mut list = RlpList::new();
        list.append_address(&self.address)
            .append_raw(&topics.finish())
            .append_bytes(self.data.as_slice());
        list.finish()
    }

    /// Decode a log from an RLP item.
    ///
    /// # Errors
    ///
    /// Returns `RlpError` on malformed input.
    pub fn decode_item(item: &Item<'_>) -> Result<Self, RlpError> {
        let fields = item.as_list_of(3)?;
        let topics = fields[1]
            .as_list()?
            .iter()
            .map(Item::as_hash)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            address: fields[0].as_address()?,
            topics,
            data: Bytes::from_slice(fields[2].as_bytes()?),
        })
    }
}

// =============================================================================
// RECEIPT
// =============================================================================

/// The first receipt field: a state root before Byzantium, a status bit
/// after.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptOutcome {
    /// Intermediate state root after the transaction (pre-Byzantium).
    StateRoot(Hash),
    /// Success flag (Byzantium onward).
    Status(bool),
}

impl ReceiptOutcome {
    /// True unless this is an explicit failure status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, ReceiptOutcome::Status(false))
    }
}

/// Per-transaction execution record committed under `receiptsRoot`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Envelope type byte; 0 for legacy receipts.
    pub tx_type: u8,
    /// Root or status, fork-dependent.
    pub outcome: ReceiptOutcome,
    /// Gas used by the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// Bloom over this receipt's logs.
    pub bloom: Bloom,
    /// Logs in emission order.
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Build a receipt, deriving the bloom from the logs.
    #[must_use]
    pub fn new(
        tx_type: u8,
        outcome: ReceiptOutcome,
        cumulative_gas_used: u64,
        logs: Vec<Log>,
    ) -> Self {
        let bloom = Bloom::from_logs(&logs);
        Self {
            tx_type,
            outcome,
            cumulative_gas_used,
            bloom,
            logs,
        }
    }

    /// Consensus encoding: the RLP list, wrapped in an EIP-2718 envelope
    /// for typed transactions.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut list = RlpList::new();
        match &self.outcome {
            ReceiptOutcome::StateRoot(root) => list.append_hash(root),
            ReceiptOutcome::Status(true) => list.append_u64(1),
            ReceiptOutcome::Status(false) => list.append_u64(0),
        };
        list.append_u64(self.cumulative_gas_used)
            .append_bytes(self.bloom.as_bytes());
        let mut logs = RlpList::new();
        for log in &self.logs {
            logs.append_raw(&log.encode());
        }
        list.append_raw(&logs.finish());
        let payload = list.finish();

        if self.tx_type == 0 {
            payload
        } else {
            let mut out = Vec::with_capacity(payload.len() + 1);
            out.push(self.tx_type);
            out.extend_from_slice(&payload);
            out
        }
    }

    /// Decode a receipt from its consensus encoding.
    ///
    /// # Errors
    ///
    /// Returns `RlpError` on malformed input or unknown envelope types.
    pub fn decode(data: &[u8]) -> Result<Self, RlpError> {
        let (tx_type, payload) = match data.first() {
            Some(&byte) if byte <= 0x7f => {
                if !matches!(byte, 1 | 2) {
                    return Err(RlpError::UnknownEnvelopeType(byte));
                }
                (byte, &data[1..])
            }
            Some(_) => (0, data),
            None => return Err(RlpError::UnexpectedEof),
        };

        let item = rlp::decode(payload)?;
        let fields = item.as_list_of(4)?;
        let outcome_bytes = fields[0].as_bytes()?;
        let outcome = if outcome_bytes.len() == 32 {
            ReceiptOutcome::StateRoot(fields[0].as_hash()?)
        } else {
            ReceiptOutcome::Status(fields[0].as_u64()? == 1)
        };
        let logs = fields[3]
            .as_list()?
            .iter()
            .map(Log::decode_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            tx_type,
            outcome,
            cumulative_gas_used: fields[1].as_u64()?,
            bloom: Bloom::from_slice(fields[2].as_bytes()?)?,
            logs,
        })
    }
}

// =============================================================================
// BLOCK HEADER
// =============================================================================

/// Block header. `base_fee` is present from London onward.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Hash of the parent block.
    pub parent_hash: Hash,
    /// Keccak of the RLP list of ommer headers.
    pub ommers_hash: Hash,
    /// Fee recipient.
    pub coinbase: Address,
    /// Root of the accounts trie after this block.
    pub state_root: Hash,
    /// Root of the transactions trie.
    pub transactions_root: Hash,
    /// Root of the receipts trie.
    pub receipts_root: Hash,
    /// OR of all receipt blooms.
    pub logs_bloom: Bloom,
    /// Proof-of-work difficulty.
    pub difficulty: U256,
    /// Height.
    pub number: u64,
    /// Gas ceiling for the block.
    pub gas_limit: u64,
    /// Gas consumed by all transactions.
    pub gas_used: u64,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Arbitrary sealing extra data (at most 32 bytes on mainnet).
    pub extra_data: Bytes,
    /// Proof-of-work mix digest.
    pub mix_hash: Hash,
    /// Proof-of-work nonce.
    #[serde_as(as = "serde_with::Bytes")]
    pub nonce: [u8; 8],
    /// EIP-1559 base fee, committed from London.
    pub base_fee: Option<U256>,
}

impl BlockHeader {
    /// Consensus RLP encoding.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut list = RlpList::new();
        list.append_hash(&self.parent_hash)
            .append_hash(&self.ommers_hash)
            .append_address(&self.coinbase)
            .append_hash(&self.state_root)
            .append_hash(&self.transactions_root)
            .append_hash(&self.receipts_root)
            .append_bytes(self.logs_bloom.as_bytes())
            .append_u256(self.difficulty)
            .append_u64(self.number)
            .append_u64(self.gas_limit)
            .append_u64(self.gas_used)
            .append_u64(self.timestamp)
            .append_bytes(self.extra_data.as_slice())
            .append_hash(&self.mix_hash)
            .append_bytes(&self.nonce);
        if let Some(base_fee) = self.base_fee {
            list.append_u256(base_fee);
        }
        list.finish()
    }

    /// Decode a header from bytes.
    ///
    /// # Errors
    ///
    /// Returns `RlpError` on malformed input.
    pub fn decode(data: &[u8]) -> Result<Self, RlpError> {
        Self::decode_item(&rlp::decode(data)?)
    }

    /// Decode a header from an RLP item (ommer lists decode in place).
    ///
    /// # Errors
    ///
    /// Returns `RlpError` on malformed input.
    pub fn decode_item(item: &Item<'_>) -> Result<Self, RlpError> {
        let fields = item.as_list()?;
        if fields.len() != 15 && fields.len() != 16 {
            return Err(RlpError::UnexpectedListLength {
                expected: 16,
                actual: fields.len(),
            });
        }
        let nonce_bytes = fields[14].as_bytes()?;
        if nonce_bytes.len() != 8 {
            return Err(RlpError::UnexpectedFieldLength {
                expected: 8,
                actual: nonce_bytes.len(),
            });
        }
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(nonce_bytes);

        Ok(Self {
            parent_hash: fields[0].as_hash()?,
            ommers_hash: fields[1].as_hash()?,
            coinbase: fields[2].as_address()?,
            state_root: fields[3].as_hash()?,
            transactions_root: fields[4].as_hash()?,
            receipts_root: fields[5].as_hash()?,
            logs_bloom: Bloom::from_slice(fields[6].as_bytes()?)?,
            difficulty: fields[7].as_u256()?,
            number: fields[8].as_u64()?,
            gas_limit: fields[9].as_u64()?,
            gas_used: fields[10].as_u64()?,
            timestamp: fields[11].as_u64()?,
            extra_data: Bytes::from_slice(fields[12].as_bytes()?),
            mix_hash: fields[13].as_hash()?,
            nonce,
            base_fee: if fields.len() == 16 {
                Some(fields[15].as_u256()?)
            } else {
                None
            },
        })
    }

    /// Keccak-256 of the header encoding; the block hash.
    #[must_use]
    pub fn hash(&self) -> Hash {
        Hash::keccak(&self.encode())
    }
}

// =============================================================================
// BLOCK BODY
// =============================================================================

/// Transactions and ommer headers of one block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockBody {
    /// Transactions in execution order.
    pub transactions: Vec<Transaction>,
    /// Included ommer headers.
    pub ommers: Vec<BlockHeader>,
}

impl BlockBody {
    /// Consensus RLP encoding: `[[tx...], [ommer...]]`. Typed transactions
    /// appear as opaque byte strings per EIP-2718.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut txs = RlpList::new();
        for tx in &self.transactions {
            let encoded = tx.encode();
            if tx.tx_type() == crate::transaction::TxType::Legacy {
                txs.append_raw(&encoded);
            } else {
                txs.append_bytes(&encoded);
            }
        }
        let mut ommers = RlpList::new();
        for ommer in &self.ommers {
            ommers.append_raw(&ommer.encode());
        }
        let mut list = RlpList::new();
        list.append_raw(&txs.finish()).append_raw(&ommers.finish());
        list.finish()
    }

    /// Decode a body from bytes.
    ///
    /// # Errors
    ///
    /// Returns `RlpError` on malformed input.
    pub fn decode(data: &[u8]) -> Result<Self, RlpError> {
        let item = rlp::decode(data)?;
        let fields = item.as_list_of(2)?;
        let transactions = fields[0]
            .as_list()?
            .iter()
            .map(Transaction::decode_item)
            .collect::<Result<Vec<_>, _>>()?;
        let ommers = fields[1]
            .as_list()?
            .iter()
            .map(BlockHeader::decode_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            transactions,
            ommers,
        })
    }

    /// Keccak of the RLP list of ommer headers, as committed in
    /// `ommersHash`.
    #[must_use]
    pub fn ommers_hash(&self) -> Hash {
        let mut list = RlpList::new();
        for ommer in &self.ommers {
            list.append_raw(&ommer.encode());
        }
        Hash::keccak(&list.finish())
    }
}

// =============================================================================
// TESTS
// =============================================================================
