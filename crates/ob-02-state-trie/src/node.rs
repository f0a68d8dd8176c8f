//! # Trie Nodes
//!
//! The yellow paper's four node kinds and their RLP forms. A child
//! reference is either the Keccak of the child's encoding (stored under
//! that digest in the KV store) or, when the encoding is shorter than 32
//! bytes, the encoding itself embedded in the parent.

use crate::errors::TrieError;
use crate::nibbles::Nibbles;
use ob_01_kv_store::KeyValue;
use shared_types::rlp::{self, Item, RlpList};
use shared_types::{Hash, RlpError};

/// Reference to a child node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Link {
    /// No child.
    Empty,
    /// Child stored in the KV store under this digest.
    Hash(Hash),
    /// Child held in memory; either dirty since the last commit or small
    /// enough to embed inline.
    Owned(Box<Node>),
}

impl Link {
    /// True for the empty reference.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Link::Empty)
    }

    fn decode_item(item: &Item<'_>) -> Result<Self, TrieError> {
        match item {
            Item::Bytes(bytes) if bytes.is_empty() => Ok(Link::Empty),
            Item::Bytes(bytes) => {
                let hash = Hash::from_slice(bytes).ok_or(TrieError::CorruptNode(
                    RlpError::UnexpectedFieldLength {
                        expected: 32,
                        actual: bytes.len(),
                    },
                ))?;
                Ok(Link::Hash(hash))
            }
            Item::List(_) => Ok(Link::Owned(Box::new(Node::decode_item(item)?))),
        }
    }
}

/// One trie node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Terminal node: remaining path and the stored value.
    Leaf {
        /// Path from the parent to this value.
        path: Nibbles,
        /// Stored bytes (RLP-encoded account or storage word).
        value: Vec<u8>,
    },
    /// Shared-prefix shortcut to a single child.
    Extension {
        /// Shared path segment.
        path: Nibbles,
        /// The only child.
        child: Link,
    },
    /// Sixteen-way fan-out with an optional value terminating here.
    Branch {
        /// One child per nibble.
        children: Box<[Link; 16]>,
        /// Value of a key ending at this branch.
        value: Option<Vec<u8>>,
    },
}

impl Node {
    /// A branch with no children and no value.
    #[must_use]
    pub fn empty_branch() -> Self {
        Node::Branch {
            children: Box::new(std::array::from_fn(|_| Link::Empty)),
            value: None,
        }
    }

    /// Decode a node from its full RLP encoding.
    ///
    /// # Errors
    ///
    /// Returns `TrieError::CorruptNode` on malformed bytes.
    pub fn decode(data: &[u8]) -> Result<Self, TrieError> {
        Self::decode_item(&rlp::decode(data).map_err(TrieError::CorruptNode)?)
    }

    /// Decode a node from an RLP item (embedded children decode in place).
    ///
    /// # Errors
    ///
    /// Returns `TrieError::CorruptNode` on malformed structure.
    pub fn decode_item(item: &Item<'_>) -> Result<Self, TrieError> {
        let items = item.as_list().map_err(TrieError::CorruptNode)?;
        match items.len() {
            2 => {
                let encoded_path = items[0].as_bytes().map_err(TrieError::CorruptNode)?;
                let (path, is_leaf) = Nibbles::decode_hex_prefix(encoded_path);
                if is_leaf {
                    Ok(Node::Leaf {
                        path,
                        value: items[1].as_bytes().map_err(TrieError::CorruptNode)?.to_vec(),
                    })
                } else {
                    Ok(Node::Extension {
                        path,
                        child: Link::decode_item(&items[1])?,
                    })
                }
            }
            17 => {
                let mut children: [Link; 16] = std::array::from_fn(|_| Link::Empty);
                for (i, child) in children.iter_mut().enumerate() {
                    *child = Link::decode_item(&items[i])?;
                }
                let value_bytes = items[16].as_bytes().map_err(TrieError::CorruptNode)?;
                Ok(Node::Branch {
                    children: Box::new(children),
                    value: if value_bytes.is_empty() {
                        None
                    } else {
                        Some(value_bytes.to_vec())
                    },
                })
            }
            other => Err(TrieError::CorruptNode(RlpError::UnexpectedListLength {
                expected: 17,
                actual: other,
            })),
        }
    }

    /// Full RLP encoding, committing dirty descendants to `db` first.
    ///
    /// # Errors
    ///
    /// Returns `TrieError` if a child write fails.
    pub fn encode(&mut self, db: &dyn KeyValue) -> Result<Vec<u8>, TrieError> {
        match self {
            Node::Leaf { path, value } => {
                let mut list = RlpList::new();
                list.append_bytes(&path.encode_hex_prefix(true))
                    .append_bytes(value);
                Ok(list.finish())
            }
            Node::Extension { path, child } => {
                let child_ref = commit_link(child, db)?;
                let mut list = RlpList::new();
                list.append_bytes(&path.encode_hex_prefix(false))
                    .append_raw(&child_ref);
                Ok(list.finish())
            }
            Node::Branch { children, value } => {
                let mut list = RlpList::new();
                for child in children.iter_mut() {
                    let child_ref = commit_link(child, db)?;
                    list.append_raw(&child_ref);
                }
                match value {
                    Some(value) => list.append_bytes(value),
                    None => list.append_bytes(&[]),
                };
                Ok(list.finish())
            }
        }
    }
}

/// Commit a link, returning its reference form for embedding in the
/// parent: the RLP of its hash, its raw encoding when under 32 bytes, or
/// the empty string.
pub(crate) fn commit_link(link: &mut Link, db: &dyn KeyValue) -> Result<Vec<u8>, TrieError> {
    match link {
        Link::Empty => Ok(vec![0x80]),
        Link::Hash(hash) => Ok(rlp::encode_bytes(hash.as_bytes())),
        Link::Owned(node) => {
            let encoded = node.encode(db)?;
            if encoded.len() < 32 {
                Ok(encoded)
            } else {
                let hash = Hash::keccak(&encoded);
                db.put(hash.as_bytes(), &encoded)?;
                *link = Link::Hash(hash);
                Ok(rlp::encode_bytes(hash.as_bytes()))
            }
        }
    }
}
