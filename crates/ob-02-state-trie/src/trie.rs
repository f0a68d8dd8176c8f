//! # Hexary Merkle-Patricia Trie
//!
//! Get/insert/remove over the KV port with lazy root commitment: mutations
//! build an in-memory subtree of owned nodes, and `root_hash` writes the
//! dirty nodes out and collapses them back to hash references.

use crate::errors::TrieError;
use crate::nibbles::Nibbles;
use crate::node::{Link, Node};
use ob_01_kv_store::{KeyValue, MemoryKeyValueStore};
use shared_types::rlp;
use shared_types::Hash;

/// A Merkle-Patricia trie rooted in a KV store.
pub struct Trie<'db> {
    db: &'db dyn KeyValue,
    root: Link,
}

impl<'db> Trie<'db> {
    /// An empty trie.
    #[must_use]
    pub fn new(db: &'db dyn KeyValue) -> Self {
        Self {
            db,
            root: Link::Empty,
        }
    }

    /// A trie rooted at a previously committed root hash.
    #[must_use]
    pub fn at_root(db: &'db dyn KeyValue, root: Hash) -> Self {
        let root = if root == Hash::EMPTY_TRIE {
            Link::Empty
        } else {
            Link::Hash(root)
        };
        Self { db, root }
    }

    /// Look up the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `TrieError` on store failures or corrupt nodes.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        let path = Nibbles::from_bytes(key);
        self.lookup(&self.root, &path, 0)
    }

    /// Insert `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `TrieError` on store failures or corrupt nodes.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), TrieError> {
        let path = Nibbles::from_bytes(key);
        let root = std::mem::replace(&mut self.root, Link::Empty);
        let node = self.insert_at(root, path, value)?;
        self.root = Link::Owned(Box::new(node));
        Ok(())
    }

    /// Remove `key`. Removing an absent key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `TrieError` on store failures or corrupt nodes.
    pub fn remove(&mut self, key: &[u8]) -> Result<(), TrieError> {
        let path = Nibbles::from_bytes(key);
        let root = std::mem::replace(&mut self.root, Link::Empty);
        self.root = match self.remove_at(root, path)? {
            Some(node) => Link::Owned(Box::new(node)),
            None => Link::Empty,
        };
        Ok(())
    }

    /// Commit dirty nodes to the store and return the root hash. The root
    /// node is always stored under its digest, regardless of size.
    ///
    /// # Errors
    ///
    /// Returns `TrieError` on store failures.
    pub fn root_hash(&mut self) -> Result<Hash, TrieError> {
        match &mut self.root {
            Link::Empty => Ok(Hash::EMPTY_TRIE),
            Link::Hash(hash) => Ok(*hash),
            Link::Owned(node) => {
                let encoded = node.encode(self.db)?;
                let hash = Hash::keccak(&encoded);
                self.db.put(hash.as_bytes(), &encoded)?;
                self.root = Link::Hash(hash);
                Ok(hash)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    fn load(&self, hash: &Hash) -> Result<Node, TrieError> {
        let bytes = self
            .db
            .get(hash.as_bytes())?
            .ok_or(TrieError::MissingNode(*hash))?;
        Node::decode(&bytes)
    }

    /// Take ownership of the node behind a link, loading it if necessary.
    fn resolve(&self, link: Link) -> Result<Option<Node>, TrieError> {
        match link {
            Link::Empty => Ok(None),
            Link::Owned(node) => Ok(Some(*node)),
            Link::Hash(hash) => Ok(Some(self.load(&hash)?)),
        }
    }

    fn lookup(
        &self,
        link: &Link,
        path: &Nibbles,
        depth: usize,
    ) -> Result<Option<Vec<u8>>, TrieError> {
        let loaded;
        let node = match link {
            Link::Empty => return Ok(None),
            Link::Owned(node) => node.as_ref(),
            Link::Hash(hash) => {
                loaded = self.load(hash)?;
                &loaded
            }
        };

        match node {
            Node::Leaf {
                path: leaf_path,
                value,
            } => {
                if path.suffix(depth) == *leaf_path {
                    Ok(Some(value.clone()))
                } else {
                    Ok(None)
                }
            }
            Node::Extension {
                path: ext_path,
                child,
            } => {
                if path.suffix(depth).starts_with(ext_path) {
                    self.lookup(child, path, depth + ext_path.len())
                } else {
                    Ok(None)
                }
            }
            Node::Branch { children, value } => {
                if depth == path.len() {
                    Ok(value.clone())
                } else {
                    self.lookup(&children[path.at(depth) as usize], path, depth + 1)
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------------

    fn insert_at(&self, link: Link, path: Nibbles, value: Vec<u8>) -> Result<Node, TrieError> {
        let Some(node) = self.resolve(link)? else {
            return Ok(Node::Leaf { path, value });
        };

        match node {
            Node::Leaf {
                path: leaf_path,
                value: leaf_value,
            } => {
                if leaf_path == path {
                    return Ok(Node::Leaf { path, value });
                }
                let common = leaf_path.common_prefix_len(&path);
                let mut children: [Link; 16] = std::array::from_fn(|_| Link::Empty);
                let mut branch_value = None;

                if leaf_path.len() == common {
                    branch_value = Some(leaf_value);
                } else {
                    children[leaf_path.at(common) as usize] = Link::Owned(Box::new(Node::Leaf {
                        path: leaf_path.suffix(common + 1),
                        value: leaf_value,
                    }));
                }
                if path.len() == common {
                    branch_value = Some(value);
                } else {
                    children[path.at(common) as usize] = Link::Owned(Box::new(Node::Leaf {
                        path: path.suffix(common + 1),
                        value,
                    }));
                }

                let branch = Node::Branch {
                    children: Box::new(children),
                    value: branch_value,
                };
                Ok(wrap_in_extension(path.prefix(common), branch))
            }

            Node::Extension {
                path: ext_path,
                child,
            } => {
                let common = ext_path.common_prefix_len(&path);
                if common == ext_path.len() {
                    let new_child = self.insert_at(child, path.suffix(common), value)?;
                    return Ok(Node::Extension {
                        path: ext_path,
                        child: Link::Owned(Box::new(new_child)),
                    });
                }

                // The extension splits at the divergence point.
                let mut children: [Link; 16] = std::array::from_fn(|_| Link::Empty);
                let mut branch_value = None;

                children[ext_path.at(common) as usize] = if ext_path.len() == common + 1 {
                    child
                } else {
                    Link::Owned(Box::new(Node::Extension {
                        path: ext_path.suffix(common + 1),
                        child,
                    }))
                };
                if path.len() == common {
                    branch_value = Some(value);
                } else {
                    children[path.at(common) as usize] = Link::Owned(Box::new(Node::Leaf {
                        path: path.suffix(common + 1),
                        value,
                    }));
                }

                let branch = Node::Branch {
                    children: Box::new(children),
                    value: branch_value,
                };
                Ok(wrap_in_extension(path.prefix(common), branch))
            }

            Node::Branch {
                mut children,
                value: branch_value,
            } => {
                if path.is_empty() {
                    return Ok(Node::Branch {
                        children,
                        value: Some(value),
                    });
                }
                let index = path.at(0) as usize;
                let child = std::mem::replace(&mut children[index], Link::Empty);
                let new_child = self.insert_at(child, path.suffix(1), value)?;
                children[index] = Link::Owned(Box::new(new_child));
                Ok(Node::Branch {
                    children,
                    value: branch_value,
                })
            }
        }
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    fn remove_at(&self, link: Link, path: Nibbles) -> Result<Option<Node>, TrieError> {
        let Some(node) = self.resolve(link)? else {
            return Ok(None);
        };

        match node {
            Node::Leaf {
                path: leaf_path,
                value,
            } => {
                if leaf_path == path {
                    Ok(None)
                } else {
                    Ok(Some(Node::Leaf {
                        path: leaf_path,
                        value,
                    }))
                }
            }

            Node::Extension {
                path: ext_path,
                child,
            } => {
                if !path.starts_with(&ext_path) {
                    return Ok(Some(Node::Extension {
                        path: ext_path,
                        child,
                    }));
                }
                match self.remove_at(child, path.suffix(ext_path.len()))? {
                    None => Ok(None),
                    // An extension absorbs a short-path child rather than
                    // pointing at it.
                    Some(Node::Leaf { path, value }) => Ok(Some(Node::Leaf {
                        path: ext_path.join(&path),
                        value,
                    })),
                    Some(Node::Extension { path, child }) => Ok(Some(Node::Extension {
                        path: ext_path.join(&path),
                        child,
                    })),
                    Some(branch) => Ok(Some(Node::Extension {
                        path: ext_path,
                        child: Link::Owned(Box::new(branch)),
                    })),
                }
            }

            Node::Branch {
                mut children,
                mut value,
            } => {
                if path.is_empty() {
                    value = None;
                } else {
                    let index = path.at(0) as usize;
                    let child = std::mem::replace(&mut children[index], Link::Empty);
                    if let Some(node) = self.remove_at(child, path.suffix(1))? {
                        children[index] = Link::Owned(Box::new(node));
                    }
                }
                self.normalize_branch(*children, value)
            }
        }
    }

    /// Collapse a branch left with fewer than two live slots.
    fn normalize_branch(
        &self,
        mut children: [Link; 16],
        value: Option<Vec<u8>>,
    ) -> Result<Option<Node>, TrieError> {
        let live: Vec<usize> = (0..16).filter(|&i| !children[i].is_empty()).collect();

        match (live.len(), value) {
            (0, None) => Ok(None),
            (0, Some(value)) => Ok(Some(Node::Leaf {
                path: Nibbles::empty(),
                value,
            })),
            (1, None) => {
                let index = live[0];
                let child = std::mem::replace(&mut children[index], Link::Empty);
                let nibble = index as u8;
                match self.resolve(child)? {
                    Some(Node::Leaf { path, value }) => Ok(Some(Node::Leaf {
                        path: path.with_prefix_nibble(nibble),
                        value,
                    })),
                    Some(Node::Extension { path, child }) => Ok(Some(Node::Extension {
                        path: path.with_prefix_nibble(nibble),
                        child,
                    })),
                    Some(branch) => Ok(Some(Node::Extension {
                        path: Nibbles(vec![nibble]),
                        child: Link::Owned(Box::new(branch)),
                    })),
                    None => Ok(None),
                }
            }
            (_, value) => Ok(Some(Node::Branch {
                children: Box::new(children),
                value,
            })),
        }
    }
}

fn wrap_in_extension(prefix: Nibbles, branch: Node) -> Node {
    if prefix.is_empty() {
        branch
    } else {
        Node::Extension {
            path: prefix,
            child: Link::Owned(Box::new(branch)),
        }
    }
}

// =============================================================================
// SECURE TRIE
// =============================================================================

/// A trie whose keys are keccaked before descent; required for the
/// accounts trie and every storage trie.
pub struct SecureTrie<'db> {
    inner: Trie<'db>,
}

impl<'db> SecureTrie<'db> {
    /// An empty secure trie.
    #[must_use]
    pub fn new(db: &'db dyn KeyValue) -> Self {
        Self {
            inner: Trie::new(db),
        }
    }

    /// A secure trie rooted at a previously committed root hash.
    #[must_use]
    pub fn at_root(db: &'db dyn KeyValue, root: Hash) -> Self {
        Self {
            inner: Trie::at_root(db, root),
        }
    }

    /// Look up the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `TrieError` on store failures or corrupt nodes.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        self.inner.get(Hash::keccak(key).as_bytes())
    }

    /// Insert `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `TrieError` on store failures or corrupt nodes.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), TrieError> {
        self.inner.insert(Hash::keccak(key).as_bytes(), value)
    }

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns `TrieError` on store failures or corrupt nodes.
    pub fn remove(&mut self, key: &[u8]) -> Result<(), TrieError> {
        self.inner.remove(Hash::keccak(key).as_bytes())
    }

    /// Commit and return the root hash.
    ///
    /// # Errors
    ///
    /// Returns `TrieError` on store failures.
    pub fn root_hash(&mut self) -> Result<Hash, TrieError> {
        self.inner.root_hash()
    }
}

// =============================================================================
// ORDERED TRIE ROOT
// =============================================================================

/// Root of a trie keyed by RLP-encoded position, as committed under
/// `transactionsRoot` and `receiptsRoot`.
///
/// # Errors
///
/// Returns `TrieError` if the scratch store fails.
pub fn ordered_trie_root<I>(items: I) -> Result<Hash, TrieError>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    let scratch = MemoryKeyValueStore::new();
    let mut trie = Trie::new(&scratch);
    for (index, item) in items.into_iter().enumerate() {
        trie.insert(&rlp::encode_u64(index as u64), item)?;
    }
    trie.root_hash()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_empty_root() {
        let db = MemoryKeyValueStore::new();
        let mut trie = Trie::new(&db);
        assert_eq!(trie.root_hash().unwrap(), Hash::EMPTY_TRIE);
    }

    #[test]
    fn test_insert_get_roundtrip() {
        let db = MemoryKeyValueStore::new();
        let mut trie = Trie::new(&db);
        trie.insert(b"key", b"value".to_vec()).unwrap();
        trie.root_hash().unwrap();
        assert_eq!(trie.get(b"key").unwrap(), Some(b"value".to_vec()));
        assert_eq!(trie.get(b"other").unwrap(), None);
    }

    #[test]
    fn test_known_root_dogs() {
        // Vector from the canonical trie test suite.
        let db = MemoryKeyValueStore::new();
        let mut trie = Trie::new(&db);
        trie.insert(b"doe", b"reindeer".to_vec()).unwrap();
        trie.insert(b"dog", b"puppy".to_vec()).unwrap();
        trie.insert(b"dogglesworth", b"cat".to_vec()).unwrap();
        assert_eq!(
            hex::encode(trie.root_hash().unwrap().as_bytes()),
            "8aad789dff2f538bca5d8ea56e8abe10f4c7ba3a5dea95fea4cd6e7c3a1168d3"
        );
    }

    #[test]
    fn test_known_root_branch_value() {
        // Exercises a value terminating at a branch ("do" under "dog").
        let db = MemoryKeyValueStore::new();
        let mut trie = Trie::new(&db);
        trie.insert(b"do", b"verb".to_vec()).unwrap();
        trie.insert(b"dog", b"puppy".to_vec()).unwrap();
        trie.insert(b"doge", b"coin".to_vec()).unwrap();
        trie.insert(b"horse", b"stallion".to_vec()).unwrap();
        assert_eq!(
            hex::encode(trie.root_hash().unwrap().as_bytes()),
            "5991bb8c6514148a29db676a14ac506cd2cd5775ace63c30a4fe457715e9ac84"
        );
    }

    #[test]
    fn test_insertion_order_independence() {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = vec![
            (b"abc".to_vec(), b"1".to_vec()),
            (b"abd".to_vec(), b"2".to_vec()),
            (b"b".to_vec(), b"3".to_vec()),
            (b"ba".to_vec(), b"4".to_vec()),
            (b"".to_vec(), b"5".to_vec()),
        ];

        let db1 = MemoryKeyValueStore::new();
        let mut forward = Trie::new(&db1);
        for (key, value) in &entries {
            forward.insert(key, value.clone()).unwrap();
        }

        let db2 = MemoryKeyValueStore::new();
        let mut reverse = Trie::new(&db2);
        for (key, value) in entries.iter().rev() {
            reverse.insert(key, value.clone()).unwrap();
        }

        assert_eq!(forward.root_hash().unwrap(), reverse.root_hash().unwrap());
    }

    #[test]
    fn test_overwrite_value() {
        let db = MemoryKeyValueStore::new();
        let mut trie = Trie::new(&db);
        trie.insert(b"key", b"old".to_vec()).unwrap();
        let old_root = trie.root_hash().unwrap();
        trie.insert(b"key", b"new".to_vec()).unwrap();
        assert_ne!(trie.root_hash().unwrap(), old_root);
        assert_eq!(trie.get(b"key").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_remove_restores_previous_root() {
        let db = MemoryKeyValueStore::new();
        let mut trie = Trie::new(&db);
        trie.insert(b"doe", b"reindeer".to_vec()).unwrap();
        trie.insert(b"dog", b"puppy".to_vec()).unwrap();
        let before = trie.root_hash().unwrap();

        trie.insert(b"dogglesworth", b"cat".to_vec()).unwrap();
        trie.remove(b"dogglesworth").unwrap();
        assert_eq!(trie.root_hash().unwrap(), before);

        trie.remove(b"doe").unwrap();
        trie.remove(b"dog").unwrap();
        assert_eq!(trie.root_hash().unwrap(), Hash::EMPTY_TRIE);
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let db = MemoryKeyValueStore::new();
        let mut trie = Trie::new(&db);
        trie.insert(b"present", b"x".to_vec()).unwrap();
        let root = trie.root_hash().unwrap();
        trie.remove(b"absent").unwrap();
        assert_eq!(trie.root_hash().unwrap(), root);
    }

    #[test]
    fn test_reopen_at_root() {
        let db = MemoryKeyValueStore::new();
        let root = {
            let mut trie = Trie::new(&db);
            trie.insert(b"persisted", b"value".to_vec()).unwrap();
            trie.insert(b"another", b"entry".to_vec()).unwrap();
            trie.root_hash().unwrap()
        };

        let reopened = Trie::at_root(&db, root);
        assert_eq!(reopened.get(b"persisted").unwrap(), Some(b"value".to_vec()));
        assert_eq!(reopened.get(b"another").unwrap(), Some(b"entry".to_vec()));
    }

    #[test]
    fn test_randomized_roundtrip() {
        let mut rng = StdRng::seed_from_u64(0x0b51d1a);
        let db = MemoryKeyValueStore::new();
        let mut trie = Trie::new(&db);
        let mut reference = std::collections::HashMap::new();

        for _ in 0..200 {
            let key: [u8; 32] = rng.gen();
            let value: [u8; 32] = rng.gen();
            trie.insert(&key, value.to_vec()).unwrap();
            reference.insert(key, value.to_vec());
        }
        trie.root_hash().unwrap();

        for (key, value) in &reference {
            assert_eq!(trie.get(key).unwrap().as_ref(), Some(value));
        }

        // Delete half, verify the rest still resolves
        let keys: Vec<_> = reference.keys().copied().collect();
        for key in keys.iter().take(100) {
            trie.remove(key).unwrap();
            reference.remove(key);
        }
        trie.root_hash().unwrap();
        for (key, value) in &reference {
            assert_eq!(trie.get(key).unwrap().as_ref(), Some(value));
        }
    }

    #[test]
    fn test_secure_trie_hashes_keys() {
        let db = MemoryKeyValueStore::new();
        let mut secure = SecureTrie::new(&db);
        secure.insert(b"account", b"state".to_vec()).unwrap();
        let root = secure.root_hash().unwrap();

        // The plain trie sees the hashed key, not the raw one
        let plain = Trie::at_root(&db, root);
        assert_eq!(plain.get(b"account").unwrap(), None);
        assert_eq!(
            plain.get(Hash::keccak(b"account").as_bytes()).unwrap(),
            Some(b"state".to_vec())
        );
        assert_eq!(secure.get(b"account").unwrap(), Some(b"state".to_vec()));
    }

    #[test]
    fn test_ordered_trie_root_empty() {
        assert_eq!(ordered_trie_root(vec![]).unwrap(), Hash::EMPTY_TRIE);
    }

    #[test]
    fn test_ordered_trie_root_is_positional() {
        let a = ordered_trie_root(vec![b"first".to_vec(), b"second".to_vec()]).unwrap();
        let b = ordered_trie_root(vec![b"second".to_vec(), b"first".to_vec()]).unwrap();
        assert_ne!(a, b);
    }
}
