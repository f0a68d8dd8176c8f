//! End-to-end block execution: build blocks against a genesis state, run
//! them through `persist_blocks`, and check every header commitment plus
//! atomic rejection behavior.

use ob_01_kv_store::MemoryKeyValueStore;
use ob_02_state_trie::{ordered_trie_root, AccountsCache};
use ob_03_evm::interpreter::create_address;
use ob_03_evm::{BlockEnv, NoBlockHashes};
use ob_04_block_executor::rewards::apply_rewards;
use ob_04_block_executor::{fees, process_transaction, BlockError, ChainStore};
use shared_types::{
    Address, BlockBody, BlockHeader, Bloom, Bytes, ChainConfig, Fork, Hash, LegacyTransaction,
    Transaction, TxSignature, U256,
};
use std::sync::Arc;

const ETHER: u64 = 1_000_000_000_000_000_000;
const GWEI: u64 = 1_000_000_000;

fn secret() -> [u8; 32] {
    let mut secret = [0u8; 32];
    secret[31] = 1;
    secret
}

/// Address of secret key 0x...01.
fn rich_account() -> Address {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hex::decode("7e5f4552091a69125d5dfcb7b8c2659029395bdf").unwrap());
    Address::new(bytes)
}

fn miner() -> Address {
    Address::new([0xC0; 20])
}

fn unsigned(nonce: u64, to: Option<Address>, value: u64, data: &[u8]) -> LegacyTransaction {
    LegacyTransaction {
        nonce,
        gas_price: U256::from(2 * GWEI),
        gas_limit: if to.is_some() { 90_000 } else { 200_000 },
        to,
        value: U256::from(value),
        data: Bytes::from_slice(data),
        signature: TxSignature {
            v: 0,
            r: U256::zero(),
            s: U256::zero(),
        },
    }
}

fn signed(tx: LegacyTransaction) -> Transaction {
    Transaction::Legacy(tx).sign(&secret(), Some(1)).unwrap()
}

/// Build a chain store whose genesis state funds the rich account and
/// optionally installs extra contracts.
fn bootstrap(contracts: &[(Address, &[u8])]) -> (Arc<MemoryKeyValueStore>, ChainStore) {
    let db = Arc::new(MemoryKeyValueStore::new());
    let config = ChainConfig::with_fork(Fork::London);

    let state_root = {
        let mut cache = AccountsCache::new(db.as_ref());
        cache
            .add_balance(rich_account(), U256::from(ETHER) * 1_000)
            .unwrap();
        for (address, code) in contracts {
            cache.set_code(*address, Bytes::from_slice(code)).unwrap();
        }
        cache.persist().unwrap()
    };

    let genesis = BlockHeader {
        parent_hash: Hash::ZERO,
        ommers_hash: BlockBody::default().ommers_hash(),
        coinbase: Address::ZERO,
        state_root,
        transactions_root: Hash::EMPTY_TRIE,
        receipts_root: Hash::EMPTY_TRIE,
        logs_bloom: Bloom::new(),
        difficulty: U256::from(131_072u64),
        number: 0,
        gas_limit: 30_000_000,
        gas_used: 0,
        timestamp: 1_600_000_000,
        extra_data: Bytes::new(),
        mix_hash: Hash::ZERO,
        nonce: [0u8; 8],
        base_fee: Some(U256::from(GWEI)),
    };

    let store = ChainStore::new(Arc::clone(&db), config);
    store.install_genesis(&genesis).unwrap();
    (db, store)
}

/// Dry-run a body against the parent state on a disposable transaction
/// and seal a header carrying the computed commitments.
fn seal_block(
    db: &MemoryKeyValueStore,
    config: &ChainConfig,
    parent: &BlockHeader,
    transactions: Vec<Transaction>,
    ommers: Vec<BlockHeader>,
) -> (BlockHeader, BlockBody) {
    let number = parent.number + 1;
    let fork = config.fork_at(number);
    let base_fee = fees::expected_base_fee(config, parent, number);

    let body = BlockBody {
        transactions,
        ommers,
    };

    let block_env = BlockEnv {
        number,
        timestamp: parent.timestamp + 13,
        coinbase: miner(),
        difficulty: parent.difficulty,
        gas_limit: parent.gas_limit,
        base_fee,
        chain_id: config.chain_id,
    };

    let (state_root, receipts, gas_used) = {
        let txn = db.begin_transaction();
        let mut cache = AccountsCache::at_root(&txn, parent.state_root);
        let mut receipts = Vec::new();
        let mut cumulative = 0u64;
        for tx in &body.transactions {
            let outcome =
                process_transaction(&mut cache, config, &block_env, &NoBlockHashes, tx, cumulative)
                    .expect("sealing a block from valid transactions");
            cumulative = outcome.receipt.cumulative_gas_used;
            receipts.push(outcome.receipt);
        }
        apply_rewards(&mut cache, fork, &header_shell(&block_env, parent), &body.ommers).unwrap();
        let root = cache.persist().unwrap();
        // Trie nodes are content-addressed, so committing the dry run
        // only pre-seeds nodes the real import would write anyway; the
        // canonical indices stay untouched.
        txn.commit().unwrap();
        (root, receipts, cumulative)
    };

    let mut bloom = Bloom::new();
    for receipt in &receipts {
        bloom.union(&receipt.bloom);
    }

    let header = BlockHeader {
        parent_hash: parent.hash(),
        ommers_hash: body.ommers_hash(),
        coinbase: miner(),
        state_root,
        transactions_root: ordered_trie_root(body.transactions.iter().map(Transaction::encode))
            .unwrap(),
        receipts_root: ordered_trie_root(receipts.iter().map(shared_types::Receipt::encode))
            .unwrap(),
        logs_bloom: bloom,
        difficulty: parent.difficulty,
        number,
        gas_limit: parent.gas_limit,
        gas_used,
        timestamp: parent.timestamp + 13,
        extra_data: Bytes::new(),
        mix_hash: Hash::ZERO,
        nonce: [0u8; 8],
        base_fee,
    };
    (header, body)
}

/// A header shell carrying just the fields rewards need.
fn header_shell(env: &BlockEnv, parent: &BlockHeader) -> BlockHeader {
    BlockHeader {
        parent_hash: parent.hash(),
        ommers_hash: Hash::ZERO,
        coinbase: env.coinbase,
        state_root: Hash::ZERO,
        transactions_root: Hash::ZERO,
        receipts_root: Hash::ZERO,
        logs_bloom: Bloom::new(),
        difficulty: env.difficulty,
        number: env.number,
        gas_limit: env.gas_limit,
        gas_used: 0,
        timestamp: env.timestamp,
        extra_data: Bytes::new(),
        mix_hash: Hash::ZERO,
        nonce: [0u8; 8],
        base_fee: env.base_fee,
    }
}

#[test]
fn transfer_block_updates_state_and_advances_tip() {
    let (db, store) = bootstrap(&[]);
    let genesis = store.best_header().unwrap();
    let recipient = Address::new([0x42; 20]);

    let tx = signed(unsigned(0, Some(recipient), 5 * GWEI, &[]));
    let (header, body) = seal_block(db.as_ref(), store.config(), &genesis, vec![tx], vec![]);

    store.persist_blocks(&[header.clone()], &[body]).unwrap();

    assert_eq!(store.best_header().unwrap(), header);
    assert_eq!(store.successor_header(&genesis).unwrap(), Some(header.clone()));
    assert_eq!(header.gas_used, 21_000);

    // Post-state through the committed root
    let mut state = AccountsCache::at_root(db.as_ref(), header.state_root);
    assert_eq!(state.balance(recipient).unwrap(), U256::from(5 * GWEI));
    assert_eq!(state.nonce(rich_account()).unwrap(), 1);
    // Miner earned the 2 ETH subsidy plus the tip above the base fee
    let base_fee = header.base_fee.unwrap();
    let tip = (U256::from(2 * GWEI) - base_fee) * U256::from(21_000u64);
    assert_eq!(
        state.balance(miner()).unwrap(),
        U256::from(ETHER) * 2 + tip
    );

    // Receipts are persisted and carry the status flag
    let receipts = store.receipts(&header.hash()).unwrap().unwrap();
    assert_eq!(receipts.len(), 1);
    assert!(receipts[0].outcome.is_success());
    assert_eq!(receipts[0].cumulative_gas_used, 21_000);
}

#[test]
fn create_transaction_deploys_contract() {
    let (db, store) = bootstrap(&[]);
    let genesis = store.best_header().unwrap();

    // PUSH1 1, PUSH1 0, RETURN: deploys a single zero byte of code
    let tx = signed(unsigned(0, None, 0, &[0x60, 0x01, 0x60, 0x00, 0xF3]));
    let (header, body) = seal_block(db.as_ref(), store.config(), &genesis, vec![tx], vec![]);

    // Intrinsic 53068 + execution 9 + deposit 200
    assert_eq!(header.gas_used, 53_277);
    store.persist_blocks(&[header.clone()], &[body]).unwrap();

    let created = create_address(rich_account(), 0);
    let mut state = AccountsCache::at_root(db.as_ref(), header.state_root);
    assert_eq!(state.code(created).unwrap().as_slice(), &[0x00]);
    assert_eq!(state.nonce(created).unwrap(), 1);
}

#[test]
fn log_emitting_call_commits_bloom_and_receipts() {
    let logger = Address::new([0x77; 20]);
    // LOG1 with topic 7 over empty data: PUSH1 7, PUSH1 0, PUSH1 0, LOG1
    let (db, store) = bootstrap(&[(logger, &[0x60, 0x07, 0x60, 0x00, 0x60, 0x00, 0xA1])]);
    let genesis = store.best_header().unwrap();

    let tx = signed(unsigned(0, Some(logger), 0, &[]));
    let (header, body) = seal_block(db.as_ref(), store.config(), &genesis, vec![tx], vec![]);
    store.persist_blocks(&[header.clone()], &[body]).unwrap();

    let receipts = store.receipts(&header.hash()).unwrap().unwrap();
    assert_eq!(receipts[0].logs.len(), 1);
    assert_eq!(receipts[0].logs[0].address, logger);
    assert_eq!(
        receipts[0].logs[0].topics,
        vec![Hash::new({
            let mut topic = [0u8; 32];
            topic[31] = 7;
            topic
        })]
    );

    // The header bloom covers the receipt bloom
    assert!(!header.logs_bloom.is_empty());
    assert!(header.logs_bloom.contains(&receipts[0].bloom));
}

#[test]
fn wrong_state_root_rejects_block_and_leaves_store_untouched() {
    let (db, store) = bootstrap(&[]);
    let genesis = store.best_header().unwrap();

    let tx = signed(unsigned(0, Some(Address::new([0x42; 20])), GWEI, &[]));
    let (mut header, body) = seal_block(db.as_ref(), store.config(), &genesis, vec![tx], vec![]);
    // A single flipped balance bit upstream shows up as a different root
    header.state_root = Hash::new({
        let mut bytes = *header.state_root.as_bytes();
        bytes[0] ^= 0x01;
        bytes
    });

    let before = db.content_snapshot();
    let err = store.persist_blocks(&[header], &[body]).unwrap_err();
    assert!(matches!(err, BlockError::BadStateRoot { .. }));

    // Bit-identical store, unchanged tip
    assert_eq!(db.content_snapshot(), before);
    assert_eq!(store.best_header().unwrap(), genesis);
}

#[test]
fn invalid_transaction_rejects_whole_block() {
    let (db, store) = bootstrap(&[]);
    let genesis = store.best_header().unwrap();

    // Gas limit below the 21000 intrinsic cost
    let mut tx = unsigned(0, Some(Address::new([0x42; 20])), 0, &[]);
    tx.gas_limit = 20_000;
    let tx = signed(tx);

    let body = BlockBody {
        transactions: vec![tx],
        ommers: vec![],
    };
    let header = BlockHeader {
        parent_hash: genesis.hash(),
        ommers_hash: body.ommers_hash(),
        coinbase: miner(),
        state_root: genesis.state_root,
        transactions_root: ordered_trie_root(body.transactions.iter().map(Transaction::encode))
            .unwrap(),
        receipts_root: Hash::EMPTY_TRIE,
        logs_bloom: Bloom::new(),
        difficulty: genesis.difficulty,
        number: 1,
        gas_limit: genesis.gas_limit,
        gas_used: 0,
        timestamp: genesis.timestamp + 13,
        extra_data: Bytes::new(),
        mix_hash: Hash::ZERO,
        nonce: [0u8; 8],
        base_fee: fees::expected_base_fee(store.config(), &genesis, 1),
    };

    let before = db.content_snapshot();
    let err = store.persist_blocks(&[header], &[body]).unwrap_err();
    assert!(matches!(
        err,
        BlockError::Transaction { index: 0, .. }
    ));
    assert_eq!(db.content_snapshot(), before);
}

#[test]
fn tampered_body_fails_transactions_root() {
    let (db, store) = bootstrap(&[]);
    let genesis = store.best_header().unwrap();

    let tx = signed(unsigned(0, Some(Address::new([0x42; 20])), GWEI, &[]));
    let (header, _) = seal_block(
        db.as_ref(),
        store.config(),
        &genesis,
        vec![tx],
        vec![],
    );

    // Present an empty body against the sealed header
    let err = store
        .persist_blocks(&[header], &[BlockBody::default()])
        .unwrap_err();
    assert!(matches!(err, BlockError::BadTransactionsRoot { .. }));
}

#[test]
fn ommer_inclusion_pays_both_authors() {
    let (db, store) = bootstrap(&[]);
    let genesis = store.best_header().unwrap();
    let ommer_author = Address::new([0xAB; 20]);

    // An uncle one generation back
    let ommer = BlockHeader {
        parent_hash: genesis.parent_hash,
        ommers_hash: BlockBody::default().ommers_hash(),
        coinbase: ommer_author,
        state_root: genesis.state_root,
        transactions_root: Hash::EMPTY_TRIE,
        receipts_root: Hash::EMPTY_TRIE,
        logs_bloom: Bloom::new(),
        difficulty: genesis.difficulty,
        number: 0,
        gas_limit: genesis.gas_limit,
        gas_used: 0,
        timestamp: genesis.timestamp + 1,
        extra_data: Bytes::from_slice(b"uncle"),
        mix_hash: Hash::ZERO,
        nonce: [0u8; 8],
        base_fee: Some(U256::from(GWEI)),
    };

    let (header, body) = seal_block(
        db.as_ref(),
        store.config(),
        &genesis,
        vec![],
        vec![ommer],
    );
    store.persist_blocks(&[header.clone()], &[body]).unwrap();

    let mut state = AccountsCache::at_root(db.as_ref(), header.state_root);
    let base = U256::from(ETHER) * 2;
    // Miner: base + base/32 inclusion bonus
    assert_eq!(state.balance(miner()).unwrap(), base + base / 32);
    // Uncle author: base * (8 - 1) / 8
    assert_eq!(
        state.balance(ommer_author).unwrap(),
        base * U256::from(7u64) / U256::from(8u64)
    );
}

#[test]
fn two_block_batch_applies_in_order() {
    let (db, store) = bootstrap(&[]);
    let genesis = store.best_header().unwrap();
    let recipient = Address::new([0x42; 20]);

    let tx1 = signed(unsigned(0, Some(recipient), GWEI, &[]));
    let (header1, body1) = seal_block(db.as_ref(), store.config(), &genesis, vec![tx1], vec![]);

    // The second block spends the incremented nonce against block one's
    // state.
    let tx2 = signed(unsigned(1, Some(recipient), GWEI, &[]));
    let (header2, body2) = seal_block(db.as_ref(), store.config(), &header1, vec![tx2], vec![]);

    store
        .persist_blocks(&[header1, header2.clone()], &[body1, body2])
        .unwrap();

    assert_eq!(store.best_header().unwrap(), header2);
    let mut state = AccountsCache::at_root(db.as_ref(), header2.state_root);
    assert_eq!(state.balance(recipient).unwrap(), U256::from(2 * GWEI));
    assert_eq!(state.nonce(rich_account()).unwrap(), 2);
}
