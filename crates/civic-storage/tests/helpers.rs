#![allow(dead_code)]

use std::fs;

use civic_core::{mine, Amount, Block, BlockStore, Difficulty, Transaction, TransactionType};
use civic_storage::SledStore;
use rand::Rng;
use tempfile::{tempdir, TempDir};

pub fn create_temp_dir() -> (TempDir, std::path::PathBuf) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (temp_dir, db_path)
}

pub fn create_temp_store() -> (TempDir, SledStore) {
    let (temp_dir, db_path) = create_temp_dir();
    (
        temp_dir,
        SledStore::open(&db_path).expect("Failed to open SledStore"),
    )
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    // Verify the directory is removed
    assert!(!db_path.exists(), "Database directory should be removed");
}

pub fn random_transaction(i: u64) -> Transaction {
    let mut rng = rand::thread_rng();
    let kinds = [
        TransactionType::TaxPayment,
        TransactionType::Donation,
        TransactionType::Crowdfunding,
    ];
    let kind = kinds[rng.gen_range(0..kinds.len())];
    let tx = Transaction::new(
        format!("TXN-TEST-{i}"),
        format!("user-{}", rng.gen_range(0..100)),
        kind,
        Amount::from_minor_units(rng.gen_range(0..10_000_000)),
    );
    if kind == TransactionType::Crowdfunding {
        tx.with_campaign(format!("campaign-{}", rng.gen_range(0..10)))
    } else {
        tx
    }
}

/// Seals the next block on top of `tip` without proof-of-work.
pub fn next_block(tip: Option<&Block>, i: u64) -> Block {
    let (index, prev) = Block::next_position(tip);
    mine(
        index,
        1_700_000_000_000 + i,
        random_transaction(i),
        prev,
        Difficulty::new(0).unwrap(),
    )
    .expect("difficulty 0 always mines")
}

/// Appends `n` linked blocks and returns them in order.
pub fn fill_store(store: &SledStore, n: u64) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for i in 0..n {
        let block = next_block(blocks.last(), i);
        store.append(&block).expect("append");
        blocks.push(block);
    }
    blocks
}
