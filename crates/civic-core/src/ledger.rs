//! The ledger service: mining new blocks onto a store, auditing the stored
//! chain, and reporting over it.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::block::Block;
use crate::config::LedgerConfig;
use crate::constants::MAX_BLOCKS_PER_REQUEST;
use crate::error::Result;
use crate::hash::Hash;
use crate::pow::{CancelToken, Difficulty, Miner};
use crate::stats::{compute_stats, BlockFilter, Stats};
use crate::store::{BlockStore, VerificationRecord};
use crate::transaction::Transaction;
use crate::txid::{self, now_millis};
use crate::verify::{verify_chain, ChainReport};

/// A verification run together with the record persisted for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub record: VerificationRecord,
    pub report: ChainReport,
}

pub struct Ledger<S: BlockStore> {
    store: Arc<S>,
    config: LedgerConfig,
    miner: Miner,
    /// Held from reading the tip until the new block is appended, so only one
    /// block is mined per chain at a time.
    writer: Mutex<()>,
}

impl<S: BlockStore> Ledger<S> {
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        let miner = Miner::new(&config);
        Self {
            store,
            config,
            miner,
            writer: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn difficulty(&self) -> Difficulty {
        self.config.difficulty
    }

    /// Cancelling aborts in-flight and future mining on this ledger until reset.
    pub fn cancel_token(&self) -> CancelToken {
        self.miner.cancel_token()
    }

    /// Validates and mines `data` at the given position. Nothing is stored.
    pub fn create_block(&self, data: Transaction, previous_hash: Hash, index: u64) -> Result<Block> {
        data.validate()?;
        self.miner.mine(index, now_millis(), data, previous_hash)
    }

    /// Mines `data` on top of the current tip and appends it.
    pub fn create_and_append_block(&self, data: Transaction) -> Result<Block> {
        data.validate()?;

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let tip = self.store.tip()?;
        let (index, previous_hash) = Block::next_position(tip.as_ref());
        let timestamp = tip.map_or(0, |t| t.timestamp).max(now_millis());

        let block = self.miner.mine(index, timestamp, data, previous_hash)?;
        self.store.append(&block)?;
        info!(
            index,
            hash = %block.hash_hex(),
            transaction_id = %block.data.transaction_id,
            "block appended"
        );
        Ok(block)
    }

    pub fn verify_stored_chain(&self) -> Result<ChainReport> {
        let blocks = self.store.list_ordered_by_index(None, false)?;
        Ok(verify_chain(&blocks, self.difficulty()))
    }

    /// Verifies the stored chain and persists a record of the outcome.
    pub fn audit_chain(&self, verified_by: Option<&str>) -> Result<Audit> {
        let report = self.verify_stored_chain()?;
        let record = VerificationRecord {
            verification_id: txid::generate_verification_id(),
            blocks_verified: report.blocks_verified as u64,
            is_valid: report.is_valid,
            invalid_indices: report.invalid_indices.clone(),
            verified_by: verified_by.map(str::to_string),
            verified_at: now_millis(),
        };
        self.store.record_verification(&record)?;
        info!(
            verification_id = %record.verification_id,
            is_valid = record.is_valid,
            blocks = record.blocks_verified,
            "chain audit recorded"
        );
        Ok(Audit { record, report })
    }

    pub fn verifications(&self, limit: usize) -> Result<Vec<VerificationRecord>> {
        Ok(self
            .store
            .list_verifications(Some(limit.min(MAX_BLOCKS_PER_REQUEST)))?)
    }

    pub fn stats(&self) -> Result<Stats> {
        let blocks = self.store.list_ordered_by_index(None, false)?;
        compute_stats(&blocks, self.difficulty())
    }

    pub fn tip(&self) -> Result<Option<Block>> {
        Ok(self.store.tip()?)
    }

    pub fn block(&self, index: u64) -> Result<Option<Block>> {
        Ok(self.store.get_block(index)?)
    }

    /// Newest first, capped at `MAX_BLOCKS_PER_REQUEST`.
    pub fn recent_blocks(&self, limit: usize) -> Result<Vec<Block>> {
        Ok(self
            .store
            .list_ordered_by_index(Some(limit.min(MAX_BLOCKS_PER_REQUEST)), true)?)
    }

    /// Newest first matches of `filter`, capped at `MAX_BLOCKS_PER_REQUEST`.
    pub fn search_blocks(&self, filter: &BlockFilter, limit: usize) -> Result<Vec<Block>> {
        if filter.is_empty() {
            return self.recent_blocks(limit);
        }
        let limit = limit.min(MAX_BLOCKS_PER_REQUEST);
        Ok(self
            .store
            .list_ordered_by_index(None, true)?
            .into_iter()
            .filter(|b| filter.matches(b))
            .take(limit)
            .collect())
    }

    pub fn generate_transaction_id(&self) -> String {
        txid::generate_transaction_id()
    }
}
