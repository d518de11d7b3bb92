use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::block::Block;
use crate::error::StoreError;

/// Outcome of one audit of the stored chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub verification_id: String,
    pub blocks_verified: u64,
    pub is_valid: bool,
    pub invalid_indices: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub verified_at: u64,
}

/// Persistence contract the ledger runs against.
/// This lives in `civic-core` so storage crates depend on the core, not the other way round.
///
/// `append` must be atomic with respect to other appends: it rejects a block
/// whose index is not exactly one past the tip, or whose `previous_hash` is
/// not the tip's hash.
pub trait BlockStore: Send + Sync {
    fn append(&self, block: &Block) -> Result<(), StoreError>;

    /// Blocks by index, ascending unless `descending`; at most `limit` of them.
    fn list_ordered_by_index(
        &self,
        limit: Option<usize>,
        descending: bool,
    ) -> Result<Vec<Block>, StoreError>;

    fn get_block(&self, index: u64) -> Result<Option<Block>, StoreError>;

    fn tip(&self) -> Result<Option<Block>, StoreError>;

    fn block_count(&self) -> Result<u64, StoreError>;

    fn record_verification(&self, record: &VerificationRecord) -> Result<(), StoreError>;

    /// Newest first.
    fn list_verifications(&self, limit: Option<usize>)
        -> Result<Vec<VerificationRecord>, StoreError>;
}

/// The append rule shared by every store.
pub fn check_append(tip: Option<&Block>, block: &Block) -> Result<(), StoreError> {
    let (expected_index, expected_prev) = Block::next_position(tip);
    if block.index != expected_index {
        return Err(StoreError::Conflict {
            index: block.index,
            reason: format!("expected index {expected_index}"),
        });
    }
    if block.previous_hash != expected_prev {
        return Err(StoreError::Conflict {
            index: block.index,
            reason: "previous hash does not reference the current tip".into(),
        });
    }
    Ok(())
}

/// Volatile store for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: RwLock<Vec<Block>>,
    verifications: RwLock<Vec<VerificationRecord>>,
}

fn poisoned() -> StoreError {
    StoreError::Backend(anyhow!("memory store lock poisoned"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blocks(&self) -> Result<RwLockReadGuard<'_, Vec<Block>>, StoreError> {
        self.blocks.read().map_err(|_| poisoned())
    }

    fn blocks_mut(&self) -> Result<RwLockWriteGuard<'_, Vec<Block>>, StoreError> {
        self.blocks.write().map_err(|_| poisoned())
    }

    /// Discards the whole chain and its audit trail.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.blocks_mut()?.clear();
        self.verifications.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }
}

impl BlockStore for MemoryStore {
    fn append(&self, block: &Block) -> Result<(), StoreError> {
        let mut blocks = self.blocks_mut()?;
        check_append(blocks.last(), block)?;
        blocks.push(block.clone());
        debug!(index = block.index, "block appended to memory store");
        Ok(())
    }

    fn list_ordered_by_index(
        &self,
        limit: Option<usize>,
        descending: bool,
    ) -> Result<Vec<Block>, StoreError> {
        let blocks = self.blocks()?;
        let limit = limit.unwrap_or(usize::MAX);
        Ok(if descending {
            blocks.iter().rev().take(limit).cloned().collect()
        } else {
            blocks.iter().take(limit).cloned().collect()
        })
    }

    fn get_block(&self, index: u64) -> Result<Option<Block>, StoreError> {
        let blocks = self.blocks()?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| blocks.get(i))
            .cloned())
    }

    fn tip(&self) -> Result<Option<Block>, StoreError> {
        Ok(self.blocks()?.last().cloned())
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        Ok(self.blocks()?.len() as u64)
    }

    fn record_verification(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        self.verifications
            .write()
            .map_err(|_| poisoned())?
            .push(record.clone());
        Ok(())
    }

    fn list_verifications(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<VerificationRecord>, StoreError> {
        let records = self.verifications.read().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}
