use anyhow::{Context, Result};
use civic_core::store::check_append;
use civic_core::{Block, BlockStore, StoreError, VerificationRecord};
use sled::{Db, IVec, Tree};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";
const TREE_VERIFICATIONS: &str = "verifications";

/// Blocks are stored as their JSON form, keyed by big-endian index so that
/// sled's key order is chain order.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
  verifications: Tree,
  append_lock: Arc<Mutex<()>>,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let db = sled::open(path.as_ref())
      .with_context(|| format!("open sled store at {}", path.as_ref().display()))?;
    let store = Self::from_db(db)?;
    info!(blocks = store.blocks.len(), "sled store opened");
    Ok(store)
  }

  /// In-memory sled instance, removed on drop.
  pub fn temporary() -> Result<Self> {
    let db = sled::Config::new()
      .temporary(true)
      .open()
      .context("open temporary sled store")?;
    Self::from_db(db)
  }

  fn from_db(db: Db) -> Result<Self> {
    let blocks = db.open_tree(TREE_BLOCKS).context("open blocks tree")?;
    let verifications = db
      .open_tree(TREE_VERIFICATIONS)
      .context("open verifications tree")?;
    Ok(Self {
      db,
      blocks,
      verifications,
      append_lock: Arc::new(Mutex::new(())),
    })
  }

  /// Flushes pending writes to disk.
  pub fn close(&self) -> Result<()> {
    self.db.flush().context("flush sled store")?;
    Ok(())
  }

  /// Drops the whole chain and audit trail.
  pub fn clear(&self) -> Result<()> {
    let _guard = self.append_lock.lock().unwrap_or_else(PoisonError::into_inner);
    self.blocks.clear().context("clear blocks")?;
    self.verifications.clear().context("clear verifications")?;
    self.db.flush().context("flush after clear")?;
    info!("sled store cleared");
    Ok(())
  }
}

fn decode_block(key: &[u8], value: &IVec) -> Result<Block> {
  serde_json::from_slice(value).with_context(|| format!("corrupt block record under key {key:?}"))
}

fn decode_record(value: &IVec) -> Result<VerificationRecord> {
  serde_json::from_slice(value).context("corrupt verification record")
}

impl BlockStore for SledStore {
  fn append(&self, block: &Block) -> Result<(), StoreError> {
    let _guard = self.append_lock.lock().unwrap_or_else(PoisonError::into_inner);
    let tip = self.tip()?;
    check_append(tip.as_ref(), block)?;

    let key = block.index.to_be_bytes();
    let bytes = serde_json::to_vec(block).context("encode block")?;
    // Another handle on the same database may have raced us to this index.
    let swapped = self
      .blocks
      .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))
      .context("write block")?;
    if swapped.is_err() {
      return Err(StoreError::Conflict {
        index: block.index,
        reason: "index already stored".into(),
      });
    }

    self.db.flush().context("flush block")?;
    debug!(index = block.index, "block appended to sled store");
    Ok(())
  }

  fn list_ordered_by_index(
    &self,
    limit: Option<usize>,
    descending: bool,
  ) -> Result<Vec<Block>, StoreError> {
    let limit = limit.unwrap_or(usize::MAX);
    let iter: Box<dyn Iterator<Item = sled::Result<(IVec, IVec)>>> = if descending {
      Box::new(self.blocks.iter().rev())
    } else {
      Box::new(self.blocks.iter())
    };
    let mut out = Vec::new();
    for entry in iter.take(limit) {
      let (key, value) = entry.context("scan blocks")?;
      out.push(decode_block(&key, &value)?);
    }
    Ok(out)
  }

  fn get_block(&self, index: u64) -> Result<Option<Block>, StoreError> {
    let key = index.to_be_bytes();
    match self.blocks.get(key).context("read block")? {
      Some(value) => Ok(Some(decode_block(&key, &value)?)),
      None => Ok(None),
    }
  }

  fn tip(&self) -> Result<Option<Block>, StoreError> {
    match self.blocks.last().context("read tip")? {
      Some((key, value)) => Ok(Some(decode_block(&key, &value)?)),
      None => Ok(None),
    }
  }

  fn block_count(&self) -> Result<u64, StoreError> {
    Ok(self.blocks.len() as u64)
  }

  fn record_verification(&self, record: &VerificationRecord) -> Result<(), StoreError> {
    let id = self.db.generate_id().context("allocate verification id")?;
    let bytes = serde_json::to_vec(record).context("encode verification record")?;
    self
      .verifications
      .insert(id.to_be_bytes(), bytes)
      .context("write verification record")?;
    self.db.flush().context("flush verification record")?;
    Ok(())
  }

  fn list_verifications(
    &self,
    limit: Option<usize>,
  ) -> Result<Vec<VerificationRecord>, StoreError> {
    let mut out = Vec::new();
    for entry in self.verifications.iter().rev().take(limit.unwrap_or(usize::MAX)) {
      let (_, value) = entry.context("scan verifications")?;
      out.push(decode_record(&value)?);
    }
    Ok(out)
  }
}
