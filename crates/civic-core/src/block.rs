use serde::{Deserialize, Serialize};

use crate::constants::GENESIS_PREVIOUS_HASH;
use crate::error::Result;
use crate::hash::{self, calculate_hash, hex_hash, Hash, HashPreimage};
use crate::transaction::Transaction;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub data: Transaction,
    #[serde(with = "hex_hash")]
    pub previous_hash: Hash,
    #[serde(with = "hex_hash")]
    pub hash: Hash,
    pub nonce: u64,
}

impl Block {
    /// Digest over every field except the stored `hash`.
    pub fn compute_hash(&self) -> Result<Hash> {
        calculate_hash(
            self.index,
            self.timestamp,
            &self.data,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// Canonical bytes the block hash is computed over.
    pub fn hash_bytes(&self) -> Result<Vec<u8>> {
        Ok(
            HashPreimage::new(self.index, self.timestamp, &self.data, &self.previous_hash)?
                .bytes_with_nonce(self.nonce),
        )
    }

    pub fn hash_hex(&self) -> String {
        hash::to_hex(&self.hash)
    }

    pub fn previous_hash_hex(&self) -> String {
        hash::to_hex(&self.previous_hash)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// `(index, previous_hash)` for the block that follows `tip`.
    pub fn next_position(tip: Option<&Block>) -> (u64, Hash) {
        match tip {
            Some(b) => (b.index + 1, b.hash),
            None => (0, GENESIS_PREVIOUS_HASH),
        }
    }
}
