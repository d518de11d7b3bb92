//! SHA-256 digests over the canonical block encoding.
//!
//! The encoding is part of the on-disk contract: every reader of a stored
//! chain must produce the same bytes for the same block, so the layout below
//! must never change for existing chains.
//!
//! ```text
//! {index}|{timestamp}|{canonical transaction json}|{previous hash hex}|{nonce}
//! ```

use sha2::{Digest, Sha256};

use crate::constants::{HASH_HEX_SIZE, HASH_SIZE, SHORT_HASH_EDGE};
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;

pub type Hash = [u8; HASH_SIZE];

const FIELD_SEPARATOR: u8 = b'|';

pub fn digest(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

pub fn to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Parses a 64-character hex digest. Upper-case input is accepted.
pub fn parse_hash(s: &str) -> Result<Hash> {
    if s.len() != HASH_HEX_SIZE {
        return Err(LedgerError::InvalidInput(format!(
            "hash must be {HASH_HEX_SIZE} hex characters, got {}",
            s.len()
        )));
    }
    let mut out = [0u8; HASH_SIZE];
    hex::decode_to_slice(s, &mut out)
        .map_err(|e| LedgerError::InvalidInput(format!("hash {s:?}: {e}")))?;
    Ok(out)
}

/// `abc123...fed987` for display in listings.
pub fn format_block_hash(hash: &str) -> String {
    if hash.len() <= SHORT_HASH_EDGE * 2 || !hash.is_ascii() {
        return hash.to_string();
    }
    format!(
        "{}...{}",
        &hash[..SHORT_HASH_EDGE],
        &hash[hash.len() - SHORT_HASH_EDGE..]
    )
}

/// Everything that goes into a block hash except the nonce, encoded once so
/// the miner only appends the nonce per attempt.
#[derive(Clone, Debug)]
pub struct HashPreimage {
    prefix: Vec<u8>,
}

impl HashPreimage {
    pub fn new(index: u64, timestamp: u64, data: &Transaction, previous_hash: &Hash) -> Result<Self> {
        let json = data.canonical_json()?;
        let mut prefix = Vec::with_capacity(20 + 1 + 20 + 1 + json.len() + 1 + HASH_HEX_SIZE + 1);
        prefix.extend_from_slice(index.to_string().as_bytes());
        prefix.push(FIELD_SEPARATOR);
        prefix.extend_from_slice(timestamp.to_string().as_bytes());
        prefix.push(FIELD_SEPARATOR);
        prefix.extend_from_slice(&json);
        prefix.push(FIELD_SEPARATOR);
        prefix.extend_from_slice(to_hex(previous_hash).as_bytes());
        prefix.push(FIELD_SEPARATOR);
        Ok(Self { prefix })
    }

    /// Full canonical bytes for a given nonce.
    pub fn bytes_with_nonce(&self, nonce: u64) -> Vec<u8> {
        let mut bytes = self.prefix.clone();
        bytes.extend_from_slice(nonce.to_string().as_bytes());
        bytes
    }

    pub fn hash_with_nonce(&self, nonce: u64) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(&self.prefix);
        hasher.update(nonce.to_string().as_bytes());
        hasher.finalize().into()
    }
}

/// Hash of the tuple `(index, timestamp, data, previous_hash, nonce)`.
pub fn calculate_hash(
    index: u64,
    timestamp: u64,
    data: &Transaction,
    previous_hash: &Hash,
    nonce: u64,
) -> Result<Hash> {
    Ok(HashPreimage::new(index, timestamp, data, previous_hash)?.hash_with_nonce(nonce))
}

/// Serde adapter storing a [`Hash`] as lowercase hex.
pub mod hex_hash {
    use super::{parse_hash, to_hex, Hash};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_hash(&s).map_err(de::Error::custom)
    }
}
