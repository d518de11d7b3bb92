//! Chain verification. Read-only: failures are reported, never repaired.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::block::Block;
use crate::constants::GENESIS_PREVIOUS_HASH;
use crate::hash::to_hex;
use crate::pow::{leading_zero_nibbles, Difficulty};

#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FailureReason {
    #[error("previous hash {found} does not match predecessor hash {expected}")]
    ChainLinkageBroken { expected: String, found: String },

    #[error("index {found} does not follow predecessor index {previous}")]
    IndexOutOfSequence { previous: u64, found: u64 },

    #[error("genesis block links to {found} instead of the all-zero hash")]
    GenesisLinkMismatch { found: String },

    #[error("stored hash {stored} does not match recomputed hash {computed}")]
    HashMismatch { stored: String, computed: String },

    #[error("hash {hash} has {found} leading zeros, {required} required")]
    DifficultyNotMet {
        required: u32,
        found: u32,
        hash: String,
    },

    #[error("block contents could not be encoded: {message}")]
    Encoding { message: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockFailure {
    pub index: u64,
    pub reason: FailureReason,
    /// Human-readable form of `reason` for audit displays.
    pub message: String,
}

impl BlockFailure {
    pub fn new(index: u64, reason: FailureReason) -> Self {
        let message = reason.to_string();
        Self {
            index,
            reason,
            message,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub is_valid: bool,
    pub blocks_verified: usize,
    /// Sorted, without duplicates.
    pub invalid_indices: Vec<u64>,
    pub failures: Vec<BlockFailure>,
}

/// Every reason `block` is invalid, given its predecessor (if any).
///
/// Without a predecessor only self-consistency is checked, plus the genesis
/// sentinel when `block` sits at index 0.
pub fn check_block(
    block: &Block,
    previous: Option<&Block>,
    difficulty: Difficulty,
) -> Vec<FailureReason> {
    let mut reasons = Vec::new();

    match previous {
        Some(prev) => {
            if block.previous_hash != prev.hash {
                reasons.push(FailureReason::ChainLinkageBroken {
                    expected: to_hex(&prev.hash),
                    found: to_hex(&block.previous_hash),
                });
            }
            if prev.index.checked_add(1) != Some(block.index) {
                reasons.push(FailureReason::IndexOutOfSequence {
                    previous: prev.index,
                    found: block.index,
                });
            }
        }
        None => {
            if block.index == 0 && block.previous_hash != GENESIS_PREVIOUS_HASH {
                reasons.push(FailureReason::GenesisLinkMismatch {
                    found: to_hex(&block.previous_hash),
                });
            }
        }
    }

    match block.compute_hash() {
        Ok(computed) if computed != block.hash => reasons.push(FailureReason::HashMismatch {
            stored: to_hex(&block.hash),
            computed: to_hex(&computed),
        }),
        Ok(_) => {}
        Err(e) => reasons.push(FailureReason::Encoding {
            message: e.to_string(),
        }),
    }

    let zeros = leading_zero_nibbles(&block.hash);
    if zeros < difficulty.get() {
        reasons.push(FailureReason::DifficultyNotMet {
            required: difficulty.get(),
            found: zeros,
            hash: to_hex(&block.hash),
        });
    }

    reasons
}

pub fn verify_block(block: &Block, previous: Option<&Block>, difficulty: Difficulty) -> bool {
    check_block(block, previous, difficulty).is_empty()
}

/// Checks every block of an index-ordered sequence and reports all failures.
/// Consecutive pairs are independent, so they are checked in parallel.
pub fn verify_chain(blocks: &[Block], difficulty: Difficulty) -> ChainReport {
    let mut failures: Vec<BlockFailure> = match blocks.first() {
        Some(first) => check_block(first, None, difficulty)
            .into_iter()
            .map(|r| BlockFailure::new(first.index, r))
            .collect(),
        None => Vec::new(),
    };

    let linked: Vec<BlockFailure> = blocks
        .par_windows(2)
        .flat_map_iter(|pair| {
            let (prev, block) = (&pair[0], &pair[1]);
            check_block(block, Some(prev), difficulty)
                .into_iter()
                .map(move |r| BlockFailure::new(block.index, r))
        })
        .collect();
    failures.extend(linked);

    for failure in &failures {
        warn!(index = failure.index, reason = %failure.message, "block failed verification");
    }

    let mut invalid_indices: Vec<u64> = failures.iter().map(|f| f.index).collect();
    invalid_indices.sort_unstable();
    invalid_indices.dedup();

    info!(
        blocks = blocks.len(),
        invalid = invalid_indices.len(),
        "chain verified"
    );

    ChainReport {
        is_valid: failures.is_empty(),
        blocks_verified: blocks.len(),
        invalid_indices,
        failures,
    }
}
