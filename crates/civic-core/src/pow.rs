//! Proof-of-work: nonce search until the block hash starts with `difficulty`
//! zero hex characters.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::block::Block;
use crate::config::LedgerConfig;
use crate::constants::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use crate::error::{LedgerError, Result};
use crate::hash::{to_hex, Hash, HashPreimage};
use crate::transaction::Transaction;

/// Required count of leading `'0'` hex characters, `0..=MAX_DIFFICULTY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Difficulty(u32);

impl Difficulty {
    pub fn new(zeros: u32) -> Result<Self> {
        if zeros > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidDifficulty {
                requested: zeros,
                max: MAX_DIFFICULTY,
            });
        }
        Ok(Self(zeros))
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Expected number of hash attempts, 16^difficulty.
    pub fn expected_attempts(self) -> u64 {
        16u64.saturating_pow(self.0)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(DEFAULT_DIFFICULTY)
    }
}

impl TryFrom<u32> for Difficulty {
    type Error = LedgerError;

    fn try_from(zeros: u32) -> Result<Self> {
        Difficulty::new(zeros)
    }
}

impl From<Difficulty> for u32 {
    fn from(d: Difficulty) -> u32 {
        d.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Number of leading zero hex characters (nibbles) in `hash`.
pub fn leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 2;
        } else {
            if *b >> 4 == 0 {
                total += 1;
            }
            break;
        }
    }
    total
}

pub fn meets_difficulty(hash: &Hash, difficulty: Difficulty) -> bool {
    leading_zero_nibbles(hash) >= difficulty.get()
}

/// Cooperative stop flag checked between nonce attempts.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Mines blocks under one configuration. Cloning shares the cancel token.
#[derive(Clone, Debug)]
pub struct Miner {
    difficulty: Difficulty,
    max_attempts: u64,
    parallel: bool,
    cancel: CancelToken,
}

impl Miner {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            difficulty: config.difficulty,
            max_attempts: config.max_attempts,
            parallel: config.parallel,
            cancel: CancelToken::new(),
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Seals `data` at `index`, returning the first block whose hash meets the difficulty.
    pub fn mine(
        &self,
        index: u64,
        timestamp: u64,
        data: Transaction,
        previous_hash: Hash,
    ) -> Result<Block> {
        let preimage = HashPreimage::new(index, timestamp, &data, &previous_hash)?;
        debug!(
            index,
            difficulty = self.difficulty.get(),
            parallel = self.parallel,
            "mining started"
        );

        let (nonce, hash) = if self.parallel {
            search_parallel(&preimage, self.difficulty, self.max_attempts, &self.cancel)?
        } else {
            search_sequential(&preimage, self.difficulty, self.max_attempts, &self.cancel)?
        };

        info!("Mined block {} with nonce {} and hash {}", index, nonce, to_hex(&hash));

        Ok(Block {
            index,
            timestamp,
            data,
            previous_hash,
            hash,
            nonce,
        })
    }
}

/// Sequential, unbounded, uncancellable search starting at nonce 0.
pub fn mine(
    index: u64,
    timestamp: u64,
    data: Transaction,
    previous_hash: Hash,
    difficulty: Difficulty,
) -> Result<Block> {
    let config = LedgerConfig {
        difficulty,
        ..LedgerConfig::default()
    };
    Miner::new(&config).mine(index, timestamp, data, previous_hash)
}

fn search_sequential(
    preimage: &HashPreimage,
    difficulty: Difficulty,
    max_attempts: u64,
    cancel: &CancelToken,
) -> Result<(u64, Hash)> {
    for nonce in 0..max_attempts {
        if cancel.is_cancelled() {
            return Err(LedgerError::MiningCancelled);
        }
        let hash = preimage.hash_with_nonce(nonce);
        if meets_difficulty(&hash, difficulty) {
            return Ok((nonce, hash));
        }
    }
    Err(LedgerError::MiningExhausted {
        attempts: max_attempts,
    })
}

/// Rayon splits the nonce range across threads; whichever worker finds a
/// solution first wins and the rest are dropped.
fn search_parallel(
    preimage: &HashPreimage,
    difficulty: Difficulty,
    max_attempts: u64,
    cancel: &CancelToken,
) -> Result<(u64, Hash)> {
    let found = (0u64..max_attempts).into_par_iter().find_map_any(|nonce| {
        if cancel.is_cancelled() {
            return Some(None);
        }
        let hash = preimage.hash_with_nonce(nonce);
        meets_difficulty(&hash, difficulty).then_some(Some((nonce, hash)))
    });

    match found {
        Some(Some(solution)) => Ok(solution),
        Some(None) => Err(LedgerError::MiningCancelled),
        None => Err(LedgerError::MiningExhausted {
            attempts: max_attempts,
        }),
    }
}
