use serde::{Deserialize, Serialize};

use crate::pow::Difficulty;

/// Knobs for a [`Ledger`](crate::ledger::Ledger). The difficulty is part of the
/// chain's contract: verifying with a different value than blocks were mined
/// with reports them as invalid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerConfig {
    pub difficulty: Difficulty,
    /// Nonce attempts before mining gives up with `MiningExhausted`.
    pub max_attempts: u64,
    /// Split the nonce search across the rayon thread pool.
    pub parallel: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            max_attempts: u64::MAX,
            parallel: false,
        }
    }
}
