use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::block::Block;
use crate::error::{LedgerError, Result};
use crate::pow::Difficulty;
use crate::transaction::TransactionType;
use crate::verify::verify_chain;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_transactions: u64,
    pub total_amount: Amount,
    pub type_breakdown: BTreeMap<TransactionType, u64>,
    pub is_valid: bool,
    pub latest_block: Option<Block>,
}

/// Aggregates over an index-ordered sequence. Pure; validity comes from
/// [`verify_chain`].
pub fn compute_stats(blocks: &[Block], difficulty: Difficulty) -> Result<Stats> {
    let mut total_amount = Amount::ZERO;
    let mut type_breakdown = BTreeMap::new();
    for block in blocks {
        total_amount = total_amount
            .checked_add(block.data.amount)
            .ok_or(LedgerError::AmountOverflow)?;
        *type_breakdown.entry(block.data.kind).or_insert(0u64) += 1;
    }

    Ok(Stats {
        total_transactions: blocks.len() as u64,
        total_amount,
        type_breakdown,
        is_valid: verify_chain(blocks, difficulty).is_valid,
        latest_block: blocks.last().cloned(),
    })
}

/// Explorer-style filter: free-text search plus an optional type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockFilter {
    /// Case-insensitive substring of the transaction id, block hash or category.
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
}

impl BlockFilter {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.search.as_deref().map_or(true, str::is_empty)
    }

    pub fn matches(&self, block: &Block) -> bool {
        if let Some(kind) = self.kind {
            if block.data.kind != kind {
                return false;
            }
        }
        let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) else {
            return true;
        };
        let term = term.to_lowercase();
        block.data.transaction_id.to_lowercase().contains(&term)
            || block.hash_hex().contains(&term)
            || block
                .data
                .category
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&term))
    }
}
