use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::constants::MAX_TRANSACTION_AMOUNT;
use crate::error::{LedgerError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    TaxPayment,
    Crowdfunding,
    Donation,
}

impl TransactionType {
    pub const ALL: [TransactionType; 3] = [
        TransactionType::TaxPayment,
        TransactionType::Crowdfunding,
        TransactionType::Donation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::TaxPayment => "tax_payment",
            TransactionType::Crowdfunding => "crowdfunding",
            TransactionType::Donation => "donation",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| LedgerError::InvalidInput(format!("unknown transaction type {s:?}")))
    }
}

/// A metadata value. JSON floats are rejected on input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

/// Sorted by key, so serialization order never depends on insertion order.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// The payload sealed into a block.
///
/// Field order here is the field order of the canonical JSON that gets hashed;
/// reordering fields changes every block hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Transaction {
    pub fn new(
        transaction_id: impl Into<String>,
        user_id: impl Into<String>,
        kind: TransactionType,
        amount: Amount,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            kind,
            amount,
            category: None,
            campaign_id: None,
            metadata: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    /// Compact JSON with fixed field order and sorted metadata keys.
    pub fn canonical_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Rejects data that must never reach the miner.
    pub fn validate(&self) -> Result<()> {
        if self.transaction_id.trim().is_empty() {
            return Err(LedgerError::InvalidInput("transactionId is required".into()));
        }
        if self.user_id.trim().is_empty() {
            return Err(LedgerError::InvalidInput("userId is required".into()));
        }
        if self.amount.minor_units() > MAX_TRANSACTION_AMOUNT {
            return Err(LedgerError::InvalidInput(format!(
                "amount {} exceeds the per-transaction limit of {}",
                self.amount,
                Amount::from_minor_units(MAX_TRANSACTION_AMOUNT)
            )));
        }
        if self.kind == TransactionType::Crowdfunding
            && self.campaign_id.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(LedgerError::InvalidInput(
                "campaignId is required for crowdfunding".into(),
            ));
        }
        if let Some(meta) = &self.metadata {
            if meta.keys().any(|k| k.is_empty()) {
                return Err(LedgerError::InvalidInput("metadata keys must not be empty".into()));
            }
        }
        Ok(())
    }
}
