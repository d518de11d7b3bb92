use thiserror::Error;

/// Errors surfaced by block stores. Backends wrap their own failures in `Backend`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("append conflict at index {index}: {reason}")]
    Conflict { index: u64, reason: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("difficulty {requested} exceeds the maximum of {max}")]
    InvalidDifficulty { requested: u32, max: u32 },

    #[error("mining failed: no satisfying nonce within {attempts} attempts")]
    MiningExhausted { attempts: u64 },

    #[error("amount total overflows")]
    AmountOverflow,

    #[error("mining cancelled")]
    MiningCancelled,

    #[error("store append conflict: {0}")]
    StoreAppendConflict(String),

    #[error("store error: {0}")]
    Store(#[source] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => LedgerError::StoreAppendConflict(err.to_string()),
            other => LedgerError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
