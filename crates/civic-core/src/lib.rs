//! Hash-chained, proof-of-work-sealed ledger for civic payments: tax payments,
//! crowdfunding contributions and donations.
//!
//! Blocks are mined by [`Ledger`] onto any [`BlockStore`], and the stored
//! chain can be re-verified at any time with [`verify_chain`].

pub mod amount;
pub mod block;
pub mod config;
pub mod constants;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod pow;
pub mod stats;
pub mod store;
pub mod transaction;
pub mod txid;
pub mod verify;

pub use amount::Amount;
pub use block::Block;
pub use config::LedgerConfig;
pub use error::{LedgerError, Result, StoreError};
pub use hash::{calculate_hash, digest, format_block_hash, parse_hash, to_hex, Hash};
pub use ledger::{Audit, Ledger};
pub use pow::{mine, CancelToken, Difficulty, Miner};
pub use stats::{compute_stats, BlockFilter, Stats};
pub use store::{BlockStore, MemoryStore, VerificationRecord};
pub use transaction::{Metadata, MetadataValue, Transaction, TransactionType};
pub use txid::generate_transaction_id;
pub use verify::{check_block, verify_block, verify_chain, BlockFailure, ChainReport, FailureReason};
