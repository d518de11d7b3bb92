pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const BLOCKS_PER_BATCH: usize = 50;
pub const MAX_BLOCKS_PER_REQUEST: usize = BLOCKS_PER_BATCH * 10;

/// Leading `'0'` hex characters a block hash needs unless configured otherwise.
pub const DEFAULT_DIFFICULTY: u32 = 4;
/// Beyond 16 hex zeros the 64-bit nonce space is no longer expected to hold a solution.
pub const MAX_DIFFICULTY: u32 = 16;

/// `previous_hash` of the block at index 0. Renders as sixty-four `'0'` characters.
pub const GENESIS_PREVIOUS_HASH: [u8; HASH_SIZE] = [0u8; HASH_SIZE];

/// Minor units per currency unit; amounts carry two fractional digits.
pub const AMOUNT_SCALE: u64 = 100;
pub const AMOUNT_DECIMALS: usize = 2;
/// Largest amount a single transaction may carry (1,000,000,000.00).
pub const MAX_TRANSACTION_AMOUNT: u64 = 1_000_000_000 * AMOUNT_SCALE;

pub const TRANSACTION_ID_PREFIX: &str = "TXN";
pub const VERIFICATION_ID_PREFIX: &str = "VRF";
pub const ID_RANDOM_LEN: usize = 12;

/// Characters kept at each end by `format_block_hash`.
pub const SHORT_HASH_EDGE: usize = 6;
