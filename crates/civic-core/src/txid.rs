//! External-facing identifiers: `TXN-<unix ms>-<12 base36 chars>`.
//!
//! 36^12 is about 2^62, so collisions need two draws in the same millisecond
//! that also agree on 62 random bits.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::constants::{ID_RANDOM_LEN, TRANSACTION_ID_PREFIX, VERIFICATION_ID_PREFIX};

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Milliseconds since the Unix epoch; 0 if the clock is before 1970.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn random_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ID_RANDOM_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

fn generate_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    format!("{prefix}-{}-{}", now_millis(), random_suffix(&mut rng))
}

pub fn generate_transaction_id() -> String {
    generate_id(TRANSACTION_ID_PREFIX)
}

pub fn generate_verification_id() -> String {
    generate_id(VERIFICATION_ID_PREFIX)
}
