//! Persistent [`BlockStore`](civic_core::BlockStore) backends.

pub mod sled_store;

pub use sled_store::SledStore;
