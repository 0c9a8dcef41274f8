//! Content hashing for cache keys.
//!
//! xxh3 is fast and well distributed but not cryptographic. Cache lookups trust
//! the 64-bit value as the whole key; two different states that collide will
//! share a cached GPU object.

use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::{xxh3_64_with_seed, Xxh3};

/// Hash raw bytes, mixing in `seed` (used for per-layout keys).
pub fn hash_bytes(bytes: &[u8], seed: u64) -> u64 {
    xxh3_64_with_seed(bytes, seed)
}

pub fn hash_value<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = Xxh3::new();
    value.hash(&mut hasher);
    hasher.finish()
}
