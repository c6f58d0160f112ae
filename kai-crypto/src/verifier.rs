//! One-way verification hash for derived keys.
//!
//! The account stores `hash_key(key)` so a request can tell whether a
//! supplied password reproduces the account's current key without the key
//! ever being persisted. This is separate from the login password hash.

use crate::key::DerivedKey;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const VERIFIER_DOMAIN: &[u8] = b"kai-key-verifier-v1";

/// Length of a key hash in hex characters.
pub const KEY_HASH_HEX_LEN: usize = 64;

/// Returns the lowercase hex SHA-256 of the key under the verifier domain.
pub fn hash_key(key: &DerivedKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(VERIFIER_DOMAIN);
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares two key hashes in constant time. Different lengths never match.
pub fn verify_key_hash(candidate_hex: &str, stored_hex: &str) -> bool {
    candidate_hex.as_bytes().ct_eq(stored_hex.as_bytes()).into()
}
