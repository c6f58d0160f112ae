//! Encryption layer for Kai journal content.
//!
//! Every user's journal text is sealed under a key derived from their
//! password:
//!
//! - Argon2id over `password` and `user salt || deployment master salt`
//! - XChaCha20-Poly1305 tokens, base64url encoded for a text column
//! - a domain-separated SHA-256 of the key, stored to verify passwords
//!   without ever storing the key
//!
//! # Lifecycle
//!
//! 1. At signup [`provision_account`] generates the salt and key hash.
//! 2. Each request that touches journal content builds one
//!    [`EncryptionService`] from the password it was given.
//! 3. On password change [`RotationCoordinator`] re-encrypts every record
//!    from the old key to the new one and yields a plan that the storage
//!    layer commits atomically with the new key hash.

mod cipher;
pub mod config;
mod error;
mod key;
pub mod rotation;
mod service;
mod verifier;

pub use cipher::{
    decrypt_bytes, decrypt_string, encrypt_bytes, encrypt_string, NONCE_SIZE, TAG_SIZE,
    TOKEN_VERSION,
};
pub use config::CryptoConfig;
pub use error::{CryptoError, CryptoResult};
pub use key::{DerivedKey, KdfParams, KeyDeriver, UserSalt, KEY_SIZE, SALT_SIZE};
pub use rotation::{RotatedToken, RotationCoordinator, RotationPlan, SealedRecord};
pub use service::{provision_account, AccountKeys, EncryptionService};
pub use verifier::{hash_key, verify_key_hash, KEY_HASH_HEX_LEN};
