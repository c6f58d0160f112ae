//! Request-scoped encryption facade.
//!
//! An [`EncryptionService`] is built once per request from the password the
//! caller supplied, used for every field that request touches, then dropped.
//! Construction runs the KDF and is the expensive step.

use crate::cipher::{decrypt_string, encrypt_string};
use crate::error::CryptoResult;
use crate::key::{DerivedKey, KeyDeriver, UserSalt};
use crate::verifier::{hash_key, verify_key_hash};
use std::fmt;

pub struct EncryptionService {
    key: DerivedKey,
    key_hash: String,
}

impl EncryptionService {
    /// Derives the user's key. Call once per request.
    pub fn new(deriver: &KeyDeriver, password: &str, salt: &UserSalt) -> CryptoResult<Self> {
        let key = deriver.derive_key(password, salt)?;
        Ok(Self::from_key(key))
    }

    /// Same as [`new`](Self::new), taking the salt as stored on the account.
    pub fn from_b64_salt(deriver: &KeyDeriver, password: &str, salt_b64: &str) -> CryptoResult<Self> {
        Ok(Self::from_key(deriver.derive_key_b64(password, salt_b64)?))
    }

    /// Derives and verifies in one step.
    ///
    /// Returns `Ok(None)` when the password does not reproduce the stored
    /// key hash. Malformed salts are still an error.
    pub fn unlock(
        deriver: &KeyDeriver,
        password: &str,
        salt_b64: &str,
        stored_key_hash: &str,
    ) -> CryptoResult<Option<Self>> {
        let service = Self::from_b64_salt(deriver, password, salt_b64)?;
        Ok(service.verify_key(stored_key_hash).then_some(service))
    }

    pub(crate) fn from_key(key: DerivedKey) -> Self {
        let key_hash = hash_key(&key);
        Self { key, key_hash }
    }

    /// Hash of the held key, as persisted on the account.
    pub fn key_hash(&self) -> &str {
        &self.key_hash
    }

    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        encrypt_string(&self.key, plaintext)
    }

    pub fn decrypt(&self, token: &str) -> CryptoResult<String> {
        decrypt_string(&self.key, token)
    }

    /// Whether the held key matches the account's stored key hash.
    pub fn verify_key(&self, stored_key_hash: &str) -> bool {
        verify_key_hash(&self.key_hash, stored_key_hash)
    }
}

impl fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionService")
            .field("key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Encryption material created for a new account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountKeys {
    pub salt_b64: String,
    pub key_hash_hex: String,
}

/// Generates the salt and key hash stored on a new account.
pub fn provision_account(deriver: &KeyDeriver, password: &str) -> CryptoResult<AccountKeys> {
    let salt = UserSalt::generate();
    let service = EncryptionService::new(deriver, password, &salt)?;
    Ok(AccountKeys {
        salt_b64: salt.to_b64(),
        key_hash_hex: service.key_hash,
    })
}
