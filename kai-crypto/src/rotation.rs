//! Moving ciphertext from the key of an old password to the key of a new one.
//!
//! The salt never changes; only the password (and so the key) does. A batch
//! is all-or-nothing: every record is opened under the old key before
//! anything is sealed under the new one, and the caller receives a plan to
//! commit in a single storage transaction.

use crate::cipher::{decrypt_string, encrypt_string};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{DerivedKey, KeyDeriver, UserSalt};
use crate::service::EncryptionService;
use crate::verifier::hash_key;
use zeroize::Zeroizing;

/// A stored token together with the id of the record that holds it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedRecord {
    pub id: String,
    pub token: String,
}

/// Result of rotating a single token.
#[derive(Debug)]
pub struct RotatedToken {
    pub token: String,
    pub new_key: DerivedKey,
    pub new_key_hash: String,
}

/// Re-encrypted records and the key hash to store alongside them.
///
/// Nothing has been persisted when a plan exists; dropping it discards the
/// rotation.
#[derive(Debug)]
pub struct RotationPlan {
    pub records: Vec<SealedRecord>,
    pub previous_key_hash: String,
    pub new_key_hash: String,
}

impl RotationPlan {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct RotationCoordinator<'a> {
    deriver: &'a KeyDeriver,
}

impl<'a> RotationCoordinator<'a> {
    pub fn new(deriver: &'a KeyDeriver) -> Self {
        Self { deriver }
    }

    /// Rotates one token from `old_password` to `new_password`.
    pub fn rotate(
        &self,
        old_password: &str,
        new_password: &str,
        salt: &UserSalt,
        old_token: &str,
    ) -> CryptoResult<RotatedToken> {
        let old_key = self.deriver.derive_key(old_password, salt)?;
        let plaintext = Zeroizing::new(
            decrypt_string(&old_key, old_token)
                .map_err(|_| CryptoError::KeyRotation { record: None })?,
        );

        let new_key = self.deriver.derive_key(new_password, salt)?;
        let token = encrypt_string(&new_key, &plaintext)?;
        let new_key_hash = hash_key(&new_key);

        Ok(RotatedToken {
            token,
            new_key,
            new_key_hash,
        })
    }

    /// Plans a batch rotation, deriving the old key from `old_password`.
    pub fn plan_with_passwords(
        &self,
        old_password: &str,
        new_password: &str,
        salt: &UserSalt,
        records: &[SealedRecord],
    ) -> CryptoResult<RotationPlan> {
        let old = EncryptionService::new(self.deriver, old_password, salt)?;
        self.plan(&old, new_password, salt, records)
    }

    /// Plans a batch rotation using an already-derived service for the old key.
    ///
    /// Fails with [`CryptoError::KeyRotation`] naming the first record that
    /// does not open under the old key; no new key is derived in that case.
    pub fn plan(
        &self,
        old: &EncryptionService,
        new_password: &str,
        salt: &UserSalt,
        records: &[SealedRecord],
    ) -> CryptoResult<RotationPlan> {
        let mut opened: Vec<(&str, Zeroizing<String>)> = Vec::with_capacity(records.len());
        for record in records {
            let plaintext = old.decrypt(&record.token).map_err(|_| CryptoError::KeyRotation {
                record: Some(record.id.clone()),
            })?;
            opened.push((record.id.as_str(), Zeroizing::new(plaintext)));
        }

        let new = EncryptionService::new(self.deriver, new_password, salt)?;
        let mut rotated = Vec::with_capacity(opened.len());
        for (id, plaintext) in &opened {
            rotated.push(SealedRecord {
                id: (*id).to_string(),
                token: new.encrypt(plaintext)?,
            });
        }

        Ok(RotationPlan {
            records: rotated,
            previous_key_hash: old.key_hash().to_string(),
            new_key_hash: new.key_hash().to_string(),
        })
    }
}
