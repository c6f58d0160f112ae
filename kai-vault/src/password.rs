//! Password change with journal key rotation.

use crate::error::{VaultError, VaultResult};
use crate::store::RotationCommit;
use crate::vault::{check_new_password, JournalVault};
use kai_crypto::{RotationCoordinator, SealedRecord, UserSalt};
use std::time::Instant;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// What a successful password change did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordChangeOutcome {
    pub entries_rotated: usize,
    pub new_key_hash: String,
}

impl JournalVault {
    /// Changes the encryption password and re-seals every encrypted entry.
    ///
    /// Holds the user's exclusive lock throughout, so journal operations for
    /// that user wait until the change lands or fails. On any error the
    /// account hash and every stored entry are left as they were and the old
    /// password keeps working. A new password shorter than
    /// [`MIN_PASSWORD_LEN`](crate::MIN_PASSWORD_LEN) is refused up front.
    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> VaultResult<PasswordChangeOutcome> {
        check_new_password(new_password)?;
        let _guard = self.locks.write(user_id).await;
        let started = Instant::now();

        let account = self.load_account(user_id).await?;
        let (salt_b64, stored_hash) = account
            .encryption_material()
            .ok_or(VaultError::NotConfigured)?;

        let Some(old) = self.unlock_service(old_password, salt_b64, stored_hash).await? else {
            warn!(user_id, "password change rejected: old password does not match");
            return Err(VaultError::InvalidCredentials);
        };

        let id = user_id.to_string();
        let records = self
            .with_store(move |store| store.encrypted_entries(&id))
            .await?
            .into_iter()
            .map(|entry| match entry.encrypted_content {
                Some(token) => Ok(SealedRecord { id: entry.id, token }),
                None => Err(VaultError::KeyRotation {
                    entry_id: Some(entry.id),
                }),
            })
            .collect::<VaultResult<Vec<_>>>()
            .inspect_err(|_| warn!(user_id, "password change aborted: encrypted entry has no ciphertext"))?;
        info!(user_id, entries = records.len(), "rotating journal key");

        let salt = UserSalt::from_b64(salt_b64)?;
        let new_password = Zeroizing::new(new_password.to_string());
        let plan = self
            .derive(move |deriver| {
                RotationCoordinator::new(deriver).plan(&old, &new_password, &salt, &records)
            })
            .await
            .inspect_err(|e| warn!(user_id, error = %e, "password change aborted during re-encryption"))?;

        let commit = RotationCommit {
            user_id: user_id.to_string(),
            previous_key_hash: plan.previous_key_hash,
            new_key_hash: plan.new_key_hash,
            entries: plan.records,
        };
        let entries_rotated = commit.entries.len();
        let new_key_hash = commit.new_key_hash.clone();
        self.with_store(move |store| store.commit_rotation(&commit))
            .await
            .inspect_err(|e| warn!(user_id, error = %e, "password change aborted at commit"))?;

        info!(
            user_id,
            entries = entries_rotated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "password changed, journal key rotated"
        );
        Ok(PasswordChangeOutcome {
            entries_rotated,
            new_key_hash,
        })
    }
}
