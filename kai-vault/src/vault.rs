//! The journal service: sessions, CRUD and account setup.

use crate::adapter::{decrypt_in_place, decrypted_content, encrypt_in_place, replace_content};
use crate::error::{VaultError, VaultResult};
use crate::locks::UserLocks;
use crate::model::{JournalEntry, JournalUpdate, NewJournalEntry, UserCredentialRecord};
use crate::session::EncryptionSession;
use crate::store::JournalStore;
use kai_crypto::{provision_account, CryptoConfig, CryptoResult, EncryptionService, KeyDeriver};
use std::sync::Arc;
use tokio::sync::OwnedRwLockReadGuard;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Shortest encryption password accepted at signup and on password change.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Rejects passwords too short to be worth a key.
pub(crate) fn check_new_password(password: &str) -> VaultResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(VaultError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Encrypted journal storage for many users.
///
/// Owns the key deriver and the per-user locks; the store is injected.
/// Key derivation and store access both run on tokio's blocking pool.
pub struct JournalVault {
    pub(crate) store: Arc<dyn JournalStore>,
    pub(crate) deriver: Arc<KeyDeriver>,
    pub(crate) locks: UserLocks,
}

impl JournalVault {
    pub fn new(store: Arc<dyn JournalStore>, config: &CryptoConfig) -> VaultResult<Self> {
        Ok(Self::with_deriver(store, KeyDeriver::new(config)?))
    }

    pub fn with_deriver(store: Arc<dyn JournalStore>, deriver: KeyDeriver) -> Self {
        Self {
            store,
            deriver: Arc::new(deriver),
            locks: UserLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn JournalStore> {
        &self.store
    }

    /// Runs a key-derivation job off the async workers.
    pub(crate) async fn derive<T, F>(&self, job: F) -> VaultResult<T>
    where
        F: FnOnce(&KeyDeriver) -> CryptoResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let deriver = Arc::clone(&self.deriver);
        let result = tokio::task::spawn_blocking(move || job(&deriver)).await?;
        Ok(result?)
    }

    /// Runs a store call off the async workers.
    pub(crate) async fn with_store<T, F>(&self, job: F) -> VaultResult<T>
    where
        F: FnOnce(&dyn JournalStore) -> VaultResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || job(store.as_ref())).await?
    }

    pub(crate) async fn load_account(&self, user_id: &str) -> VaultResult<UserCredentialRecord> {
        let user_id = user_id.to_string();
        self.with_store(move |store| {
            store
                .account(&user_id)?
                .ok_or(VaultError::AccountNotFound(user_id))
        })
        .await
    }

    async fn load_entry(&self, user_id: &str, entry_id: &str) -> VaultResult<JournalEntry> {
        let (user_id, entry_id) = (user_id.to_string(), entry_id.to_string());
        self.with_store(move |store| {
            store
                .entry(&user_id, &entry_id)?
                .ok_or(VaultError::EntryNotFound(entry_id))
        })
        .await
    }

    // ========================================================================
    // Accounts and sessions
    // ========================================================================

    /// Creates an account with encryption set up for `password`.
    pub async fn register_account(
        &self,
        user_id: &str,
        password: &str,
    ) -> VaultResult<UserCredentialRecord> {
        check_new_password(password)?;
        let id = user_id.to_string();
        if self.with_store(move |store| store.account(&id)).await?.is_some() {
            return Err(VaultError::AccountExists(user_id.to_string()));
        }
        let password = Zeroizing::new(password.to_string());
        let keys = self
            .derive(move |deriver| provision_account(deriver, &password))
            .await?;

        let account = UserCredentialRecord {
            user_id: user_id.to_string(),
            encryption_salt: Some(keys.salt_b64),
            encryption_key_hash: Some(keys.key_hash_hex),
        };
        let record = account.clone();
        self.with_store(move |store| store.create_account(&record)).await?;
        info!(user_id, "account registered with journal encryption");
        Ok(account)
    }

    /// Opens a session when a password is supplied and encryption is set up.
    ///
    /// `Ok(None)` means the request proceeds without encryption. A password
    /// that does not match the account is [`VaultError::InvalidCredentials`].
    pub async fn open_session(
        &self,
        user_id: &str,
        password: Option<&str>,
    ) -> VaultResult<Option<EncryptionSession>> {
        let Some(password) = password.filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        let account = self.load_account(user_id).await?;
        let Some((salt, hash)) = account.encryption_material() else {
            debug!(user_id, "encryption not configured, continuing without session");
            return Ok(None);
        };
        self.unlock(user_id, password, salt, hash).await.map(Some)
    }

    /// Like [`open_session`](Self::open_session), but every way of ending up
    /// without a session is an error.
    pub async fn require_session(
        &self,
        user_id: &str,
        password: Option<&str>,
    ) -> VaultResult<EncryptionSession> {
        let account = self.load_account(user_id).await?;
        let Some((salt, hash)) = account.encryption_material() else {
            return Err(VaultError::NotConfigured);
        };
        let Some(password) = password.filter(|p| !p.is_empty()) else {
            return Err(VaultError::MissingCredentials);
        };
        self.unlock(user_id, password, salt, hash).await
    }

    async fn unlock(
        &self,
        user_id: &str,
        password: &str,
        salt: &str,
        stored_hash: &str,
    ) -> VaultResult<EncryptionSession> {
        let service = self.unlock_service(password, salt, stored_hash).await?;
        match service {
            Some(service) => {
                debug!(user_id, "encryption session opened");
                Ok(EncryptionSession::new(user_id, service))
            }
            None => {
                warn!(user_id, "encryption password did not match stored key hash");
                Err(VaultError::InvalidCredentials)
            }
        }
    }

    pub(crate) async fn unlock_service(
        &self,
        password: &str,
        salt: &str,
        stored_hash: &str,
    ) -> VaultResult<Option<EncryptionService>> {
        let password = Zeroizing::new(password.to_string());
        let salt = salt.to_string();
        let stored_hash = stored_hash.to_string();
        self.derive(move |deriver| EncryptionService::unlock(deriver, &password, &salt, &stored_hash))
            .await
    }

    /// Takes the user's shared lock and, for a session, checks it still
    /// matches the account's current key.
    async fn guard(
        &self,
        user_id: &str,
        session: Option<&EncryptionSession>,
    ) -> VaultResult<OwnedRwLockReadGuard<()>> {
        let guard = self.locks.read(user_id).await;
        if let Some(session) = session {
            if session.user_id() != user_id {
                return Err(VaultError::InvalidCredentials);
            }
            let account = self.load_account(user_id).await?;
            let current = account.encryption_key_hash.as_deref().unwrap_or_default();
            if !session.service().verify_key(current) {
                warn!(user_id, "rejecting session opened under a retired key");
                return Err(VaultError::InvalidCredentials);
            }
        }
        Ok(guard)
    }

    // ========================================================================
    // Journal entries
    // ========================================================================

    /// Stores a new entry, sealed when a session is supplied.
    ///
    /// The returned entry shows the text in `content` either way.
    pub async fn create_entry(
        &self,
        user_id: &str,
        draft: NewJournalEntry,
        session: Option<&EncryptionSession>,
    ) -> VaultResult<JournalEntry> {
        let _guard = self.guard(user_id, session).await?;
        self.load_account(user_id).await?;

        let mut entry = JournalEntry::new(user_id, draft);
        if let Some(session) = session {
            encrypt_in_place(&mut entry, session.service())?;
        }
        let stored = entry.clone();
        self.with_store(move |store| store.insert_entry(&stored)).await?;
        debug!(user_id, entry_id = %entry.id, encrypted = entry.is_encrypted, "journal entry created");

        if let Some(session) = session {
            decrypt_in_place(&mut entry, session.service())?;
        }
        Ok(entry)
    }

    /// One entry, decrypted for display when a session is supplied.
    ///
    /// Without a session an encrypted entry comes back as stored.
    pub async fn get_entry(
        &self,
        user_id: &str,
        entry_id: &str,
        session: Option<&EncryptionSession>,
    ) -> VaultResult<JournalEntry> {
        let _guard = self.guard(user_id, session).await?;
        let mut entry = self.load_entry(user_id, entry_id).await?;
        if let Some(session) = session {
            decrypt_in_place(&mut entry, session.service())?;
        }
        Ok(entry)
    }

    /// All of a user's entries, newest first.
    pub async fn list_entries(
        &self,
        user_id: &str,
        session: Option<&EncryptionSession>,
    ) -> VaultResult<Vec<JournalEntry>> {
        let _guard = self.guard(user_id, session).await?;
        let id = user_id.to_string();
        let mut entries = self
            .with_store(move |store| store.entries_for_user(&id))
            .await?;
        if let Some(session) = session {
            for entry in &mut entries {
                entry.content = Some(decrypted_content(entry, session.service())?);
            }
        }
        Ok(entries)
    }

    /// Applies a partial update. New content of an encrypted entry is
    /// re-sealed, which needs a session.
    pub async fn update_entry(
        &self,
        user_id: &str,
        entry_id: &str,
        update: JournalUpdate,
        session: Option<&EncryptionSession>,
    ) -> VaultResult<JournalEntry> {
        let _guard = self.guard(user_id, session).await?;
        let mut entry = self.load_entry(user_id, entry_id).await?;

        if let Some(content) = update.content {
            replace_content(&mut entry, content, session.map(EncryptionSession::service))?;
        }
        if let Some(tags) = update.tags {
            entry.tags = tags;
        }
        if let Some(mood) = update.mood {
            entry.mood = Some(mood);
        }
        let stored = entry.clone();
        self.with_store(move |store| store.update_entry(&stored)).await?;
        debug!(user_id, entry_id, "journal entry updated");

        if let Some(session) = session {
            decrypt_in_place(&mut entry, session.service())?;
        }
        Ok(entry)
    }

    pub async fn delete_entry(&self, user_id: &str, entry_id: &str) -> VaultResult<()> {
        let _guard = self.guard(user_id, None).await?;
        let (id, entry) = (user_id.to_string(), entry_id.to_string());
        self.with_store(move |store| store.delete_entry(&id, &entry)).await?;
        debug!(user_id, entry_id, "journal entry deleted");
        Ok(())
    }
}
