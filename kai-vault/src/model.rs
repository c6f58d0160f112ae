//! Records owned by the storage layer that the encryption layer reads and writes.

use serde::{Deserialize, Serialize};

/// Encryption fields of a user account.
///
/// `encryption_salt` is set once at signup and never changes afterwards;
/// `encryption_key_hash` is replaced on every password change. Accounts
/// created before encryption existed carry neither.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentialRecord {
    pub user_id: String,
    pub encryption_salt: Option<String>,
    pub encryption_key_hash: Option<String>,
}

impl UserCredentialRecord {
    /// Salt and key hash, when the account has encryption set up.
    pub fn encryption_material(&self) -> Option<(&str, &str)> {
        match (&self.encryption_salt, &self.encryption_key_hash) {
            (Some(salt), Some(hash)) if !salt.is_empty() && !hash.is_empty() => {
                Some((salt.as_str(), hash.as_str()))
            }
            _ => None,
        }
    }
}

/// Whether journal entries of this account can be encrypted.
pub fn can_encrypt_journal(account: &UserCredentialRecord) -> bool {
    account.encryption_material().is_some()
}

/// A journal entry as stored.
///
/// Exactly one of `content` / `encrypted_content` holds live data:
/// `is_encrypted` implies `content` is `None`, and the reverse. Only
/// [`crate::adapter`] moves text between the two fields. The one exception
/// is a read view after `decrypt_in_place`, which fills `content` for
/// display and is never written back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub user_id: String,
    pub content: Option<String>,
    pub encrypted_content: Option<String>,
    pub is_encrypted: bool,
    pub tags: Vec<String>,
    pub mood: Option<String>,
    /// Unix millis.
    pub created_at: i64,
}

impl JournalEntry {
    /// A fresh plaintext entry with a time-ordered id.
    pub fn new(user_id: &str, draft: NewJournalEntry) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            content: Some(draft.content),
            encrypted_content: None,
            is_encrypted: false,
            tags: draft.tags,
            mood: draft.mood,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Input for creating an entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mood: Option<String>,
}

impl NewJournalEntry {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Partial update; `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalUpdate {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub mood: Option<String>,
}
