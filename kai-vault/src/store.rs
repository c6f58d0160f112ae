//! Storage seam for accounts and journal entries.

use crate::error::VaultResult;
use crate::model::{JournalEntry, UserCredentialRecord};
use kai_crypto::SealedRecord;

/// Everything a password change writes, applied as one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotationCommit {
    pub user_id: String,
    /// Key hash the rotation was planned against. The commit is refused if
    /// the account no longer carries it.
    pub previous_key_hash: String,
    pub new_key_hash: String,
    pub entries: Vec<SealedRecord>,
}

/// Persistence for accounts and journal entries.
///
/// Implementations must apply [`commit_rotation`](Self::commit_rotation)
/// atomically: either every entry token and the account key hash change, or
/// none of them do.
pub trait JournalStore: Send + Sync {
    fn create_account(&self, account: &UserCredentialRecord) -> VaultResult<()>;

    fn account(&self, user_id: &str) -> VaultResult<Option<UserCredentialRecord>>;

    fn insert_entry(&self, entry: &JournalEntry) -> VaultResult<()>;

    fn entry(&self, user_id: &str, entry_id: &str) -> VaultResult<Option<JournalEntry>>;

    /// Newest first.
    fn entries_for_user(&self, user_id: &str) -> VaultResult<Vec<JournalEntry>>;

    /// Entries with `is_encrypted` set, newest first.
    fn encrypted_entries(&self, user_id: &str) -> VaultResult<Vec<JournalEntry>>;

    /// Overwrites the stored entry. Fails with `EntryNotFound` if it is gone.
    fn update_entry(&self, entry: &JournalEntry) -> VaultResult<()>;

    fn delete_entry(&self, user_id: &str, entry_id: &str) -> VaultResult<()>;

    fn commit_rotation(&self, commit: &RotationCommit) -> VaultResult<()>;
}
