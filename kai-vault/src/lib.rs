//! Encrypted journal storage for Kai.
//!
//! [`JournalVault`] ties the pieces together:
//!
//! - an injected [`JournalStore`] (DuckDB in production)
//! - per-request [`EncryptionSession`]s opened from the password header
//! - journal CRUD that seals and opens content through [`adapter`]
//! - [`JournalVault::change_password`], which re-encrypts every entry under
//!   the new key and commits entries and key hash in one transaction
//!
//! Key derivation always runs on the blocking pool. Per-user locks keep
//! journal traffic out of the way while a user's key is rotated.

pub mod adapter;
mod duckdb_store;
mod error;
mod locks;
mod model;
mod password;
mod session;
mod store;
mod vault;

pub use duckdb_store::DuckDbJournalStore;
pub use error::{VaultError, VaultResult};
pub use locks::UserLocks;
pub use model::{
    can_encrypt_journal, JournalEntry, JournalUpdate, NewJournalEntry, UserCredentialRecord,
};
pub use password::PasswordChangeOutcome;
pub use session::{EncryptionSession, ENCRYPTION_PASSWORD_HEADER};
pub use store::{JournalStore, RotationCommit};
pub use vault::{JournalVault, MIN_PASSWORD_LEN};
