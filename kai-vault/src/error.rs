use kai_crypto::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("encryption not configured for this account")]
    NotConfigured,
    #[error("encryption password required")]
    MissingCredentials,
    /// Wrong password, or a token that does not open. Deliberately the same
    /// error for both.
    #[error("invalid encryption credentials")]
    InvalidCredentials,
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("account already exists: {0}")]
    AccountExists(String),
    #[error("journal entry not found: {0}")]
    EntryNotFound(String),
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    /// Password change aborted; the old password stays valid.
    #[error(
        "password not changed: {} could not be re-encrypted, keep using the old password",
        describe_entry(.entry_id)
    )]
    KeyRotation { entry_id: Option<String> },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("crypto error: {0}")]
    Crypto(CryptoError),
    #[error("worker error: {0}")]
    Worker(String),
}

fn describe_entry(entry_id: &Option<String>) -> String {
    match entry_id {
        Some(id) => format!("entry {id}"),
        None => "a journal entry".to_string(),
    }
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Decryption(_) => VaultError::InvalidCredentials,
            CryptoError::KeyRotation { record } => VaultError::KeyRotation { entry_id: record },
            other => VaultError::Crypto(other),
        }
    }
}

impl From<duckdb::Error> for VaultError {
    fn from(err: duckdb::Error) -> Self {
        VaultError::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(err: tokio::task::JoinError) -> Self {
        VaultError::Worker(err.to_string())
    }
}

pub type VaultResult<T> = Result<T, VaultError>;
