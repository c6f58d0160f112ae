//! Error types for the encryption layer.

use thiserror::Error;

/// Errors that can occur while deriving keys or sealing journal content.
///
/// None of the messages carry key material, passwords or plaintext.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The user salt (or another KDF input) is malformed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Sealing a payload failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The token is malformed, tampered with, or sealed under another key.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// A record could not be opened with the old key, so nothing was rotated.
    #[error(
        "key rotation aborted: record {} could not be decrypted with the old key",
        .record.as_deref().unwrap_or("<token>")
    )]
    KeyRotation {
        /// Identifier of the first record that failed, when rotating a batch.
        record: Option<String>,
    },

    /// The deployment configuration is unusable.
    #[error("invalid crypto configuration: {0}")]
    Config(String),
}

impl CryptoError {
    /// Whether this is an authentication/decoding failure on a token.
    pub fn is_decryption(&self) -> bool {
        matches!(self, CryptoError::Decryption(_))
    }
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
