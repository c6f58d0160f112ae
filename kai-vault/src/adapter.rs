//! Journal entry encryption.
//!
//! The only code allowed to toggle `is_encrypted` or move text between
//! `content` and `encrypted_content`.

use crate::error::{VaultError, VaultResult};
use crate::model::JournalEntry;
use kai_crypto::{CryptoResult, EncryptionService};

/// Seals the entry's plaintext and clears it.
///
/// No-op when the entry is already encrypted or has no content.
pub fn encrypt_in_place(entry: &mut JournalEntry, service: &EncryptionService) -> CryptoResult<()> {
    if entry.is_encrypted {
        return Ok(());
    }
    let Some(content) = entry.content.as_deref().filter(|c| !c.is_empty()) else {
        return Ok(());
    };

    let token = service.encrypt(content)?;
    entry.encrypted_content = Some(token);
    entry.is_encrypted = true;
    entry.content = None;
    Ok(())
}

/// Fills `content` with the decrypted text for display.
///
/// `encrypted_content` is left as stored. Plain entries keep their content,
/// with `None` turned into an empty string.
pub fn decrypt_in_place(entry: &mut JournalEntry, service: &EncryptionService) -> CryptoResult<()> {
    if entry.is_encrypted {
        if let Some(token) = entry.encrypted_content.as_deref() {
            entry.content = Some(service.decrypt(token)?);
            return Ok(());
        }
    }
    if entry.content.is_none() {
        entry.content = Some(String::new());
    }
    Ok(())
}

/// The entry's text without touching the entry.
pub fn decrypted_content(entry: &JournalEntry, service: &EncryptionService) -> CryptoResult<String> {
    match (&entry.encrypted_content, &entry.content) {
        (Some(token), _) if entry.is_encrypted => service.decrypt(token),
        (_, Some(content)) => Ok(content.clone()),
        _ => Ok(String::new()),
    }
}

/// Replaces the entry's text, keeping an encrypted entry encrypted.
///
/// Plain entries are encrypted when a service is available. Changing an
/// encrypted entry without one fails rather than storing plaintext.
/// Emptying an encrypted entry leaves a plain empty entry, the same shape
/// [`encrypt_in_place`] leaves for empty text, so an encrypted entry always
/// holds a non-empty token.
pub fn replace_content(
    entry: &mut JournalEntry,
    content: String,
    service: Option<&EncryptionService>,
) -> VaultResult<()> {
    match (entry.is_encrypted, service) {
        (true, Some(_)) if content.is_empty() => {
            entry.encrypted_content = None;
            entry.is_encrypted = false;
            entry.content = Some(content);
        }
        (true, Some(service)) => {
            entry.encrypted_content = Some(service.encrypt(&content)?);
            entry.content = None;
        }
        (true, None) => return Err(VaultError::MissingCredentials),
        (false, Some(service)) => {
            entry.content = Some(content);
            encrypt_in_place(entry, service)?;
        }
        (false, None) => entry.content = Some(content),
    }
    Ok(())
}
