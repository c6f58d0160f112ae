//! Authenticated encryption of journal payloads.
//!
//! Tokens are `base64url(version || nonce || ciphertext || tag)` sealed with
//! XChaCha20-Poly1305. The version byte is bound as associated data, so a
//! rewritten version fails authentication like any other tampering. A fresh
//! random 192-bit nonce per call keeps equal plaintexts from producing equal
//! tokens.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;

/// Current token format version.
pub const TOKEN_VERSION: u8 = 1;
/// XChaCha20 nonce size in bytes.
pub const NONCE_SIZE: usize = 24;
/// Poly1305 tag size in bytes.
pub const TAG_SIZE: usize = 16;

const HEADER_SIZE: usize = 1 + NONCE_SIZE;
const MIN_SEALED_SIZE: usize = HEADER_SIZE + TAG_SIZE;

fn cipher_for(key: &DerivedKey) -> XChaCha20Poly1305 {
    XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
}

/// Seals raw bytes into the binary token layout.
pub fn encrypt_bytes(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);

    let version = [TOKEN_VERSION];
    let ciphertext = cipher_for(key)
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &version,
            },
        )
        .map_err(|_| CryptoError::Encryption("aead seal failed".into()))?;

    let mut sealed = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    sealed.push(TOKEN_VERSION);
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Opens bytes produced by [`encrypt_bytes`].
pub fn decrypt_bytes(key: &DerivedKey, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < MIN_SEALED_SIZE {
        return Err(CryptoError::Decryption("token is truncated".into()));
    }
    let version = sealed[0];
    if version != TOKEN_VERSION {
        return Err(CryptoError::Decryption(format!(
            "unsupported token version {version}"
        )));
    }

    let nonce = XNonce::from_slice(&sealed[1..HEADER_SIZE]);
    cipher_for(key)
        .decrypt(
            nonce,
            Payload {
                msg: &sealed[HEADER_SIZE..],
                aad: &sealed[..1],
            },
        )
        .map_err(|_| CryptoError::Decryption("authentication failed (wrong key or tampered data)".into()))
}

/// Encrypts text into a storage-safe token. Empty text maps to an empty token.
pub fn encrypt_string(key: &DerivedKey, plaintext: &str) -> CryptoResult<String> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }
    let sealed = encrypt_bytes(key, plaintext.as_bytes())?;
    Ok(URL_SAFE.encode(sealed))
}

/// Decrypts a token produced by [`encrypt_string`]. An empty token is empty text.
pub fn decrypt_string(key: &DerivedKey, token: &str) -> CryptoResult<String> {
    if token.is_empty() {
        return Ok(String::new());
    }
    let sealed = URL_SAFE
        .decode(token.as_bytes())
        .map_err(|_| CryptoError::Decryption("token is not valid base64".into()))?;
    let plaintext = decrypt_bytes(key, &sealed)?;
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_has_version_nonce_and_tag() {
        let key = DerivedKey::random();
        let sealed = encrypt_bytes(&key, b"abc").unwrap();
        assert_eq!(sealed[0], TOKEN_VERSION);
        assert_eq!(sealed.len(), HEADER_SIZE + 3 + TAG_SIZE);
    }

    #[test]
    fn empty_bytes_still_sealed() {
        let key = DerivedKey::random();
        let sealed = encrypt_bytes(&key, b"").unwrap();
        assert_eq!(sealed.len(), MIN_SEALED_SIZE);
        assert!(decrypt_bytes(&key, &sealed).unwrap().is_empty());
    }

    #[test]
    fn rewritten_version_is_rejected() {
        let key = DerivedKey::random();
        let mut sealed = encrypt_bytes(&key, b"abc").unwrap();
        sealed[0] = 2;
        let err = decrypt_bytes(&key, &sealed).unwrap_err();
        assert!(err.to_string().contains("unsupported token version 2"));
    }

    #[test]
    fn truncated_token_is_rejected() {
        let key = DerivedKey::random();
        let sealed = encrypt_bytes(&key, b"abc").unwrap();
        assert!(decrypt_bytes(&key, &sealed[..MIN_SEALED_SIZE - 1]).unwrap_err().is_decryption());
        assert!(decrypt_bytes(&key, &[]).unwrap_err().is_decryption());
    }

    #[test]
    fn non_utf8_plaintext_is_decryption_error() {
        let key = DerivedKey::random();
        let token = URL_SAFE.encode(encrypt_bytes(&key, &[0xff, 0xfe]).unwrap());
        assert!(decrypt_string(&key, &token).unwrap_err().is_decryption());
    }
}
