//! Password-based key derivation (Argon2id).
//!
//! The Argon2 salt is the per-user salt followed by a deployment-wide master
//! salt. A leaked `accounts` table alone is not enough to brute-force keys
//! offline; the attacker also needs the deployment secret.

use crate::config::CryptoConfig;
use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of a derived key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of a freshly generated user salt in bytes.
pub const SALT_SIZE: usize = 32;

/// Default Argon2id memory cost (64 MiB).
pub const DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
/// Default Argon2id pass count.
pub const DEFAULT_ITERATIONS: u32 = 3;
/// Default Argon2id lane count.
pub const DEFAULT_PARALLELISM: u32 = 1;

/// Lowest memory cost accepted from configuration files (19 MiB).
pub const MIN_MEMORY_KIB: u32 = 19 * 1024;
/// Lowest pass count accepted from configuration files.
pub const MIN_ITERATIONS: u32 = 2;

// ============================================================================
// KDF parameters
// ============================================================================

/// Argon2id cost parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_MEMORY_KIB,
            iterations: DEFAULT_ITERATIONS,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl KdfParams {
    /// Minimal Argon2 cost. Only for tests; never load this from configuration.
    pub fn insecure_for_tests() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    /// Whether these parameters reach the production floor.
    pub fn meets_minimum(&self) -> bool {
        self.memory_kib >= MIN_MEMORY_KIB && self.iterations >= MIN_ITERATIONS
    }

    pub(crate) fn argon2(&self) -> CryptoResult<Argon2<'static>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CryptoError::Config(format!("argon2 parameters rejected: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

// ============================================================================
// User salt
// ============================================================================

/// Random per-account salt. Generated once at signup and never changed.
#[derive(Clone, PartialEq, Eq)]
pub struct UserSalt(Vec<u8>);

impl UserSalt {
    /// Generates a new random salt.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SALT_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parses a salt from its stored base64 form.
    pub fn from_b64(encoded: &str) -> CryptoResult<Self> {
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| CryptoError::KeyDerivation(format!("user salt is not valid base64: {e}")))?;
        if bytes.is_empty() {
            return Err(CryptoError::KeyDerivation("user salt is empty".into()));
        }
        Ok(Self(bytes))
    }

    /// Returns the base64 form stored on the account record.
    pub fn to_b64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for UserSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UserSalt").field(&self.to_b64()).finish()
    }
}

// ============================================================================
// Derived key
// ============================================================================

/// A 256-bit key derived from a password. Zeroized on drop.
///
/// Raw bytes never leave this crate; equality is checked in constant time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// A random key not tied to any password.
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        let key = Self(bytes);
        bytes.zeroize();
        key
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for DerivedKey {}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

// ============================================================================
// Key deriver
// ============================================================================

/// Derives user keys. Carries the deployment master salt and the KDF cost,
/// and is passed explicitly to whatever needs to derive a key.
#[derive(Clone)]
pub struct KeyDeriver {
    master_salt: Zeroizing<Vec<u8>>,
    params: KdfParams,
}

impl KeyDeriver {
    pub fn new(config: &CryptoConfig) -> CryptoResult<Self> {
        config.validate()?;
        Ok(Self {
            master_salt: Zeroizing::new(config.master_salt.as_bytes().to_vec()),
            params: config.kdf,
        })
    }

    /// Derives the key for `password` under `salt`.
    ///
    /// Deterministic: the same inputs always give the same key. Password
    /// content never causes a failure.
    pub fn derive_key(&self, password: &str, salt: &UserSalt) -> CryptoResult<DerivedKey> {
        let mut combined = Zeroizing::new(Vec::with_capacity(
            salt.as_bytes().len() + self.master_salt.len(),
        ));
        combined.extend_from_slice(salt.as_bytes());
        combined.extend_from_slice(&self.master_salt);

        let argon2 = self.params.argon2()?;
        let mut output = [0u8; KEY_SIZE];
        argon2
            .hash_password_into(password.as_bytes(), &combined, &mut output)
            .map_err(|e| CryptoError::KeyDerivation(format!("argon2 failed: {e}")))?;

        let key = DerivedKey::from_bytes(output);
        output.zeroize();
        Ok(key)
    }

    /// Same as [`derive_key`](Self::derive_key), taking the stored base64 salt.
    pub fn derive_key_b64(&self, password: &str, salt_b64: &str) -> CryptoResult<DerivedKey> {
        let salt = UserSalt::from_b64(salt_b64)?;
        self.derive_key(password, &salt)
    }
}

impl fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDeriver")
            .field("master_salt", &"[REDACTED]")
            .field("params", &self.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deriver() -> KeyDeriver {
        KeyDeriver::new(&CryptoConfig::insecure_for_tests()).unwrap()
    }

    #[test]
    fn same_inputs_same_key() {
        let d = deriver();
        let salt = UserSalt::generate();
        assert_eq!(
            d.derive_key("hunter22", &salt).unwrap(),
            d.derive_key("hunter22", &salt).unwrap()
        );
    }

    #[test]
    fn password_and_salt_both_matter() {
        let d = deriver();
        let salt = UserSalt::generate();
        let base = d.derive_key("hunter22", &salt).unwrap();

        assert_ne!(base, d.derive_key("hunter23", &salt).unwrap());
        assert_ne!(base, d.derive_key("hunter22", &UserSalt::generate()).unwrap());
    }

    #[test]
    fn master_salt_matters() {
        let salt = UserSalt::generate();
        let a = deriver().derive_key("pw", &salt).unwrap();

        let mut config = CryptoConfig::insecure_for_tests();
        config.master_salt = "another-deployment".into();
        let b = KeyDeriver::new(&config).unwrap().derive_key("pw", &salt).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn empty_and_odd_passwords_derive() {
        let d = deriver();
        let salt = UserSalt::generate();
        assert!(d.derive_key("", &salt).is_ok());
        assert!(d.derive_key("pässwörd 🔑\u{0301}", &salt).is_ok());
    }

    #[test]
    fn malformed_salt_is_key_derivation_error() {
        let d = deriver();
        for bad in ["not base64!!", "", "%%%%"] {
            let err = d.derive_key_b64("pw", bad).unwrap_err();
            assert!(matches!(err, CryptoError::KeyDerivation(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn salt_b64_roundtrip() {
        let salt = UserSalt::generate();
        assert_eq!(salt.as_bytes().len(), SALT_SIZE);
        assert_eq!(UserSalt::from_b64(&salt.to_b64()).unwrap(), salt);
        assert_ne!(UserSalt::generate(), salt);
    }

    #[test]
    fn default_params_meet_floor() {
        assert!(KdfParams::default().meets_minimum());
        assert!(!KdfParams::insecure_for_tests().meets_minimum());
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = DerivedKey::random();
        assert_eq!(format!("{key:?}"), "DerivedKey([REDACTED])");
        assert!(!format!("{:?}", deriver()).contains("kai-test"));
    }

    #[test]
    fn key_equality_sees_last_byte() {
        let mut bytes = [7u8; KEY_SIZE];
        let a = DerivedKey::from_bytes(bytes);
        bytes[KEY_SIZE - 1] ^= 1;
        let b = DerivedKey::from_bytes(bytes);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
