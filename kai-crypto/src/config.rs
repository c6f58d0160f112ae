//! Deployment configuration for the encryption layer.
//!
//! Loaded from a TOML file or from environment variables. The master salt
//! is a deployment secret and must be overridden outside development.

use crate::error::{CryptoError, CryptoResult};
use crate::key::KdfParams;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Development-only master salt. Production deployments set `KAI_MASTER_SALT`.
pub const DEFAULT_MASTER_SALT: &str = "kai_wellness_platform_master_salt_v1";

pub const MASTER_SALT_ENV: &str = "KAI_MASTER_SALT";
pub const KDF_MEMORY_ENV: &str = "KAI_KDF_MEMORY_KIB";
pub const KDF_ITERATIONS_ENV: &str = "KAI_KDF_ITERATIONS";
pub const KDF_PARALLELISM_ENV: &str = "KAI_KDF_PARALLELISM";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Deployment-wide secondary salt appended to every user salt.
    pub master_salt: String,
    /// Argon2id cost.
    pub kdf: KdfParams,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            master_salt: DEFAULT_MASTER_SALT.to_string(),
            kdf: KdfParams::default(),
        }
    }
}

impl fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("master_salt", &"[REDACTED]")
            .field("kdf", &self.kdf)
            .finish()
    }
}

impl CryptoConfig {
    /// Cheap KDF cost and a fixed test master salt.
    pub fn insecure_for_tests() -> Self {
        Self {
            master_salt: "kai-test-master-salt".to_string(),
            kdf: KdfParams::insecure_for_tests(),
        }
    }

    /// Parses a `[crypto]`-less TOML document:
    ///
    /// ```toml
    /// master_salt = "..."
    ///
    /// [kdf]
    /// memory_kib = 65536
    /// iterations = 3
    /// parallelism = 1
    /// ```
    pub fn from_toml_str(source: &str) -> CryptoResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| CryptoError::Config(e.to_string()))?;
        config.require_production_strength()?;
        Ok(config)
    }

    /// Defaults overridden by `KAI_*` environment variables.
    pub fn from_env() -> CryptoResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> CryptoResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(salt) = lookup(MASTER_SALT_ENV) {
            config.master_salt = salt;
        }
        if let Some(value) = lookup(KDF_MEMORY_ENV) {
            config.kdf.memory_kib = parse_u32(KDF_MEMORY_ENV, &value)?;
        }
        if let Some(value) = lookup(KDF_ITERATIONS_ENV) {
            config.kdf.iterations = parse_u32(KDF_ITERATIONS_ENV, &value)?;
        }
        if let Some(value) = lookup(KDF_PARALLELISM_ENV) {
            config.kdf.parallelism = parse_u32(KDF_PARALLELISM_ENV, &value)?;
        }
        config.require_production_strength()?;
        Ok(config)
    }

    /// Rejects configurations that cannot derive keys at all.
    pub fn validate(&self) -> CryptoResult<()> {
        if self.master_salt.is_empty() {
            return Err(CryptoError::Config("master salt must not be empty".into()));
        }
        self.kdf.argon2().map(|_| ())
    }

    fn require_production_strength(&self) -> CryptoResult<()> {
        self.validate()?;
        if !self.kdf.meets_minimum() {
            return Err(CryptoError::Config(format!(
                "kdf cost below production floor (memory_kib={}, iterations={})",
                self.kdf.memory_kib, self.kdf.iterations
            )));
        }
        Ok(())
    }
}

fn parse_u32(name: &str, value: &str) -> CryptoResult<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| CryptoError::Config(format!("{name} must be an unsigned integer")))
}
