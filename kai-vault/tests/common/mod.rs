#![allow(dead_code)]

use kai_crypto::{CryptoConfig, KdfParams};
use kai_vault::{DuckDbJournalStore, JournalVault};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> CryptoConfig {
    CryptoConfig {
        master_salt: "vault-tests-master-salt".into(),
        kdf: KdfParams::insecure_for_tests(),
    }
}

pub fn vault() -> JournalVault {
    init_tracing();
    let store = Arc::new(DuckDbJournalStore::open_in_memory().unwrap());
    JournalVault::new(store, &test_config()).unwrap()
}
