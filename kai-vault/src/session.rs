//! Request-scoped encryption sessions.

use kai_crypto::EncryptionService;

/// Conventional request header carrying the encryption password, separate
/// from the login session token.
pub const ENCRYPTION_PASSWORD_HEADER: &str = "x-encryption-password";

/// A verified [`EncryptionService`] bound to the user it was opened for.
///
/// Built once per request by [`crate::JournalVault::open_session`] and passed
/// explicitly to every journal operation of that request.
#[derive(Debug)]
pub struct EncryptionSession {
    user_id: String,
    service: EncryptionService,
}

impl EncryptionSession {
    pub(crate) fn new(user_id: &str, service: EncryptionService) -> Self {
        Self {
            user_id: user_id.to_string(),
            service,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn service(&self) -> &EncryptionService {
        &self.service
    }

    /// Key hash the session was verified against.
    pub fn key_hash(&self) -> &str {
        self.service.key_hash()
    }
}
