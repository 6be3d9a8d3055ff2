//! Authentication and configuration error types.

use natal_core::error::NatalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("encryption key is not configured (set NATAL_ENCRYPTION_KEY)")]
    MissingEncryptionKey,

    #[error("encryption key rejected: {0}")]
    InvalidEncryptionKey(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for NatalError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::AccountInactive => {
                NatalError::AuthenticationFailed {
                    reason: err.to_string(),
                }
            }
            AuthError::MissingEncryptionKey | AuthError::InvalidEncryptionKey(_) => {
                NatalError::Configuration(err.to_string())
            }
            AuthError::Crypto(msg) => NatalError::Crypto(msg),
        }
    }
}
