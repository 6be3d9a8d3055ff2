//! Error types for the natal record system.

use thiserror::Error;

use crate::capability::Capability;

#[derive(Debug, Error)]
pub enum NatalError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Authorization denied for {capability}: {reason}")]
    AuthorizationDenied {
        capability: Capability,
        reason: String,
    },

    /// A role definition would let one operator class see data reserved
    /// for another. Rejected before persistence.
    #[error("Segregation violation: role '{role}' cannot grant {capability}")]
    SegregationViolation { role: String, capability: Capability },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Referential error: {message}")]
    Referential { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NatalError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

pub type NatalResult<T> = Result<T, NatalError>;
