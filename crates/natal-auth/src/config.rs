//! Runtime configuration: field-encryption secret and auth settings.

use natal_core::crypto::CryptoService;
use natal_core::env::{ConfigEnv, ProcessEnv};
use tracing::{error, warn};
use zeroize::Zeroizing;

use crate::error::AuthError;

pub const ENCRYPTION_KEY_ENV: &str = "NATAL_ENCRYPTION_KEY";
pub const ENVIRONMENT_ENV: &str = "NATAL_ENVIRONMENT";
pub const PASSWORD_PEPPER_ENV: &str = "NATAL_PASSWORD_PEPPER";
pub const AUDIT_QUERY_LIMIT_ENV: &str = "NATAL_AUDIT_QUERY_LIMIT";

/// Shortest accepted secret, in bytes.
pub const MIN_SECRET_LEN: usize = 16;

/// Fixed secret used only in development when none is configured. Data
/// written with it stays readable across restarts, unlike a random key.
const DEVELOPMENT_SECRET: &str = "natal-development-only-do-not-use-in-production";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Anything other than `development` is treated as production.
    fn parse(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("development") => Environment::Development,
            _ => Environment::Production,
        }
    }
}

/// Where the field-encryption key comes from.
pub struct ProtectionConfig {
    environment: Environment,
    secret: Zeroizing<String>,
}

impl std::fmt::Debug for ProtectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionConfig")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl ProtectionConfig {
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_env_with(&ProcessEnv)
    }

    /// In production a missing or short secret is fatal. In development a
    /// missing secret falls back to a fixed, well-known one.
    pub fn from_env_with(env: &impl ConfigEnv) -> Result<Self, AuthError> {
        let environment = Environment::parse(env.string(ENVIRONMENT_ENV));
        let configured = env
            .string(ENCRYPTION_KEY_ENV)
            .filter(|s| !s.trim().is_empty())
            .map(Zeroizing::new);

        let secret = match (configured, environment) {
            (Some(secret), _) => secret,
            (None, Environment::Development) => {
                warn!(
                    variable = ENCRYPTION_KEY_ENV,
                    "No encryption key configured; using the DEVELOPMENT secret. \
                     Records written now are NOT protected."
                );
                Zeroizing::new(DEVELOPMENT_SECRET.to_string())
            }
            (None, Environment::Production) => {
                error!(variable = ENCRYPTION_KEY_ENV, "Encryption key missing");
                return Err(AuthError::MissingEncryptionKey);
            }
        };

        if environment == Environment::Production && secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::InvalidEncryptionKey(format!(
                "must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        Ok(Self {
            environment,
            secret,
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Build the process-wide crypto service.
    pub fn crypto(&self) -> Result<CryptoService, AuthError> {
        CryptoService::from_secret(self.secret.as_bytes())
            .map_err(|e| AuthError::InvalidEncryptionKey(e.to_string()))
    }
}

/// Configuration for authentication and audit review.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Optional pepper prepended to passwords before Argon2id.
    pub pepper: Option<String>,
    /// Minimum password length for new accounts.
    pub min_password_length: usize,
    /// Upper bound on rows returned by one audit query.
    pub audit_query_limit: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            pepper: None,
            min_password_length: 8,
            audit_query_limit: 200,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self::from_env_with(&ProcessEnv)
    }

    pub fn from_env_with(env: &impl ConfigEnv) -> Self {
        let defaults = Self::default();
        Self {
            pepper: env.string(PASSWORD_PEPPER_ENV).filter(|p| !p.is_empty()),
            audit_query_limit: env
                .string(AUDIT_QUERY_LIMIT_ENV)
                .and_then(|s| s.parse::<u64>().ok())
                .map(|n| n.clamp(1, defaults.audit_query_limit))
                .unwrap_or(defaults.audit_query_limit),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use natal_core::env::MapEnv;

    use super::*;

    #[test]
    fn production_without_key_is_fatal() {
        let err = ProtectionConfig::from_env_with(&MapEnv::new()).unwrap_err();
        assert!(matches!(err, AuthError::MissingEncryptionKey));

        let env = MapEnv::new().with(ENVIRONMENT_ENV, "production");
        assert!(ProtectionConfig::from_env_with(&env).is_err());
    }

    #[test]
    fn production_rejects_short_key() {
        let env = MapEnv::new().with(ENCRYPTION_KEY_ENV, "short");
        let err = ProtectionConfig::from_env_with(&env).unwrap_err();
        assert!(matches!(err, AuthError::InvalidEncryptionKey(_)));
    }

    #[test]
    fn development_falls_back_to_a_stable_secret() {
        let env = MapEnv::new().with(ENVIRONMENT_ENV, "Development");
        let first = ProtectionConfig::from_env_with(&env).unwrap();
        let second = ProtectionConfig::from_env_with(&env).unwrap();
        assert_eq!(first.environment(), Environment::Development);

        // Same secret across "restarts": data stays readable.
        let sealed = first.crypto().unwrap().encrypt("12.345.678-9").unwrap().unwrap();
        assert_eq!(
            second.crypto().unwrap().decrypt(&sealed).as_deref(),
            Some("12.345.678-9")
        );
    }

    #[test]
    fn configured_key_is_used() {
        let env = MapEnv::new().with(ENCRYPTION_KEY_ENV, "a-long-enough-production-secret");
        let config = ProtectionConfig::from_env_with(&env).unwrap();
        assert_eq!(config.environment(), Environment::Production);

        let other = MapEnv::new().with(ENCRYPTION_KEY_ENV, "another-long-production-secret");
        let sealed = config.crypto().unwrap().encrypt("dato").unwrap().unwrap();
        let foreign = ProtectionConfig::from_env_with(&other).unwrap();
        assert_eq!(foreign.crypto().unwrap().decrypt(&sealed), None);
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let env = MapEnv::new().with(ENCRYPTION_KEY_ENV, "a-long-enough-production-secret");
        let config = ProtectionConfig::from_env_with(&env).unwrap();
        assert!(!format!("{config:?}").contains("production-secret"));
    }

    #[test]
    fn audit_limit_never_exceeds_the_default_cap() {
        let env = MapEnv::new().with(AUDIT_QUERY_LIMIT_ENV, "5000");
        assert_eq!(AuthConfig::from_env_with(&env).audit_query_limit, 200);

        let env = MapEnv::new().with(AUDIT_QUERY_LIMIT_ENV, "50");
        assert_eq!(AuthConfig::from_env_with(&env).audit_query_limit, 50);

        let env = MapEnv::new().with(PASSWORD_PEPPER_ENV, "pim");
        assert_eq!(AuthConfig::from_env_with(&env).pepper.as_deref(), Some("pim"));
    }
}
