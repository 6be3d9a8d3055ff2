//! SurrealDB connection management.

use natal_core::env::{ConfigEnv, ProcessEnv};
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::run_migrations;
use crate::seed::seed_default_roles;

pub const DB_URL_ENV: &str = "NATAL_DB_URL";
pub const DB_NAMESPACE_ENV: &str = "NATAL_DB_NAMESPACE";
pub const DB_DATABASE_ENV: &str = "NATAL_DB_DATABASE";
pub const DB_USERNAME_ENV: &str = "NATAL_DB_USERNAME";
pub const DB_PASSWORD_ENV: &str = "NATAL_DB_PASSWORD";

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket URL (e.g., `127.0.0.1:8000`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials.
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "natal".into(),
            database: "obstetrics".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    pub fn from_env() -> Self {
        Self::from_env_with(&ProcessEnv)
    }

    /// Unset variables keep their [`Default`] value.
    pub fn from_env_with(env: &impl ConfigEnv) -> Self {
        let defaults = Self::default();
        Self {
            url: env.string(DB_URL_ENV).unwrap_or(defaults.url),
            namespace: env.string(DB_NAMESPACE_ENV).unwrap_or(defaults.namespace),
            database: env.string(DB_DATABASE_ENV).unwrap_or(defaults.database),
            username: env.string(DB_USERNAME_ENV).unwrap_or(defaults.username),
            password: env.string(DB_PASSWORD_ENV).unwrap_or(defaults.password),
        }
    }
}

/// Manages a connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Authenticates as root and selects the configured namespace and
    /// database.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;

        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Successfully connected to SurrealDB");

        Ok(Self { db })
    }

    /// Bring the schema up to date and make sure the default roles
    /// exist. Safe to run on every start.
    pub async fn prepare(&self) -> Result<(), DbError> {
        run_migrations(&self.db).await?;
        let seeded = seed_default_roles(&self.db).await?;
        info!(seeded, "Database ready");
        Ok(())
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use natal_core::env::MapEnv;

    use super::*;

    #[test]
    fn env_overrides_defaults() {
        let env = MapEnv::new()
            .with(DB_URL_ENV, "db.hospital.local:8000")
            .with(DB_PASSWORD_ENV, "s3cret");
        let config = DbConfig::from_env_with(&env);
        assert_eq!(config.url, "db.hospital.local:8000");
        assert_eq!(config.password, "s3cret");
        assert_eq!(config.namespace, "natal");
        assert_eq!(config.database, "obstetrics");
    }
}
