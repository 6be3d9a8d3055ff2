//! First-start superuser creation.
//!
//! Administration requires `manage_users`, which nobody holds on an empty
//! database. When both bootstrap variables are set and the username is
//! free, a superuser is created directly through the repository.

use natal_auth::AuthConfig;
use natal_auth::password::hash_password;
use natal_core::env::ConfigEnv;
use natal_core::error::{NatalError, NatalResult};
use natal_core::models::user::{CreateUser, User};
use natal_core::repository::UserRepository;
use tracing::info;

pub const BOOTSTRAP_USERNAME_ENV: &str = "NATAL_BOOTSTRAP_USERNAME";
pub const BOOTSTRAP_PASSWORD_ENV: &str = "NATAL_BOOTSTRAP_PASSWORD";
pub const BOOTSTRAP_EMAIL_ENV: &str = "NATAL_BOOTSTRAP_EMAIL";

/// Returns the created user, or `None` when bootstrap is not configured
/// or the account already exists.
pub async fn ensure_superuser<U: UserRepository>(
    users: &U,
    config: &AuthConfig,
    env: &impl ConfigEnv,
) -> NatalResult<Option<User>> {
    let (Some(username), Some(password)) = (
        env.string(BOOTSTRAP_USERNAME_ENV).filter(|u| !u.trim().is_empty()),
        env.string(BOOTSTRAP_PASSWORD_ENV),
    ) else {
        return Ok(None);
    };

    match users.get_by_username(username.trim()).await {
        Ok(_) => return Ok(None),
        Err(NatalError::NotFound { .. }) => {}
        Err(e) => return Err(e),
    }

    if password.chars().count() < config.min_password_length {
        return Err(NatalError::Configuration(format!(
            "{BOOTSTRAP_PASSWORD_ENV} must be at least {} characters",
            config.min_password_length
        )));
    }

    let password_hash =
        hash_password(&password, config.pepper.as_deref()).map_err(NatalError::from)?;
    let username = username.trim().to_string();
    let user = users
        .create(CreateUser {
            email: env
                .string(BOOTSTRAP_EMAIL_ENV)
                .unwrap_or_else(|| format!("{username}@localhost")),
            full_name: "Superusuario".into(),
            username,
            password_hash,
            role_id: None,
            is_superuser: true,
        })
        .await?;

    info!(username = %user.username, "bootstrap superuser created");
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use natal_core::env::MapEnv;
    use natal_db::repository::SurrealUserRepository;
    use surrealdb::Surreal;
    use surrealdb::engine::local::{Db, Mem};

    use super::*;

    async fn users() -> SurrealUserRepository<Db> {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        natal_db::run_migrations(&db).await.unwrap();
        SurrealUserRepository::new(db)
    }

    #[tokio::test]
    async fn nothing_happens_without_configuration() {
        let repo = users().await;
        let created = ensure_superuser(&repo, &AuthConfig::default(), &MapEnv::new())
            .await
            .unwrap();
        assert!(created.is_none());
    }

    #[tokio::test]
    async fn superuser_is_created_once() {
        let repo = users().await;
        let env = MapEnv::new()
            .with(BOOTSTRAP_USERNAME_ENV, "root")
            .with(BOOTSTRAP_PASSWORD_ENV, "a-strong-bootstrap-password");

        let created = ensure_superuser(&repo, &AuthConfig::default(), &env)
            .await
            .unwrap()
            .unwrap();
        assert!(created.is_superuser);
        assert!(created.role_id.is_none());
        assert_eq!(created.email, "root@localhost");

        let again = ensure_superuser(&repo, &AuthConfig::default(), &env)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn short_bootstrap_password_is_a_configuration_error() {
        let repo = users().await;
        let env = MapEnv::new()
            .with(BOOTSTRAP_USERNAME_ENV, "root")
            .with(BOOTSTRAP_PASSWORD_ENV, "short");

        let err = ensure_superuser(&repo, &AuthConfig::default(), &env)
            .await
            .unwrap_err();
        assert!(matches!(err, NatalError::Configuration(_)));
    }
}
