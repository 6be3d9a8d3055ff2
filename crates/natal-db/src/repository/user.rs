//! SurrealDB implementation of [`UserRepository`].
//!
//! Passwords arrive already hashed; this layer never sees plaintext.

use chrono::{DateTime, Utc};
use natal_core::error::{NatalError, NatalResult};
use natal_core::models::user::{CreateUser, UpdateUser, User};
use natal_core::repository::{PaginatedResult, Pagination, UserRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_opt_uuid, parse_uuid, role_holders};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    username: String,
    email: String,
    full_name: String,
    password_hash: String,
    role_id: Option<String>,
    is_superuser: bool,
    active: bool,
    require_2fa: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_uuid(&self.record_id)?,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            password_hash: self.password_hash,
            role_id: parse_opt_uuid(self.role_id.as_deref())?,
            is_superuser: self.is_superuser,
            active: self.active,
            require_2fa: self.require_2fa,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_USER: &str = "SELECT meta::id(id) AS record_id, * FROM";

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> NatalResult<User> {
        let username = input.username.trim().to_string();
        if username.is_empty() {
            return Err(NatalError::validation("username must not be empty"));
        }
        if !input.password_hash.starts_with("$argon2") {
            return Err(NatalError::validation("password must be stored as an Argon2 hash"));
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 username = $username, email = $email, \
                 full_name = $full_name, \
                 password_hash = $password_hash, \
                 role_id = $role_id, \
                 is_superuser = $is_superuser, \
                 active = true, require_2fa = false \
                 RETURN NONE; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('user', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("username", username))
            .bind(("email", input.email))
            .bind(("full_name", input.full_name))
            .bind(("password_hash", input.password_hash))
            .bind(("role_id", input.role_id.map(|r| r.to_string())))
            .bind(("is_superuser", input.is_superuser))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.try_into_user()?)
    }

    async fn get_by_id(&self, id: Uuid) -> NatalResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!("{SELECT_USER} type::record('user', $id)"))
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.try_into_user()?)
    }

    async fn get_by_username(&self, username: &str) -> NatalResult<User> {
        let mut result = self
            .db
            .query(format!("{SELECT_USER} user WHERE username = $username"))
            .bind(("username", username.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("username={username}"),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> NatalResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.full_name.is_some() {
            sets.push("full_name = $full_name");
        }
        if input.role_id.is_some() {
            sets.push("role_id = $role_id");
        }
        if input.active.is_some() {
            sets.push("active = $active");
        }
        if input.require_2fa.is_some() {
            sets.push("require_2fa = $require_2fa");
        }
        sets.push("updated_at = time::now()");

        // The WHERE guard keeps UPDATE from materializing a missing record.
        let query = format!(
            "UPDATE type::record('user', $id) SET {} \
             WHERE username != NONE RETURN NONE; \
             {SELECT_USER} type::record('user', $id);",
            sets.join(", ")
        );

        let mut builder = self.db.query(query).bind(("id", id_str.clone()));

        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(full_name) = input.full_name {
            builder = builder.bind(("full_name", full_name));
        }
        if let Some(role_id) = input.role_id {
            // Some(Some(id)) = assign, Some(None) = clear
            builder = builder.bind(("role_id", role_id.map(|r| r.to_string())));
        }
        if let Some(active) = input.active {
            builder = builder.bind(("active", active));
        }
        if let Some(require_2fa) = input.require_2fa {
            builder = builder.bind(("require_2fa", require_2fa));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.try_into_user()?)
    }

    async fn count_by_role(&self, role_id: Uuid) -> NatalResult<u64> {
        Ok(role_holders(&self.db, role_id).await?)
    }

    async fn list(&self, pagination: Pagination) -> NatalResult<PaginatedResult<User>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "{SELECT_USER} user \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
