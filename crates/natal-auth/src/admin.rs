//! User and role administration, gated by `manage_users`.
//!
//! Users are never deleted; they are deactivated. Roles may be deleted
//! only once no user holds them.

use natal_core::capability::Capability;
use natal_core::error::{NatalError, NatalResult};
use natal_core::models::role::{CreateRole, Role, UpdateRole};
use natal_core::models::user::{CreateUser, Principal, UpdateUser, User};
use natal_core::repository::{
    AuditLogRepository, PaginatedResult, Pagination, RoleRepository, UserRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::password;
use crate::trail::{AuditEntry, AuditTrail};

/// Request to create an account. The password is plaintext here and is
/// hashed before it leaves this service.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role_id: Option<Uuid>,
    pub is_superuser: bool,
}

pub struct AdminService<U: UserRepository, R: RoleRepository, A: AuditLogRepository> {
    user_repo: U,
    role_repo: R,
    trail: AuditTrail<A>,
    config: AuthConfig,
}

impl<U: UserRepository, R: RoleRepository, A: AuditLogRepository> AdminService<U, R, A> {
    pub fn new(user_repo: U, role_repo: R, trail: AuditTrail<A>, config: AuthConfig) -> Self {
        Self {
            user_repo,
            role_repo,
            trail,
            config,
        }
    }

    /// A role reference must point at an existing role.
    async fn existing_role(&self, role_id: Uuid) -> NatalResult<Role> {
        self.role_repo
            .get_by_id(role_id)
            .await
            .map_err(|e| match e {
                NatalError::NotFound { .. } => NatalError::Referential {
                    message: format!("role {role_id} does not exist"),
                },
                other => other,
            })
    }

    pub async fn create_user(
        &self,
        actor: &Principal,
        input: NewUser,
        ip_address: Option<&str>,
    ) -> NatalResult<User> {
        self.trail
            .authorize(actor, Capability::ManageUsers, ip_address)
            .await?;

        if input.is_superuser && !actor.user.is_superuser {
            return Err(NatalError::AuthorizationDenied {
                capability: Capability::ManageUsers,
                reason: "only a superuser may create another superuser".into(),
            });
        }
        if input.password.chars().count() < self.config.min_password_length {
            return Err(NatalError::validation(format!(
                "password must be at least {} characters",
                self.config.min_password_length
            )));
        }

        let role = match input.role_id {
            Some(role_id) => Some(self.existing_role(role_id).await?),
            None => None,
        };

        let password_hash = password::hash_password(&input.password, self.config.pepper.as_deref())
            .map_err(NatalError::from)?;

        let user = self
            .user_repo
            .create(CreateUser {
                username: input.username,
                email: input.email,
                full_name: input.full_name,
                password_hash,
                role_id: input.role_id,
                is_superuser: input.is_superuser,
            })
            .await?;

        let role_name = role.as_ref().map_or("(none)", |r| r.name.as_str());
        info!(actor = %actor.username(), user = %user.username, role = %role_name, "user created");
        self.trail
            .record_best_effort(
                &actor.user,
                AuditEntry::new("CREATE_USER")
                    .on("user", user.id)
                    .detail(format!("username: {}, role: {role_name}", user.username))
                    .ip(ip_address),
            )
            .await;

        Ok(user)
    }

    /// Deactivate an account. Self-deactivation and deactivating a
    /// superuser are refused.
    pub async fn deactivate_user(
        &self,
        actor: &Principal,
        user_id: Uuid,
        ip_address: Option<&str>,
    ) -> NatalResult<User> {
        self.trail
            .authorize(actor, Capability::ManageUsers, ip_address)
            .await?;

        if user_id == actor.id() {
            return Err(NatalError::validation("users cannot deactivate themselves"));
        }
        let target = self.user_repo.get_by_id(user_id).await?;
        if target.is_superuser {
            return Err(NatalError::validation("superusers cannot be deactivated"));
        }

        let user = self
            .user_repo
            .update(
                user_id,
                UpdateUser {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await?;

        self.trail
            .record_best_effort(
                &actor.user,
                AuditEntry::new("DEACTIVATE_USER")
                    .on("user", user.id)
                    .detail(format!("username: {}", user.username))
                    .ip(ip_address),
            )
            .await;

        Ok(user)
    }

    /// Assign (`Some`) or clear (`None`) a user's role.
    pub async fn assign_role(
        &self,
        actor: &Principal,
        user_id: Uuid,
        role_id: Option<Uuid>,
        ip_address: Option<&str>,
    ) -> NatalResult<User> {
        self.trail
            .authorize(actor, Capability::ManageUsers, ip_address)
            .await?;

        let role = match role_id {
            Some(id) => Some(self.existing_role(id).await?),
            None => None,
        };
        // Surface a missing user as NotFound before writing anything.
        let before = self.user_repo.get_by_id(user_id).await?;

        let user = self
            .user_repo
            .update(
                user_id,
                UpdateUser {
                    role_id: Some(role_id),
                    ..Default::default()
                },
            )
            .await?;

        let role_name = role.as_ref().map_or("(none)", |r| r.name.as_str());
        self.trail
            .record_best_effort(
                &actor.user,
                AuditEntry::new("UPDATE_USER_ROLE")
                    .on("user", user.id)
                    .detail(format!(
                        "username: {}, role: {} -> {role_name}",
                        user.username,
                        before
                            .role_id
                            .map_or_else(|| "(none)".to_string(), |r| r.to_string())
                    ))
                    .ip(ip_address),
            )
            .await;

        Ok(user)
    }

    pub async fn list_users(
        &self,
        actor: &Principal,
        pagination: Pagination,
        ip_address: Option<&str>,
    ) -> NatalResult<PaginatedResult<User>> {
        self.trail
            .authorize(actor, Capability::ManageUsers, ip_address)
            .await?;
        self.user_repo.list(pagination).await
    }

    /// Segregation rules are checked before anything is persisted.
    pub async fn create_role(
        &self,
        actor: &Principal,
        input: CreateRole,
        ip_address: Option<&str>,
    ) -> NatalResult<Role> {
        self.trail
            .authorize(actor, Capability::ManageUsers, ip_address)
            .await?;
        input.validate()?;

        let role = self.role_repo.create(input).await?;
        self.trail
            .record_best_effort(
                &actor.user,
                AuditEntry::new("CREATE_ROLE")
                    .on("role", role.id)
                    .detail(format!("name: {}", role.name))
                    .ip(ip_address),
            )
            .await;
        Ok(role)
    }

    pub async fn update_role(
        &self,
        actor: &Principal,
        role_id: Uuid,
        input: UpdateRole,
        ip_address: Option<&str>,
    ) -> NatalResult<Role> {
        self.trail
            .authorize(actor, Capability::ManageUsers, ip_address)
            .await?;

        let role = self.role_repo.update(role_id, input).await?;
        self.trail
            .record_best_effort(
                &actor.user,
                AuditEntry::new("UPDATE_ROLE")
                    .on("role", role.id)
                    .detail(format!("name: {}", role.name))
                    .ip(ip_address),
            )
            .await;
        Ok(role)
    }

    /// Fails with `Referential` while any user holds the role.
    pub async fn delete_role(
        &self,
        actor: &Principal,
        role_id: Uuid,
        ip_address: Option<&str>,
    ) -> NatalResult<()> {
        self.trail
            .authorize(actor, Capability::ManageUsers, ip_address)
            .await?;

        let role = self.role_repo.get_by_id(role_id).await?;
        self.role_repo.delete(role_id).await?;
        self.trail
            .record_best_effort(
                &actor.user,
                AuditEntry::new("DELETE_ROLE")
                    .on("role", role_id)
                    .detail(format!("name: {}", role.name))
                    .ip(ip_address),
            )
            .await;
        Ok(())
    }

    pub async fn list_roles(
        &self,
        actor: &Principal,
        pagination: Pagination,
        ip_address: Option<&str>,
    ) -> NatalResult<PaginatedResult<Role>> {
        self.trail
            .authorize(actor, Capability::ManageUsers, ip_address)
            .await?;
        self.role_repo.list(pagination).await
    }
}
