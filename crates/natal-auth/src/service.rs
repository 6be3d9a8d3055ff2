//! Authentication service: login, logout and 2FA lifecycle auditing.

use natal_core::error::{NatalError, NatalResult};
use natal_core::models::audit::AuditRecord;
use natal_core::models::user::{Principal, User};
use natal_core::repository::{AuditLogRepository, RoleRepository, UserRepository};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::trail::{AuditEntry, AuditTrail};

pub const LOGIN: &str = "LOGIN";
pub const LOGIN_FAILED: &str = "LOGIN_FAILED";
pub const LOGOUT: &str = "LOGOUT";

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
    pub ip_address: Option<String>,
}

/// Second-factor lifecycle events reported by the external 2FA library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoFactorEvent {
    Enabled,
    Disabled,
    Verified,
    Failed,
}

impl TwoFactorEvent {
    pub fn action(self) -> &'static str {
        match self {
            TwoFactorEvent::Enabled => "2FA_ENABLED",
            TwoFactorEvent::Disabled => "2FA_DISABLED",
            TwoFactorEvent::Verified => "2FA_VERIFIED",
            TwoFactorEvent::Failed => "2FA_FAILED",
        }
    }
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<U: UserRepository, R: RoleRepository, A: AuditLogRepository> {
    user_repo: U,
    role_repo: R,
    trail: AuditTrail<A>,
    config: AuthConfig,
}

impl<U: UserRepository, R: RoleRepository, A: AuditLogRepository> AuthService<U, R, A> {
    pub fn new(user_repo: U, role_repo: R, trail: AuditTrail<A>, config: AuthConfig) -> Self {
        Self {
            user_repo,
            role_repo,
            trail,
            config,
        }
    }

    /// Verify credentials and return the authenticated principal.
    ///
    /// An unknown username and a wrong password yield the same error. A
    /// wrong password for a known user is audited against that user.
    pub async fn login(&self, input: LoginInput) -> NatalResult<Principal> {
        let ip = input.ip_address.as_deref();

        let user = match self.user_repo.get_by_username(input.username.trim()).await {
            Ok(u) => u,
            Err(NatalError::NotFound { .. }) => {
                info!(username = %input.username, "login for unknown user");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let valid = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )
        .map_err(NatalError::from)?;

        if !valid {
            self.trail
                .record_best_effort(
                    &user,
                    AuditEntry::new(LOGIN_FAILED)
                        .on("user", user.id)
                        .detail("wrong password")
                        .ip(ip),
                )
                .await;
            return Err(AuthError::InvalidCredentials.into());
        }

        if !user.active {
            self.trail
                .record_best_effort(
                    &user,
                    AuditEntry::new(LOGIN_FAILED)
                        .on("user", user.id)
                        .detail("inactive account")
                        .ip(ip),
                )
                .await;
            return Err(AuthError::AccountInactive.into());
        }

        let principal = self.resolve(user).await?;
        self.trail
            .record(
                &principal.user,
                AuditEntry::new(LOGIN).on("user", principal.id()).ip(ip),
            )
            .await?;

        info!(user = %principal.username(), "login");
        Ok(principal)
    }

    /// Record the end of a session.
    pub async fn logout(&self, principal: &Principal, ip_address: Option<&str>) -> NatalResult<()> {
        self.trail
            .record(
                &principal.user,
                AuditEntry::new(LOGOUT)
                    .on("user", principal.id())
                    .ip(ip_address),
            )
            .await?;
        Ok(())
    }

    /// Rebuild the principal for a user id, e.g. at the start of a request.
    pub async fn principal(&self, user_id: Uuid) -> NatalResult<Principal> {
        let user = self.user_repo.get_by_id(user_id).await?;
        self.resolve(user).await
    }

    pub async fn record_two_factor_event(
        &self,
        principal: &Principal,
        event: TwoFactorEvent,
        ip_address: Option<&str>,
    ) -> NatalResult<AuditRecord> {
        self.trail
            .record(
                &principal.user,
                AuditEntry::new(event.action())
                    .on("user", principal.id())
                    .ip(ip_address),
            )
            .await
    }

    /// A dangling role reference resolves to no role, which grants nothing.
    async fn resolve(&self, user: User) -> NatalResult<Principal> {
        let role = match user.role_id {
            None => None,
            Some(role_id) => match self.role_repo.get_by_id(role_id).await {
                Ok(role) => Some(role),
                Err(NatalError::NotFound { .. }) => {
                    warn!(user = %user.username, %role_id, "user references a missing role");
                    None
                }
                Err(e) => return Err(e),
            },
        };
        Ok(Principal::new(user, role))
    }
}
