//! User domain model and effective-capability resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capability::{Capability, CapabilitySet};
use crate::models::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role_id: Option<Uuid>,
    /// Implies every capability except dashboard visibility.
    pub is_superuser: bool,
    /// Gates login. Users are deactivated, never deleted.
    pub active: bool,
    pub require_2fa: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    /// Argon2id PHC string; hashing happens in the auth layer.
    pub password_hash: String,
    pub role_id: Option<Uuid>,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub full_name: Option<String>,
    /// `Some(Some(id))` = assign, `Some(None)` = clear, `None` = no change.
    pub role_id: Option<Option<Uuid>>,
    pub active: Option<bool>,
    pub require_2fa: Option<bool>,
}

/// An authenticated user together with their resolved role.
///
/// This is what the authorization guard reasons about; it is rebuilt per
/// request and never persisted.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub role: Option<Role>,
}

impl Principal {
    pub fn new(user: User, role: Option<Role>) -> Self {
        Self { user, role }
    }

    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    /// Effective capability check.
    ///
    /// Superusers hold every capability except the two dashboard
    /// capabilities, which they never hold, even if their role grants
    /// them. Otherwise the role decides; no role means no capability.
    pub fn has(&self, capability: Capability) -> bool {
        if self.user.is_superuser {
            return !capability.is_dashboard();
        }
        self.role.as_ref().is_some_and(|r| r.has(capability))
    }

    pub fn capabilities(&self) -> CapabilitySet {
        Capability::ALL
            .into_iter()
            .filter(|c| self.has(*c))
            .collect()
    }
}
