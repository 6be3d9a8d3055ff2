//! Authorization guard, row-level record scoping and dashboard
//! segregation.
//!
//! Everything here is a pure function of a [`Principal`]: no I/O, no
//! shared state, safe to call from any number of request tasks.

use uuid::Uuid;

use crate::capability::Capability;
use crate::error::NatalError;
use crate::models::user::Principal;

/// Outcome of a capability check. Callers decide what a denial means
/// (redirect, 403, hidden control).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert a denial into [`NatalError::AuthorizationDenied`].
    pub fn into_result(self, capability: Capability) -> Result<(), NatalError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(NatalError::AuthorizationDenied { capability, reason }),
        }
    }
}

/// Which rows of an owned entity (births, newborns) a read or write may
/// touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    All,
    OwnedBy(Uuid),
}

impl RecordScope {
    /// Whether a record authored by `author` is visible under this scope.
    pub fn permits(&self, author: Uuid) -> bool {
        match self {
            RecordScope::All => true,
            RecordScope::OwnedBy(owner) => *owner == author,
        }
    }

    pub fn owner(&self) -> Option<Uuid> {
        match self {
            RecordScope::All => None,
            RecordScope::OwnedBy(owner) => Some(*owner),
        }
    }
}

/// Which aggregate view(s) a user may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardView {
    NoDashboard,
    ClinicalOnly,
    AdministrativeOnly,
    Both,
}

impl DashboardView {
    pub fn allows_clinical(self) -> bool {
        matches!(self, DashboardView::ClinicalOnly | DashboardView::Both)
    }

    pub fn allows_administrative(self) -> bool {
        matches!(self, DashboardView::AdministrativeOnly | DashboardView::Both)
    }
}

/// The single choke point for capability checks.
pub struct AuthorizationGuard;

impl AuthorizationGuard {
    pub fn require(principal: &Principal, capability: Capability) -> Decision {
        if !principal.user.active {
            return Decision::Deny("account is inactive".into());
        }
        if principal.has(capability) {
            Decision::Allow
        } else {
            Decision::Deny(format!(
                "user '{}' lacks capability {capability}",
                principal.username()
            ))
        }
    }

    /// Shorthand for `require(..).is_allowed()`.
    pub fn allowed(principal: &Principal, capability: Capability) -> bool {
        Self::require(principal, capability).is_allowed()
    }

    /// Row-level scope for births and newborns. Without
    /// [`Capability::ViewAllBirths`] a user only reaches records they
    /// authored.
    pub fn scope(principal: &Principal) -> RecordScope {
        if Self::allowed(principal, Capability::ViewAllBirths) {
            RecordScope::All
        } else {
            RecordScope::OwnedBy(principal.id())
        }
    }
}

/// Dashboard segregation policy: which aggregate views a user may
/// request. Recomputed per request; nothing is stored.
pub struct DashboardSegregation;

impl DashboardSegregation {
    /// Anyone holding a system-administration capability resolves to
    /// [`DashboardView::NoDashboard`] regardless of dashboard flags.
    pub fn resolve(principal: &Principal) -> DashboardView {
        if Capability::SYSTEM_ADMIN
            .into_iter()
            .any(|c| AuthorizationGuard::allowed(principal, c))
        {
            return DashboardView::NoDashboard;
        }

        let clinical = AuthorizationGuard::allowed(principal, Capability::ViewClinicalDashboard);
        let administrative =
            AuthorizationGuard::allowed(principal, Capability::ViewAdministrativeDashboard);
        match (clinical, administrative) {
            (true, true) => DashboardView::Both,
            (true, false) => DashboardView::ClinicalOnly,
            (false, true) => DashboardView::AdministrativeOnly,
            (false, false) => DashboardView::NoDashboard,
        }
    }
}
