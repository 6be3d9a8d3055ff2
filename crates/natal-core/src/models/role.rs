//! Role domain model and segregation-of-duties validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capability::{Capability, CapabilitySet};
use crate::error::{NatalError, NatalResult};

/// Name fragment identifying the system-administration role.
pub const ADMINISTRATIVE_ROLE_MARKER: &str = "admin sistema";

/// Name fragment identifying clinical-operations roles ("Matrona").
pub const CLINICAL_ROLE_MARKER: &str = "matron";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub capabilities: CapabilitySet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub name: String,
    pub description: String,
    pub capabilities: CapabilitySet,
}

impl CreateRole {
    pub fn validate(&self) -> NatalResult<()> {
        validate_role_definition(&self.name, &self.capabilities)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRole {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Replaces the whole capability set when present.
    pub capabilities: Option<CapabilitySet>,
}

impl UpdateRole {
    /// Apply this update to `current` and validate the merged definition.
    pub fn merged_with(&self, current: &Role) -> NatalResult<(String, CapabilitySet)> {
        let name = self.name.clone().unwrap_or_else(|| current.name.clone());
        let capabilities = self
            .capabilities
            .clone()
            .unwrap_or_else(|| current.capabilities.clone());
        validate_role_definition(&name, &capabilities)?;
        Ok((name, capabilities))
    }
}

/// Reject role definitions that breach the clinical/administrative split.
///
/// - A name containing [`ADMINISTRATIVE_ROLE_MARKER`] may not grant either
///   dashboard capability.
/// - A name containing [`CLINICAL_ROLE_MARKER`] may not grant the
///   administrative dashboard.
/// - Any role granting a system-administration capability may not grant
///   either dashboard capability, whatever its name.
pub fn validate_role_definition(name: &str, capabilities: &CapabilitySet) -> NatalResult<()> {
    if name.trim().is_empty() {
        return Err(NatalError::validation("role name must not be empty"));
    }

    let lowered = name.to_lowercase();
    let violation = |capability| NatalError::SegregationViolation {
        role: name.to_string(),
        capability,
    };

    let grants_dashboard = Capability::DASHBOARD
        .into_iter()
        .find(|c| capabilities.contains(*c));

    if lowered.contains(ADMINISTRATIVE_ROLE_MARKER) {
        if let Some(cap) = grants_dashboard {
            return Err(violation(cap));
        }
    }

    if lowered.contains(CLINICAL_ROLE_MARKER)
        && capabilities.contains(Capability::ViewAdministrativeDashboard)
    {
        return Err(violation(Capability::ViewAdministrativeDashboard));
    }

    let is_system_admin = Capability::SYSTEM_ADMIN
        .into_iter()
        .any(|c| capabilities.contains(c));
    if is_system_admin {
        if let Some(cap) = grants_dashboard {
            return Err(violation(cap));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(list: &[Capability]) -> CapabilitySet {
        list.iter().copied().collect()
    }

    #[test]
    fn admin_role_cannot_see_clinical_dashboard() {
        let err = validate_role_definition(
            "Admin Sistema",
            &caps(&[Capability::ManageUsers, Capability::ViewClinicalDashboard]),
        )
        .unwrap_err();
        match err {
            NatalError::SegregationViolation { role, capability } => {
                assert_eq!(role, "Admin Sistema");
                assert_eq!(capability, Capability::ViewClinicalDashboard);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn admin_marker_is_case_insensitive() {
        let result = validate_role_definition(
            "ADMIN SISTEMA regional",
            &caps(&[Capability::ViewAdministrativeDashboard]),
        );
        assert!(matches!(
            result,
            Err(NatalError::SegregationViolation {
                capability: Capability::ViewAdministrativeDashboard,
                ..
            })
        ));
    }

    #[test]
    fn clinical_role_may_see_clinical_but_not_administrative() {
        assert!(
            validate_role_definition(
                "Matrona Clínica",
                &caps(&[Capability::ViewClinicalDashboard, Capability::CreateBirth]),
            )
            .is_ok()
        );
        assert!(matches!(
            validate_role_definition(
                "Matrona Clínica",
                &caps(&[Capability::ViewAdministrativeDashboard]),
            ),
            Err(NatalError::SegregationViolation {
                capability: Capability::ViewAdministrativeDashboard,
                ..
            })
        ));
    }

    #[test]
    fn any_auditor_role_is_kept_away_from_dashboards() {
        assert!(matches!(
            validate_role_definition(
                "Auditor",
                &caps(&[Capability::ViewAudit, Capability::ViewClinicalDashboard]),
            ),
            Err(NatalError::SegregationViolation { .. })
        ));
    }

    #[test]
    fn supervisor_may_hold_both_dashboards() {
        assert!(
            validate_role_definition(
                "Supervisor",
                &caps(&[
                    Capability::ViewClinicalDashboard,
                    Capability::ViewAdministrativeDashboard,
                    Capability::ViewAllBirths,
                ]),
            )
            .is_ok()
        );
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(matches!(
            validate_role_definition("  ", &CapabilitySet::new()),
            Err(NatalError::Validation { .. })
        ));
    }

    #[test]
    fn update_is_validated_against_merged_state() {
        let current = Role {
            id: Uuid::new_v4(),
            name: "Admin Sistema".into(),
            description: String::new(),
            capabilities: caps(&[Capability::ManageUsers]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let update = UpdateRole {
            capabilities: Some(caps(&[
                Capability::ManageUsers,
                Capability::ViewClinicalDashboard,
            ])),
            ..Default::default()
        };
        assert!(update.merged_with(&current).is_err());

        let rename_only = UpdateRole {
            description: Some("Gestión de cuentas".into()),
            ..Default::default()
        };
        let (name, merged) = rename_only.merged_with(&current).unwrap();
        assert_eq!(name, "Admin Sistema");
        assert!(merged.contains(Capability::ManageUsers));
    }
}
