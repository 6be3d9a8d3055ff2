//! The enumerated capability surface shared by roles and users.
//!
//! Each capability maps to one boolean column on the `role` table. A
//! single lookup path ([`CapabilitySet::contains`]) replaces per-flag
//! accessors; the superuser and segregation overrides live in
//! [`crate::models::user::Principal::has`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreateAdmission,
    EditAdmission,
    ViewAdministrativeDashboard,
    ViewClinicalDashboard,
    CreateBirth,
    EditBirth,
    /// Absent: list and edit paths are narrowed to records the user authored.
    ViewAllBirths,
    EditPartogram,
    EditEpicrisis,
    GenerateRemReports,
    ViewAudit,
    ManageUsers,
    HardDelete,
    AnnexCorrection,
}

impl Capability {
    pub const ALL: [Capability; 14] = [
        Capability::CreateAdmission,
        Capability::EditAdmission,
        Capability::ViewAdministrativeDashboard,
        Capability::ViewClinicalDashboard,
        Capability::CreateBirth,
        Capability::EditBirth,
        Capability::ViewAllBirths,
        Capability::EditPartogram,
        Capability::EditEpicrisis,
        Capability::GenerateRemReports,
        Capability::ViewAudit,
        Capability::ManageUsers,
        Capability::HardDelete,
        Capability::AnnexCorrection,
    ];

    /// Capabilities that reveal aggregated patient data.
    pub const DASHBOARD: [Capability; 2] = [
        Capability::ViewClinicalDashboard,
        Capability::ViewAdministrativeDashboard,
    ];

    /// Capabilities that mark the system-administration class.
    pub const SYSTEM_ADMIN: [Capability; 2] = [Capability::ManageUsers, Capability::ViewAudit];

    /// Column name on the `role` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::CreateAdmission => "create_admission",
            Capability::EditAdmission => "edit_admission",
            Capability::ViewAdministrativeDashboard => "view_administrative_dashboard",
            Capability::ViewClinicalDashboard => "view_clinical_dashboard",
            Capability::CreateBirth => "create_birth",
            Capability::EditBirth => "edit_birth",
            Capability::ViewAllBirths => "view_all_births",
            Capability::EditPartogram => "edit_partogram",
            Capability::EditEpicrisis => "edit_epicrisis",
            Capability::GenerateRemReports => "generate_rem_reports",
            Capability::ViewAudit => "view_audit",
            Capability::ManageUsers => "manage_users",
            Capability::HardDelete => "hard_delete",
            Capability::AnnexCorrection => "annex_correction",
        }
    }

    pub fn is_dashboard(self) -> bool {
        Self::DASHBOARD.contains(&self)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCapability(pub String);

impl fmt::Display for UnknownCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown capability: {}", self.0)
    }
}

impl std::error::Error for UnknownCapability {}

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

/// The set of capabilities granted by a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn insert(&mut self, capability: Capability) -> bool {
        self.0.insert(capability)
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
