//! Default role catalogue.
//!
//! Seeding is idempotent: a role that already exists by name is left
//! untouched, so operators may tune the defaults after first start.

use natal_core::capability::{Capability, CapabilitySet};
use natal_core::error::NatalError;
use natal_core::models::role::CreateRole;
use natal_core::repository::RoleRepository;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::DbError;
use crate::repository::SurrealRoleRepository;

fn caps(list: &[Capability]) -> CapabilitySet {
    list.iter().copied().collect()
}

/// Roles a fresh installation starts with.
pub fn default_roles() -> Vec<CreateRole> {
    use Capability::*;
    vec![
        CreateRole {
            name: "Matrona Clínica".into(),
            description: "Registers admissions and the births of their own shift".into(),
            capabilities: caps(&[
                CreateAdmission,
                EditAdmission,
                ViewClinicalDashboard,
                CreateBirth,
                EditBirth,
                EditPartogram,
                EditEpicrisis,
                AnnexCorrection,
            ]),
        },
        CreateRole {
            name: "Supervisor".into(),
            description: "Sees every birth, both dashboards and statistical reports".into(),
            capabilities: caps(&[
                CreateAdmission,
                EditAdmission,
                ViewClinicalDashboard,
                ViewAdministrativeDashboard,
                CreateBirth,
                EditBirth,
                ViewAllBirths,
                EditPartogram,
                EditEpicrisis,
                GenerateRemReports,
                AnnexCorrection,
            ]),
        },
        CreateRole {
            name: "Médico".into(),
            description: "Reviews every birth and signs clinical documents".into(),
            capabilities: caps(&[
                ViewClinicalDashboard,
                ViewAllBirths,
                EditBirth,
                EditPartogram,
                EditEpicrisis,
                AnnexCorrection,
            ]),
        },
        CreateRole {
            name: "Admin Sistema".into(),
            description: "User administration and audit review; no clinical views".into(),
            capabilities: caps(&[ManageUsers, ViewAudit, HardDelete]),
        },
    ]
}

/// Create any missing default role. Returns how many were created.
pub async fn seed_default_roles<C: Connection>(db: &Surreal<C>) -> Result<usize, DbError> {
    let repo = SurrealRoleRepository::new(db.clone());
    let mut created = 0;
    for role in default_roles() {
        match repo.get_by_name(&role.name).await {
            Ok(_) => continue,
            Err(NatalError::NotFound { .. }) => {}
            Err(e) => return Err(DbError::Migration(format!("role lookup failed: {e}"))),
        }
        let name = role.name.clone();
        repo.create(role)
            .await
            .map_err(|e| DbError::Migration(format!("seeding role '{name}' failed: {e}")))?;
        info!(role = %name, "Seeded default role");
        created += 1;
    }
    Ok(created)
}
