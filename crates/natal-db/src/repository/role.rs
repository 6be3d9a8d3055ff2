//! SurrealDB implementation of [`RoleRepository`].
//!
//! Capabilities are stored as one boolean column per [`Capability`], so
//! the row struct and the `SET` clauses are both derived from
//! [`Capability::ALL`].

use chrono::{DateTime, Utc};
use natal_core::capability::{Capability, CapabilitySet};
use natal_core::error::NatalResult;
use natal_core::models::role::{CreateRole, Role, UpdateRole};
use natal_core::repository::{PaginatedResult, Pagination, RoleRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid, role_holders};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RoleRow {
    record_id: String,
    name: String,
    description: String,
    create_admission: bool,
    edit_admission: bool,
    view_administrative_dashboard: bool,
    view_clinical_dashboard: bool,
    create_birth: bool,
    edit_birth: bool,
    view_all_births: bool,
    edit_partogram: bool,
    edit_epicrisis: bool,
    generate_rem_reports: bool,
    view_audit: bool,
    manage_users: bool,
    hard_delete: bool,
    annex_correction: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn flag(&self, capability: Capability) -> bool {
        match capability {
            Capability::CreateAdmission => self.create_admission,
            Capability::EditAdmission => self.edit_admission,
            Capability::ViewAdministrativeDashboard => self.view_administrative_dashboard,
            Capability::ViewClinicalDashboard => self.view_clinical_dashboard,
            Capability::CreateBirth => self.create_birth,
            Capability::EditBirth => self.edit_birth,
            Capability::ViewAllBirths => self.view_all_births,
            Capability::EditPartogram => self.edit_partogram,
            Capability::EditEpicrisis => self.edit_epicrisis,
            Capability::GenerateRemReports => self.generate_rem_reports,
            Capability::ViewAudit => self.view_audit,
            Capability::ManageUsers => self.manage_users,
            Capability::HardDelete => self.hard_delete,
            Capability::AnnexCorrection => self.annex_correction,
        }
    }

    fn try_into_role(self) -> Result<Role, DbError> {
        let capabilities = Capability::ALL
            .into_iter()
            .filter(|c| self.flag(*c))
            .collect();
        Ok(Role {
            id: parse_uuid(&self.record_id)?,
            name: self.name,
            description: self.description,
            capabilities,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// `name = $name, ..., annex_correction = $annex_correction`
fn set_clause(extra: &[&str]) -> String {
    extra
        .iter()
        .map(|s| s.to_string())
        .chain(
            Capability::ALL
                .into_iter()
                .map(|c| format!("{0} = ${0}", c.as_str())),
        )
        .collect::<Vec<_>>()
        .join(", ")
}

/// SurrealDB implementation of the Role repository.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn write(
        &self,
        statement: &str,
        id: Uuid,
        name: String,
        description: String,
        capabilities: &CapabilitySet,
    ) -> NatalResult<Role> {
        let id_str = id.to_string();
        let query = format!(
            "{statement} SET {} RETURN NONE; \
             SELECT meta::id(id) AS record_id, * FROM type::record('role', $id);",
            set_clause(&[
                "name = $name",
                "description = $description",
                "updated_at = time::now()",
            ])
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("name", name))
            .bind(("description", description));
        for cap in Capability::ALL {
            builder = builder.bind((cap.as_str(), capabilities.contains(cap)));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("role", e))?;

        let rows: Vec<RoleRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;

        Ok(row.try_into_role()?)
    }

    async fn select_one(&self, clause: &str, key: &str, value: String) -> NatalResult<Role> {
        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM {clause}"
            ))
            .bind((key.to_string(), value.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: value,
        })?;

        Ok(row.try_into_role()?)
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> NatalResult<Role> {
        input.validate()?;
        let id = Uuid::new_v4();
        self.write(
            "CREATE type::record('role', $id)",
            id,
            input.name.trim().to_string(),
            input.description,
            &input.capabilities,
        )
        .await
    }

    async fn get_by_id(&self, id: Uuid) -> NatalResult<Role> {
        self.select_one("type::record('role', $id)", "id", id.to_string())
            .await
    }

    async fn get_by_name(&self, name: &str) -> NatalResult<Role> {
        self.select_one("role WHERE name = $name", "name", name.to_string())
            .await
    }

    async fn update(&self, id: Uuid, input: UpdateRole) -> NatalResult<Role> {
        let current = self.get_by_id(id).await?;
        // Validated against the merged result, not the patch alone.
        let (name, capabilities) = input.merged_with(&current)?;
        let description = input.description.unwrap_or(current.description);
        self.write(
            "UPDATE type::record('role', $id)",
            id,
            name,
            description,
            &capabilities,
        )
        .await
    }

    async fn delete(&self, id: Uuid) -> NatalResult<()> {
        let holders = role_holders(&self.db, id).await?;
        if holders > 0 {
            return Err(DbError::Referential(format!(
                "role {id} is still assigned to {holders} user(s)"
            ))
            .into());
        }

        self.db
            .query("DELETE type::record('role', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> NatalResult<PaginatedResult<Role>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM role GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 ORDER BY name ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_role())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
