//! SurrealDB repository implementations.

mod audit;
mod birth;
mod correction;
mod mother;
mod newborn;
mod role;
mod user;

pub use audit::SurrealAuditLogRepository;
pub use birth::SurrealBirthRepository;
pub use correction::SurrealCorrectionRepository;
pub use mother::SurrealMotherRepository;
pub use newborn::SurrealNewbornRepository;
pub use role::SurrealRoleRepository;
pub use user::SurrealUserRepository;

use natal_core::authz::RecordScope;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

/// Number of users whose `role_id` points at the role.
pub(crate) async fn role_holders<C: Connection>(
    db: &Surreal<C>,
    role_id: Uuid,
) -> Result<u64, DbError> {
    let mut result = db
        .query("SELECT count() AS total FROM user WHERE role_id = $role_id GROUP ALL")
        .bind(("role_id", role_id.to_string()))
        .await?;
    let rows: Vec<CountRow> = result.take(0)?;
    Ok(rows.first().map(|r| r.total).unwrap_or(0))
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Decode(format!("invalid UUID '{s}': {e}")))
}

pub(crate) fn parse_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>, DbError> {
    s.map(parse_uuid).transpose()
}

/// Parse a stored enum string, reporting the column on failure.
pub(crate) fn parse_enum<T: std::str::FromStr<Err = String>>(
    column: &str,
    value: &str,
) -> Result<T, DbError> {
    value
        .parse()
        .map_err(|e: String| DbError::Decode(format!("{column}: {e}")))
}

/// `WHERE`-clause fragment enforcing a [`RecordScope`] on a table with a
/// `registered_by` column, plus the owner to bind as `$owner`.
pub(crate) fn scope_condition(scope: RecordScope) -> (&'static str, Option<String>) {
    match scope.owner() {
        None => ("true", None),
        Some(owner) => ("registered_by = $owner", Some(owner.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_condition_binds_owner() {
        let owner = Uuid::new_v4();
        let (clause, bound) = scope_condition(RecordScope::OwnedBy(owner));
        assert_eq!(clause, "registered_by = $owner");
        assert_eq!(bound, Some(owner.to_string()));

        let (clause, bound) = scope_condition(RecordScope::All);
        assert_eq!(clause, "true");
        assert!(bound.is_none());
    }

    #[test]
    fn bad_uuid_is_a_decode_error() {
        assert!(matches!(parse_uuid("nope"), Err(DbError::Decode(_))));
    }
}
