//! SurrealDB implementation of [`CorrectionRepository`].
//!
//! Corrections are append-only, like the audit log.

use chrono::{DateTime, Utc};
use natal_core::error::NatalResult;
use natal_core::models::correction::{
    CorrectedEntity, Correction, CorrectionTarget, CreateCorrection,
};
use natal_core::repository::CorrectionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CorrectionRow {
    record_id: String,
    entity: String,
    target_id: String,
    field_name: String,
    previous_value_encrypted: Option<String>,
    new_value_encrypted: Option<String>,
    justification: String,
    author_id: String,
    created_at: DateTime<Utc>,
}

impl CorrectionRow {
    fn try_into_correction(self) -> Result<Correction, DbError> {
        Ok(Correction {
            id: parse_uuid(&self.record_id)?,
            target: CorrectionTarget {
                entity: parse_enum::<CorrectedEntity>("entity", &self.entity)?,
                id: parse_uuid(&self.target_id)?,
            },
            field_name: self.field_name,
            previous_value_encrypted: self.previous_value_encrypted,
            new_value_encrypted: self.new_value_encrypted,
            justification: self.justification,
            author_id: parse_uuid(&self.author_id)?,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Correction repository.
#[derive(Clone)]
pub struct SurrealCorrectionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCorrectionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> CorrectionRepository for SurrealCorrectionRepository<C> {
    async fn create(&self, input: CreateCorrection) -> NatalResult<Correction> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('correction', $id) SET \
                 entity = $entity, target_id = $target_id, \
                 field_name = $field_name, \
                 previous_value_encrypted = $previous_value_encrypted, \
                 new_value_encrypted = $new_value_encrypted, \
                 justification = $justification, \
                 author_id = $author_id \
                 RETURN NONE; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('correction', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("entity", input.target.entity.table().to_string()))
            .bind(("target_id", input.target.id.to_string()))
            .bind(("field_name", input.field_name))
            .bind(("previous_value_encrypted", input.previous_value_encrypted))
            .bind(("new_value_encrypted", input.new_value_encrypted))
            .bind(("justification", input.justification))
            .bind(("author_id", input.author_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<CorrectionRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "correction".into(),
            id: id_str,
        })?;

        Ok(row.try_into_correction()?)
    }

    async fn list_for(&self, target: CorrectionTarget) -> NatalResult<Vec<Correction>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM correction \
                 WHERE entity = $entity AND target_id = $target_id \
                 ORDER BY created_at ASC",
            )
            .bind(("entity", target.entity.table().to_string()))
            .bind(("target_id", target.id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CorrectionRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_correction())
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn count_for(&self, target: CorrectionTarget) -> NatalResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM correction \
                 WHERE entity = $entity AND target_id = $target_id GROUP ALL",
            )
            .bind(("entity", target.entity.table().to_string()))
            .bind(("target_id", target.id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
