//! SurrealDB implementation of [`NewbornRepository`].
//!
//! Newborns are scoped by their own `registered_by`, not by the parent
//! birth's author.

use chrono::{DateTime, Utc};
use natal_core::authz::RecordScope;
use natal_core::crypto::SealedField;
use natal_core::error::NatalResult;
use natal_core::models::newborn::{CreateNewborn, Newborn, NewbornStatus, Sex};
use natal_core::repository::{NewbornRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_uuid, scope_condition};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct NewbornRow {
    record_id: String,
    birth_id: String,
    provisional_rut_encrypted: Option<String>,
    provisional_rut_hash: Option<String>,
    status: String,
    sex: Option<String>,
    weight_grams: Option<u32>,
    length_cm: Option<f64>,
    apgar_1_min: Option<u32>,
    apgar_5_min: Option<u32>,
    vitamin_k: bool,
    eye_prophylaxis: bool,
    registered_by: String,
    created_at: DateTime<Utc>,
}

impl NewbornRow {
    fn try_into_newborn(self) -> Result<Newborn, DbError> {
        Ok(Newborn {
            id: parse_uuid(&self.record_id)?,
            birth_id: parse_uuid(&self.birth_id)?,
            provisional_rut: SealedField::from_stored(
                self.provisional_rut_encrypted,
                self.provisional_rut_hash,
            ),
            status: parse_enum::<NewbornStatus>("status", &self.status)?,
            sex: self
                .sex
                .as_deref()
                .map(|v| parse_enum::<Sex>("sex", v))
                .transpose()?,
            weight_grams: self.weight_grams,
            length_cm: self.length_cm,
            apgar_1_min: self.apgar_1_min,
            apgar_5_min: self.apgar_5_min,
            vitamin_k: self.vitamin_k,
            eye_prophylaxis: self.eye_prophylaxis,
            registered_by: parse_uuid(&self.registered_by)?,
            created_at: self.created_at,
        })
    }
}

const SELECT_NEWBORN: &str = "SELECT meta::id(id) AS record_id, * FROM";

/// SurrealDB implementation of the Newborn repository.
#[derive(Clone)]
pub struct SurrealNewbornRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealNewbornRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> NewbornRepository for SurrealNewbornRepository<C> {
    async fn create(&self, input: CreateNewborn) -> NatalResult<Newborn> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let (rut_encrypted, rut_hash) = input.provisional_rut.into_parts();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('newborn', $id) SET \
                 birth_id = $birth_id, \
                 provisional_rut_encrypted = $rut_encrypted, \
                 provisional_rut_hash = $rut_hash, \
                 status = $status, sex = $sex, \
                 weight_grams = $weight_grams, length_cm = $length_cm, \
                 apgar_1_min = $apgar_1_min, apgar_5_min = $apgar_5_min, \
                 vitamin_k = $vitamin_k, \
                 eye_prophylaxis = $eye_prophylaxis, \
                 registered_by = $registered_by \
                 RETURN NONE; \
                 {SELECT_NEWBORN} type::record('newborn', $id);"
            ))
            .bind(("id", id_str.clone()))
            .bind(("birth_id", input.birth_id.to_string()))
            .bind(("rut_encrypted", rut_encrypted))
            .bind(("rut_hash", rut_hash))
            .bind(("status", input.status.as_str().to_string()))
            .bind(("sex", input.sex.map(|s| s.as_str().to_string())))
            .bind(("weight_grams", input.weight_grams))
            .bind(("length_cm", input.length_cm))
            .bind(("apgar_1_min", input.apgar_1_min))
            .bind(("apgar_5_min", input.apgar_5_min))
            .bind(("vitamin_k", input.vitamin_k))
            .bind(("eye_prophylaxis", input.eye_prophylaxis))
            .bind(("registered_by", input.registered_by.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<NewbornRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "newborn".into(),
            id: id_str,
        })?;

        Ok(row.try_into_newborn()?)
    }

    async fn get(&self, scope: RecordScope, id: Uuid) -> NatalResult<Newborn> {
        let id_str = id.to_string();
        let (cond, owner) = scope_condition(scope);

        let mut builder = self
            .db
            .query(format!(
                "{SELECT_NEWBORN} type::record('newborn', $id) WHERE {cond}"
            ))
            .bind(("id", id_str.clone()));
        if let Some(owner) = owner {
            builder = builder.bind(("owner", owner));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<NewbornRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "newborn".into(),
            id: id_str,
        })?;

        Ok(row.try_into_newborn()?)
    }

    async fn list_by_birth(&self, scope: RecordScope, birth_id: Uuid) -> NatalResult<Vec<Newborn>> {
        let (cond, owner) = scope_condition(scope);

        let mut builder = self
            .db
            .query(format!(
                "{SELECT_NEWBORN} newborn WHERE birth_id = $birth_id AND {cond} \
                 ORDER BY created_at ASC"
            ))
            .bind(("birth_id", birth_id.to_string()));
        if let Some(owner) = owner {
            builder = builder.bind(("owner", owner));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<NewbornRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_newborn())
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn list(
        &self,
        scope: RecordScope,
        pagination: Pagination,
    ) -> NatalResult<PaginatedResult<Newborn>> {
        let (cond, owner) = scope_condition(scope);

        let mut count_builder = self.db.query(format!(
            "SELECT count() AS total FROM newborn WHERE {cond} GROUP ALL"
        ));
        if let Some(owner) = owner.clone() {
            count_builder = count_builder.bind(("owner", owner));
        }
        let mut count_result = count_builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut builder = self
            .db
            .query(format!(
                "{SELECT_NEWBORN} newborn WHERE {cond} \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(owner) = owner {
            builder = builder.bind(("owner", owner));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<NewbornRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_newborn())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
