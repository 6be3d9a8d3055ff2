//! SurrealDB implementation of [`BirthRepository`].
//!
//! Every read and write of an existing birth carries a [`RecordScope`];
//! the ownership condition is part of the query so out-of-scope rows are
//! never loaded.

use chrono::{DateTime, Utc};
use natal_core::authz::RecordScope;
use natal_core::error::NatalResult;
use natal_core::models::birth::{
    Anesthesia, Birth, ClinicalDocument, CreateBirth, DeliveryType, UpdateBirth,
};
use natal_core::repository::{BirthRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_uuid, scope_condition};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct BirthRow {
    record_id: String,
    mother_id: String,
    occurred_at: DateTime<Utc>,
    gestational_weeks: Option<u32>,
    delivery_type: String,
    anesthesia: Option<String>,
    partogram: serde_json::Value,
    epicrisis: serde_json::Value,
    registered_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Documents are stored as `{}` until written.
fn document(value: serde_json::Value) -> Option<serde_json::Value> {
    match value {
        serde_json::Value::Object(ref map) if map.is_empty() => None,
        serde_json::Value::Null => None,
        other => Some(other),
    }
}

impl BirthRow {
    fn try_into_birth(self) -> Result<Birth, DbError> {
        Ok(Birth {
            id: parse_uuid(&self.record_id)?,
            mother_id: parse_uuid(&self.mother_id)?,
            occurred_at: self.occurred_at,
            gestational_weeks: self.gestational_weeks,
            delivery_type: parse_enum::<DeliveryType>("delivery_type", &self.delivery_type)?,
            anesthesia: self
                .anesthesia
                .as_deref()
                .map(|v| parse_enum::<Anesthesia>("anesthesia", v))
                .transpose()?,
            partogram: document(self.partogram),
            epicrisis: document(self.epicrisis),
            registered_by: parse_uuid(&self.registered_by)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_BIRTH: &str = "SELECT meta::id(id) AS record_id, * FROM";

/// `UPDATE` under a scope followed by the scoped re-read. Nothing is
/// written when the row is out of scope, and the read then comes back
/// empty.
fn scoped_update_query(sets: &[&str], cond: &str) -> String {
    format!(
        "UPDATE type::record('birth', $id) SET {}, updated_at = time::now() \
         WHERE mother_id != NONE AND {cond} RETURN NONE; \
         {SELECT_BIRTH} type::record('birth', $id) WHERE {cond};",
        sets.join(", ")
    )
}

fn first_birth(rows: Vec<BirthRow>, id: String) -> NatalResult<Birth> {
    let row = rows
        .into_iter()
        .next()
        .ok_or(DbError::NotFound {
            entity: "birth".into(),
            id,
        })?;
    Ok(row.try_into_birth()?)
}

/// SurrealDB implementation of the Birth repository.
#[derive(Clone)]
pub struct SurrealBirthRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealBirthRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> BirthRepository for SurrealBirthRepository<C> {
    async fn create(&self, input: CreateBirth) -> NatalResult<Birth> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('birth', $id) SET \
                 mother_id = $mother_id, \
                 occurred_at = $occurred_at, \
                 gestational_weeks = $gestational_weeks, \
                 delivery_type = $delivery_type, \
                 anesthesia = $anesthesia, \
                 registered_by = $registered_by \
                 RETURN NONE; \
                 {SELECT_BIRTH} type::record('birth', $id);"
            ))
            .bind(("id", id_str.clone()))
            .bind(("mother_id", input.mother_id.to_string()))
            .bind(("occurred_at", input.occurred_at))
            .bind(("gestational_weeks", input.gestational_weeks))
            .bind(("delivery_type", input.delivery_type.as_str().to_string()))
            .bind((
                "anesthesia",
                input.anesthesia.map(|a| a.as_str().to_string()),
            ))
            .bind(("registered_by", input.registered_by.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<BirthRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "birth".into(),
            id: id_str,
        })?;

        Ok(row.try_into_birth()?)
    }

    async fn get(&self, scope: RecordScope, id: Uuid) -> NatalResult<Birth> {
        let id_str = id.to_string();
        let (cond, owner) = scope_condition(scope);

        let mut builder = self
            .db
            .query(format!(
                "{SELECT_BIRTH} type::record('birth', $id) WHERE {cond}"
            ))
            .bind(("id", id_str.clone()));
        if let Some(owner) = owner {
            builder = builder.bind(("owner", owner));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<BirthRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "birth".into(),
            id: id_str,
        })?;

        Ok(row.try_into_birth()?)
    }

    async fn update(&self, scope: RecordScope, id: Uuid, input: UpdateBirth) -> NatalResult<Birth> {
        let mut sets = Vec::new();
        if input.occurred_at.is_some() {
            sets.push("occurred_at = $occurred_at");
        }
        if input.gestational_weeks.is_some() {
            sets.push("gestational_weeks = $gestational_weeks");
        }
        if input.delivery_type.is_some() {
            sets.push("delivery_type = $delivery_type");
        }
        if input.anesthesia.is_some() {
            sets.push("anesthesia = $anesthesia");
        }
        if sets.is_empty() {
            return self.get(scope, id).await;
        }

        let id_str = id.to_string();
        let (cond, owner) = scope_condition(scope);
        let mut builder = self
            .db
            .query(scoped_update_query(&sets, cond))
            .bind(("id", id_str.clone()));
        if let Some(owner) = owner {
            builder = builder.bind(("owner", owner));
        }
        if let Some(v) = input.occurred_at {
            builder = builder.bind(("occurred_at", v));
        }
        if let Some(v) = input.gestational_weeks {
            builder = builder.bind(("gestational_weeks", v));
        }
        if let Some(v) = input.delivery_type {
            builder = builder.bind(("delivery_type", v.as_str().to_string()));
        }
        if let Some(v) = input.anesthesia {
            builder = builder.bind(("anesthesia", v.as_str().to_string()));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<BirthRow> = result.take(1).map_err(DbError::from)?;
        first_birth(rows, id_str)
    }

    async fn set_document(
        &self,
        scope: RecordScope,
        id: Uuid,
        document: ClinicalDocument,
        content: serde_json::Value,
    ) -> NatalResult<Birth> {
        let id_str = id.to_string();
        let (cond, owner) = scope_condition(scope);
        let set = format!("{} = $content", document.column());
        let mut builder = self
            .db
            .query(scoped_update_query(&[set.as_str()], cond))
            .bind(("id", id_str.clone()))
            .bind(("content", content));
        if let Some(owner) = owner {
            builder = builder.bind(("owner", owner));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<BirthRow> = result.take(1).map_err(DbError::from)?;
        first_birth(rows, id_str)
    }

    async fn delete(&self, id: Uuid) -> NatalResult<()> {
        // Newborns belong to the birth and go with it, or neither goes.
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE newborn WHERE birth_id = $id; \
                 DELETE type::record('birth', $id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(
        &self,
        scope: RecordScope,
        pagination: Pagination,
    ) -> NatalResult<PaginatedResult<Birth>> {
        let (cond, owner) = scope_condition(scope);

        let mut count_builder = self.db.query(format!(
            "SELECT count() AS total FROM birth WHERE {cond} GROUP ALL"
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
                "{SELECT_BIRTH} birth WHERE {cond} \
                 ORDER BY occurred_at DESC \
                 LIMIT $limit START $offset"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(owner) = owner {
            builder = builder.bind(("owner", owner));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<BirthRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_birth())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
