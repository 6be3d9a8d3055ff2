//! SurrealDB implementation of [`MotherRepository`].
//!
//! Sealed fields arrive already encrypted; this layer only moves the
//! `<field>_encrypted` / `<field>_hash` pairs in and out.

use chrono::{DateTime, NaiveDate, Utc};
use natal_core::crypto::SealedField;
use natal_core::error::NatalResult;
use natal_core::models::mother::{CreateMother, HealthInsurance, Mother, UpdateMother};
use natal_core::repository::{MotherRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_uuid};
use crate::error::DbError;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, SurrealValue)]
struct MotherRow {
    record_id: String,
    clinical_record_number: Option<String>,
    address: Option<String>,
    rut_encrypted: Option<String>,
    rut_hash: Option<String>,
    full_name_encrypted: Option<String>,
    full_name_hash: Option<String>,
    phone_encrypted: Option<String>,
    phone_hash: Option<String>,
    birth_date: String,
    nationality: Option<String>,
    indigenous: bool,
    health_insurance: Option<String>,
    medical_history: Option<String>,
    registered_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MotherRow {
    fn try_into_mother(self) -> Result<Mother, DbError> {
        let birth_date = NaiveDate::parse_from_str(&self.birth_date, DATE_FORMAT)
            .map_err(|e| DbError::Decode(format!("birth_date: {e}")))?;
        let health_insurance = self
            .health_insurance
            .as_deref()
            .map(|v| parse_enum::<HealthInsurance>("health_insurance", v))
            .transpose()?;
        Ok(Mother {
            id: parse_uuid(&self.record_id)?,
            clinical_record_number: self.clinical_record_number,
            address: self.address,
            rut: SealedField::from_stored(self.rut_encrypted, self.rut_hash),
            full_name: SealedField::from_stored(self.full_name_encrypted, self.full_name_hash),
            phone: SealedField::from_stored(self.phone_encrypted, self.phone_hash),
            birth_date,
            nationality: self.nationality,
            indigenous: self.indigenous,
            health_insurance,
            medical_history: self.medical_history,
            registered_by: parse_uuid(&self.registered_by)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_MOTHER: &str = "SELECT meta::id(id) AS record_id, * FROM";

/// SurrealDB implementation of the Mother repository.
#[derive(Clone)]
pub struct SurrealMotherRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMotherRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> MotherRepository for SurrealMotherRepository<C> {
    async fn create(&self, input: CreateMother) -> NatalResult<Mother> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let (rut_encrypted, rut_hash) = input.rut.into_parts();
        let (full_name_encrypted, full_name_hash) = input.full_name.into_parts();
        let (phone_encrypted, phone_hash) = input.phone.into_parts();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('mother', $id) SET \
                 clinical_record_number = $clinical_record_number, \
                 address = $address, \
                 rut_encrypted = $rut_encrypted, rut_hash = $rut_hash, \
                 full_name_encrypted = $full_name_encrypted, \
                 full_name_hash = $full_name_hash, \
                 phone_encrypted = $phone_encrypted, phone_hash = $phone_hash, \
                 birth_date = $birth_date, \
                 nationality = $nationality, \
                 indigenous = $indigenous, \
                 health_insurance = $health_insurance, \
                 medical_history = $medical_history, \
                 registered_by = $registered_by \
                 RETURN NONE; \
                 {SELECT_MOTHER} type::record('mother', $id);"
            ))
            .bind(("id", id_str.clone()))
            .bind(("clinical_record_number", input.clinical_record_number))
            .bind(("address", input.address))
            .bind(("rut_encrypted", rut_encrypted))
            .bind(("rut_hash", rut_hash))
            .bind(("full_name_encrypted", full_name_encrypted))
            .bind(("full_name_hash", full_name_hash))
            .bind(("phone_encrypted", phone_encrypted))
            .bind(("phone_hash", phone_hash))
            .bind((
                "birth_date",
                input.birth_date.format(DATE_FORMAT).to_string(),
            ))
            .bind(("nationality", input.nationality))
            .bind(("indigenous", input.indigenous))
            .bind((
                "health_insurance",
                input.health_insurance.map(|h| h.as_str().to_string()),
            ))
            .bind(("medical_history", input.medical_history))
            .bind(("registered_by", input.registered_by.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("mother", e))?;

        let rows: Vec<MotherRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "mother".into(),
            id: id_str,
        })?;

        Ok(row.try_into_mother()?)
    }

    async fn get_by_id(&self, id: Uuid) -> NatalResult<Mother> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!("{SELECT_MOTHER} type::record('mother', $id)"))
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MotherRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "mother".into(),
            id: id_str,
        })?;

        Ok(row.try_into_mother()?)
    }

    async fn get_by_rut_hash(&self, hash: &str) -> NatalResult<Mother> {
        let mut result = self
            .db
            .query(format!("{SELECT_MOTHER} mother WHERE rut_hash = $hash"))
            .bind(("hash", hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MotherRow> = result.take(0).map_err(DbError::from)?;
        // The hash itself is not echoed into errors or logs.
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "mother".into(),
            id: "rut".into(),
        })?;

        Ok(row.try_into_mother()?)
    }

    async fn update(&self, id: Uuid, input: UpdateMother) -> NatalResult<Mother> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.clinical_record_number.is_some() {
            sets.push("clinical_record_number = $clinical_record_number");
        }
        if input.address.is_some() {
            sets.push("address = $address");
        }
        if input.rut.is_some() {
            sets.push("rut_encrypted = $rut_encrypted, rut_hash = $rut_hash");
        }
        if input.full_name.is_some() {
            sets.push("full_name_encrypted = $full_name_encrypted, full_name_hash = $full_name_hash");
        }
        if input.phone.is_some() {
            sets.push("phone_encrypted = $phone_encrypted, phone_hash = $phone_hash");
        }
        if input.nationality.is_some() {
            sets.push("nationality = $nationality");
        }
        if input.indigenous.is_some() {
            sets.push("indigenous = $indigenous");
        }
        if input.health_insurance.is_some() {
            sets.push("health_insurance = $health_insurance");
        }
        if input.medical_history.is_some() {
            sets.push("medical_history = $medical_history");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('mother', $id) SET {} \
             WHERE birth_date != NONE RETURN NONE; \
             {SELECT_MOTHER} type::record('mother', $id);",
            sets.join(", ")
        );

        let mut builder = self.db.query(query).bind(("id", id_str.clone()));

        if let Some(v) = input.clinical_record_number {
            builder = builder.bind(("clinical_record_number", v));
        }
        if let Some(v) = input.address {
            builder = builder.bind(("address", v));
        }
        if let Some(field) = input.rut {
            let (encrypted, hash) = field.into_parts();
            builder = builder
                .bind(("rut_encrypted", encrypted))
                .bind(("rut_hash", hash));
        }
        if let Some(field) = input.full_name {
            let (encrypted, hash) = field.into_parts();
            builder = builder
                .bind(("full_name_encrypted", encrypted))
                .bind(("full_name_hash", hash));
        }
        if let Some(field) = input.phone {
            let (encrypted, hash) = field.into_parts();
            builder = builder
                .bind(("phone_encrypted", encrypted))
                .bind(("phone_hash", hash));
        }
        if let Some(v) = input.nationality {
            builder = builder.bind(("nationality", v));
        }
        if let Some(v) = input.indigenous {
            builder = builder.bind(("indigenous", v));
        }
        if let Some(v) = input.health_insurance {
            builder = builder.bind(("health_insurance", v.as_str().to_string()));
        }
        if let Some(v) = input.medical_history {
            builder = builder.bind(("medical_history", v));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("mother", e))?;

        let rows: Vec<MotherRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "mother".into(),
            id: id_str,
        })?;

        Ok(row.try_into_mother()?)
    }

    async fn list(&self, pagination: Pagination) -> NatalResult<PaginatedResult<Mother>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM mother GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "{SELECT_MOTHER} mother \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MotherRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_mother())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
