//! Audit log domain model.
//!
//! Records are append-only. There is deliberately no update input type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor_id: Uuid,
    /// Username snapshot at write time; searchable without a join.
    pub actor_username: String,
    /// Conventionally `VERB_NOUN`, e.g. `CREATE_BIRTH`.
    pub action: String,
    pub affected_table: Option<String>,
    pub affected_id: Option<Uuid>,
    /// Ciphertext of the free-text detail. `None` if no detail was given
    /// or it could not be encrypted.
    pub detail_encrypted: Option<String>,
    pub ip_address: Option<String>,
    /// Assigned by the database at insert.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditRecord {
    pub actor_id: Uuid,
    pub actor_username: String,
    pub action: String,
    pub affected_table: Option<String>,
    pub affected_id: Option<Uuid>,
    pub detail_encrypted: Option<String>,
    pub ip_address: Option<String>,
}
