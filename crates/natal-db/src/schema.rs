//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Sensitive attributes are stored as
//! an `<field>_encrypted` / `<field>_hash` pair and never in plaintext.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "identity_and_audit",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "clinical_records",
        sql: SCHEMA_V2,
    },
    Migration {
        version: 3,
        name: "append_only_guards",
        sql: SCHEMA_V3,
    },
];

// -----------------------------------------------------------------------
// Schema v1: roles, users, audit trail
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Roles: one boolean column per capability
-- =======================================================================
DEFINE TABLE role SCHEMAFULL;
DEFINE FIELD name ON TABLE role TYPE string;
DEFINE FIELD description ON TABLE role TYPE string DEFAULT '';
DEFINE FIELD create_admission ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD edit_admission ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD view_administrative_dashboard ON TABLE role TYPE bool \
    DEFAULT false;
DEFINE FIELD view_clinical_dashboard ON TABLE role TYPE bool \
    DEFAULT false;
DEFINE FIELD create_birth ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD edit_birth ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD view_all_births ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD edit_partogram ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD edit_epicrisis ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD generate_rem_reports ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD view_audit ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD manage_users ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD hard_delete ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD annex_correction ON TABLE role TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE role TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE role TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_role_name ON TABLE role COLUMNS name UNIQUE;

-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD full_name ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role_id ON TABLE user TYPE option<string>;
DEFINE FIELD is_superuser ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD require_2fa ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE user TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_user_username ON TABLE user COLUMNS username UNIQUE;
DEFINE INDEX idx_user_role ON TABLE user COLUMNS role_id;

-- =======================================================================
-- Audit log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD actor_id ON TABLE audit_log TYPE string READONLY;
DEFINE FIELD actor_username ON TABLE audit_log TYPE string READONLY;
DEFINE FIELD action ON TABLE audit_log TYPE string READONLY;
DEFINE FIELD affected_table ON TABLE audit_log TYPE option<string> \
    READONLY;
DEFINE FIELD affected_id ON TABLE audit_log TYPE option<string> READONLY;
DEFINE FIELD detail_encrypted ON TABLE audit_log TYPE option<string> \
    READONLY;
DEFINE FIELD ip_address ON TABLE audit_log TYPE option<string> READONLY;
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE INDEX idx_audit_time ON TABLE audit_log COLUMNS timestamp;
DEFINE INDEX idx_audit_actor ON TABLE audit_log COLUMNS actor_id;
DEFINE INDEX idx_audit_action ON TABLE audit_log COLUMNS action;
";

// -----------------------------------------------------------------------
// Schema v2: clinical records
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
-- =======================================================================
-- Mothers (admission)
-- =======================================================================
DEFINE TABLE mother SCHEMAFULL;
DEFINE FIELD clinical_record_number ON TABLE mother TYPE option<string>;
DEFINE FIELD address ON TABLE mother TYPE option<string>;
DEFINE FIELD rut_encrypted ON TABLE mother TYPE option<string>;
DEFINE FIELD rut_hash ON TABLE mother TYPE option<string>;
DEFINE FIELD full_name_encrypted ON TABLE mother TYPE option<string>;
DEFINE FIELD full_name_hash ON TABLE mother TYPE option<string>;
DEFINE FIELD phone_encrypted ON TABLE mother TYPE option<string>;
DEFINE FIELD phone_hash ON TABLE mother TYPE option<string>;
DEFINE FIELD birth_date ON TABLE mother TYPE string;
DEFINE FIELD nationality ON TABLE mother TYPE option<string>;
DEFINE FIELD indigenous ON TABLE mother TYPE bool DEFAULT false;
DEFINE FIELD health_insurance ON TABLE mother TYPE option<string> \
    ASSERT $value = NONE \
        OR $value IN ['FONASA', 'ISAPRE', 'PARTICULAR', 'NINGUNA'];
DEFINE FIELD medical_history ON TABLE mother TYPE option<string>;
DEFINE FIELD registered_by ON TABLE mother TYPE string;
DEFINE FIELD created_at ON TABLE mother TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE mother TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_mother_rut_hash ON TABLE mother COLUMNS rut_hash UNIQUE;

-- =======================================================================
-- Births (owned by registered_by)
-- =======================================================================
DEFINE TABLE birth SCHEMAFULL;
DEFINE FIELD mother_id ON TABLE birth TYPE string;
DEFINE FIELD occurred_at ON TABLE birth TYPE datetime;
DEFINE FIELD gestational_weeks ON TABLE birth TYPE option<int>;
DEFINE FIELD delivery_type ON TABLE birth TYPE string \
    ASSERT $value IN ['Eutocic', 'ElectiveCesarean', \
        'EmergencyCesarean', 'Forceps', 'Vacuum'];
DEFINE FIELD anesthesia ON TABLE birth TYPE option<string> \
    ASSERT $value = NONE \
        OR $value IN ['Epidural', 'Spinal', 'General', 'Other', 'None'];
DEFINE FIELD partogram ON TABLE birth TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD epicrisis ON TABLE birth TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD registered_by ON TABLE birth TYPE string;
DEFINE FIELD created_at ON TABLE birth TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE birth TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_birth_mother ON TABLE birth COLUMNS mother_id;
DEFINE INDEX idx_birth_owner ON TABLE birth COLUMNS registered_by;

-- =======================================================================
-- Newborns (owned by registered_by)
-- =======================================================================
DEFINE TABLE newborn SCHEMAFULL;
DEFINE FIELD birth_id ON TABLE newborn TYPE string;
DEFINE FIELD provisional_rut_encrypted ON TABLE newborn \
    TYPE option<string>;
DEFINE FIELD provisional_rut_hash ON TABLE newborn TYPE option<string>;
DEFINE FIELD status ON TABLE newborn TYPE string \
    ASSERT $value IN ['Alive', 'Stillborn'];
DEFINE FIELD sex ON TABLE newborn TYPE option<string> \
    ASSERT $value = NONE OR $value IN ['Male', 'Female', 'Undetermined'];
DEFINE FIELD weight_grams ON TABLE newborn TYPE option<int>;
DEFINE FIELD length_cm ON TABLE newborn TYPE option<float>;
DEFINE FIELD apgar_1_min ON TABLE newborn TYPE option<int>;
DEFINE FIELD apgar_5_min ON TABLE newborn TYPE option<int>;
DEFINE FIELD vitamin_k ON TABLE newborn TYPE bool DEFAULT false;
DEFINE FIELD eye_prophylaxis ON TABLE newborn TYPE bool DEFAULT false;
DEFINE FIELD registered_by ON TABLE newborn TYPE string;
DEFINE FIELD created_at ON TABLE newborn TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_newborn_birth ON TABLE newborn COLUMNS birth_id;
DEFINE INDEX idx_newborn_owner ON TABLE newborn COLUMNS registered_by;

-- =======================================================================
-- Correction annexes (append-only)
-- =======================================================================
DEFINE TABLE correction SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD entity ON TABLE correction TYPE string READONLY \
    ASSERT $value IN ['birth', 'mother', 'newborn'];
DEFINE FIELD target_id ON TABLE correction TYPE string READONLY;
DEFINE FIELD field_name ON TABLE correction TYPE string READONLY;
DEFINE FIELD previous_value_encrypted ON TABLE correction \
    TYPE option<string> READONLY;
DEFINE FIELD new_value_encrypted ON TABLE correction \
    TYPE option<string> READONLY;
DEFINE FIELD justification ON TABLE correction TYPE string READONLY \
    ASSERT string::len(string::trim($value)) >= 20;
DEFINE FIELD author_id ON TABLE correction TYPE string READONLY;
DEFINE FIELD created_at ON TABLE correction TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE INDEX idx_correction_target ON TABLE correction \
    COLUMNS entity, target_id;
";

/// Table permissions do not bind root or system users, and the service
/// connects as one. These events reject the change for every session.
const SCHEMA_V3: &str = "\
DEFINE EVENT audit_log_append_only ON TABLE audit_log \
    WHEN $event IN ['UPDATE', 'DELETE'] THEN { \
        THROW 'audit records are append-only'; \
    };
DEFINE EVENT correction_append_only ON TABLE correction \
    WHEN $event IN ['UPDATE', 'DELETE'] THEN { \
        THROW 'correction annexes are append-only'; \
    };
";

/// Run all pending schema migrations against the given database.
///
/// Idempotent: versions already recorded in `_migration` are skipped.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
