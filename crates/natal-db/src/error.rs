//! Database-specific error types and conversions.

use natal_core::error::NatalError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// A statement was rejected: an ASSERT, an event or a type mismatch.
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write.
    #[error("Duplicate {entity}")]
    Duplicate { entity: String },

    #[error("Referential integrity: {0}")]
    Referential(String),

    /// A stored row could not be mapped back to its domain type.
    #[error("Corrupt row: {0}")]
    Decode(String),
}

impl DbError {
    /// Classify a failed statement. SurrealDB reports index violations
    /// as "Database index `..` already contains ..".
    pub(crate) fn from_statement(entity: &str, err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            DbError::Duplicate {
                entity: entity.into(),
            }
        } else {
            DbError::Query(message)
        }
    }
}

impl From<DbError> for NatalError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => NatalError::NotFound { entity, id },
            DbError::Duplicate { entity } => NatalError::AlreadyExists { entity },
            DbError::Referential(message) => NatalError::Referential { message },
            other => NatalError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_violation_maps_to_already_exists() {
        let err = DbError::from_statement(
            "mother",
            "Database index `idx_mother_rut_hash` already contains 'abc'",
        );
        assert!(matches!(
            NatalError::from(err),
            NatalError::AlreadyExists { entity } if entity == "mother"
        ));
    }

    #[test]
    fn other_failures_map_to_database() {
        let err = DbError::from_statement("birth", "Found 'X' for field `delivery_type`");
        assert!(matches!(NatalError::from(err), NatalError::Database(_)));
    }

    #[test]
    fn referential_is_preserved() {
        let err = DbError::Referential("role still assigned".into());
        assert!(matches!(
            NatalError::from(err),
            NatalError::Referential { message } if message == "role still assigned"
        ));
    }

    #[test]
    fn not_found_is_preserved() {
        let err = DbError::NotFound {
            entity: "birth".into(),
            id: "42".into(),
        };
        assert!(matches!(NatalError::from(err), NatalError::NotFound { .. }));
    }
}
