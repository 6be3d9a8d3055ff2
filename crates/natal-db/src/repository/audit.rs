//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! Append and list only. The table rejects updates and deletes for every
//! session, root included: `READONLY` fields plus the
//! `audit_log_append_only` event.

use chrono::{DateTime, Utc};
use natal_core::error::NatalResult;
use natal_core::models::audit::{AuditRecord, CreateAuditRecord};
use natal_core::repository::{AuditLogFilter, AuditLogRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRow {
    record_id: String,
    actor_id: String,
    actor_username: String,
    action: String,
    affected_table: Option<String>,
    affected_id: Option<String>,
    detail_encrypted: Option<String>,
    ip_address: Option<String>,
    timestamp: DateTime<Utc>,
}

impl AuditRow {
    fn try_into_record(self) -> Result<AuditRecord, DbError> {
        Ok(AuditRecord {
            id: parse_uuid(&self.record_id)?,
            actor_id: parse_uuid(&self.actor_id)?,
            actor_username: self.actor_username,
            action: self.action,
            affected_table: self.affected_table,
            affected_id: parse_opt_uuid(self.affected_id.as_deref())?,
            detail_encrypted: self.detail_encrypted,
            ip_address: self.ip_address,
            timestamp: self.timestamp,
        })
    }
}

/// Build the `WHERE` conditions for a filter. Only conditions whose
/// parameter is present are emitted; the caller binds the same set.
fn conditions(filter: &AuditLogFilter) -> Vec<&'static str> {
    let mut conds = Vec::new();
    if filter.actor_id.is_some() {
        conds.push("actor_id = $actor_id");
    }
    if filter.action.is_some() {
        conds.push("action = $action");
    }
    if filter.text.is_some() {
        conds.push(
            "(string::contains(string::lowercase(actor_username), $text) \
             OR string::contains(string::lowercase(action), $text) \
             OR string::contains(string::lowercase(ip_address ?? ''), $text))",
        );
    }
    if filter.from.is_some() {
        conds.push("timestamp >= $from");
    }
    if filter.to.is_some() {
        conds.push("timestamp <= $to");
    }
    conds
}

/// SurrealDB implementation of the audit log repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditRecord) -> NatalResult<AuditRecord> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 actor_id = $actor_id, \
                 actor_username = $actor_username, \
                 action = $action, \
                 affected_table = $affected_table, \
                 affected_id = $affected_id, \
                 detail_encrypted = $detail_encrypted, \
                 ip_address = $ip_address \
                 RETURN NONE; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('audit_log', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("actor_id", input.actor_id.to_string()))
            .bind(("actor_username", input.actor_username))
            .bind(("action", input.action))
            .bind(("affected_table", input.affected_table))
            .bind(("affected_id", input.affected_id.map(|a| a.to_string())))
            .bind(("detail_encrypted", input.detail_encrypted))
            .bind(("ip_address", input.ip_address))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<AuditRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row.try_into_record()?)
    }

    async fn list(&self, filter: AuditLogFilter, limit: u64) -> NatalResult<Vec<AuditRecord>> {
        let conds = conditions(&filter);
        let where_clause = if conds.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conds.join(" AND "))
        };
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM audit_log {where_clause} \
             ORDER BY timestamp DESC LIMIT $limit"
        );

        let mut builder = self.db.query(query).bind(("limit", limit));
        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action));
        }
        if let Some(text) = filter.text {
            builder = builder.bind(("text", text.to_lowercase()));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<AuditRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_record())
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
