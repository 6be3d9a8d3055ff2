//! Append-only audit trail over [`AuditLogRepository`].
//!
//! Details are encrypted before they reach storage. Reads are gated by
//! `view_audit`, capped, and decrypt each row independently so a single
//! unreadable detail never fails the whole query.

use chrono::{DateTime, Utc};
use natal_core::authz::AuthorizationGuard;
use natal_core::capability::Capability;
use natal_core::crypto::{CryptoError, CryptoService};
use natal_core::error::NatalResult;
use natal_core::models::audit::{AuditRecord, CreateAuditRecord};
use natal_core::models::user::{Principal, User};
use natal_core::repository::{AuditLogFilter, AuditLogRepository};
use tracing::warn;
use uuid::Uuid;

pub const ACCESS_DENIED: &str = "ACCESS_DENIED";

/// Suffix appended to the action when the detail could not be sealed.
pub const DETAIL_UNAVAILABLE_SUFFIX: &str = "_DETAIL_UNAVAILABLE";

/// One action to be written to the trail.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    action: String,
    affected_table: Option<String>,
    affected_id: Option<Uuid>,
    detail: Option<String>,
    ip_address: Option<String>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            affected_table: None,
            affected_id: None,
            detail: None,
            ip_address: None,
        }
    }

    /// The record the action touched.
    pub fn on(mut self, table: &str, id: Uuid) -> Self {
        self.affected_table = Some(table.to_string());
        self.affected_id = Some(id);
        self
    }

    /// Free-text detail; stored encrypted.
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn ip(mut self, ip_address: Option<&str>) -> Self {
        self.ip_address = ip_address.map(str::to_string);
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

/// Filters accepted by [`AuditTrail::query`].
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    /// Matched against actor username, action and IP address only.
    pub text: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Clamped to the configured maximum.
    pub limit: Option<u64>,
}

/// An audit record as shown to a reviewer, detail decrypted.
#[derive(Debug, Clone)]
pub struct AuditView {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub actor_username: String,
    pub action: String,
    pub affected_table: Option<String>,
    pub affected_id: Option<Uuid>,
    /// `None` when no detail was stored or it no longer decrypts.
    pub detail: Option<String>,
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

fn degraded_action(action: &str) -> String {
    format!("{action}{DETAIL_UNAVAILABLE_SUFFIX}")
}

/// Audit trail service. Clones share the repository handle and key.
#[derive(Clone)]
pub struct AuditTrail<A: AuditLogRepository> {
    repo: A,
    crypto: CryptoService,
    max_rows: u64,
}

impl<A: AuditLogRepository> AuditTrail<A> {
    pub fn new(repo: A, crypto: CryptoService, max_rows: u64) -> Self {
        Self {
            repo,
            crypto,
            max_rows: max_rows.max(1),
        }
    }

    /// Append one record. A detail that cannot be encrypted is dropped and
    /// the action is marked, but the record itself is always written.
    pub async fn record(&self, actor: &User, entry: AuditEntry) -> NatalResult<AuditRecord> {
        self.write(actor, entry, |detail| self.crypto.encrypt(detail)).await
    }

    async fn write(
        &self,
        actor: &User,
        entry: AuditEntry,
        seal: impl FnOnce(&str) -> Result<Option<String>, CryptoError>,
    ) -> NatalResult<AuditRecord> {
        let AuditEntry {
            mut action,
            affected_table,
            affected_id,
            detail,
            ip_address,
        } = entry;

        let detail_encrypted = match detail.as_deref().map(seal) {
            None => None,
            Some(Ok(sealed)) => sealed,
            Some(Err(e)) => {
                warn!(
                    actor = %actor.username,
                    action = %action,
                    error = %e,
                    "audit detail could not be encrypted; writing without it"
                );
                action = degraded_action(&action);
                None
            }
        };

        self.repo
            .append(CreateAuditRecord {
                actor_id: actor.id,
                actor_username: actor.username.clone(),
                action,
                affected_table,
                affected_id,
                detail_encrypted,
                ip_address,
            })
            .await
    }

    /// Like [`record`](Self::record), for use after the primary write has
    /// already succeeded: a failed audit write is logged, never returned.
    pub async fn record_best_effort(&self, actor: &User, entry: AuditEntry) {
        let action = entry.action().to_string();
        if let Err(e) = self.record(actor, entry).await {
            warn!(
                actor = %actor.username,
                action = %action,
                error = %e,
                "audit write failed"
            );
        }
    }

    /// Record a refused privileged action.
    pub async fn denied(&self, actor: &User, capability: Capability, ip_address: Option<&str>) {
        warn!(actor = %actor.username, %capability, "capability denied");
        self.record_best_effort(
            actor,
            AuditEntry::new(ACCESS_DENIED)
                .detail(format!("missing capability: {capability}"))
                .ip(ip_address),
        )
        .await;
    }

    /// Guard check for a privileged action. A denial is written to the
    /// trail before it is returned.
    pub async fn authorize(
        &self,
        principal: &Principal,
        capability: Capability,
        ip_address: Option<&str>,
    ) -> NatalResult<()> {
        let decision = AuthorizationGuard::require(principal, capability);
        if !decision.is_allowed() {
            self.denied(&principal.user, capability, ip_address).await;
        }
        decision.into_result(capability)
    }

    /// Filtered, newest-first read of the trail. Requires `view_audit`.
    pub async fn query(
        &self,
        viewer: &Principal,
        query: AuditQuery,
        ip_address: Option<&str>,
    ) -> NatalResult<Vec<AuditView>> {
        self.authorize(viewer, Capability::ViewAudit, ip_address)
            .await?;

        let limit = query
            .limit
            .unwrap_or(self.max_rows)
            .clamp(1, self.max_rows);
        let filter = AuditLogFilter {
            actor_id: query.actor_id,
            action: query.action.filter(|a| !a.trim().is_empty()),
            text: query
                .text
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            from: query.from,
            to: query.to,
        };

        let records = self.repo.list(filter, limit).await?;
        Ok(records.into_iter().map(|r| self.view(r)).collect())
    }

    fn view(&self, record: AuditRecord) -> AuditView {
        let detail = record
            .detail_encrypted
            .as_deref()
            .and_then(|c| self.crypto.decrypt(c));
        AuditView {
            id: record.id,
            actor_id: record.actor_id,
            actor_username: record.actor_username,
            action: record.action,
            affected_table: record.affected_table,
            affected_id: record.affected_id,
            detail,
            ip_address: record.ip_address,
            timestamp: record.timestamp,
        }
    }
}
