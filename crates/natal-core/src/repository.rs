//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Repositories for owned records
//! (births, newborns) take a [`RecordScope`] so that row-level filtering
//! happens in the query, never after it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::authz::RecordScope;
use crate::error::NatalResult;
use crate::models::{
    audit::{AuditRecord, CreateAuditRecord},
    birth::{Birth, ClinicalDocument, CreateBirth, UpdateBirth},
    correction::{CreateCorrection, Correction, CorrectionTarget},
    mother::{CreateMother, Mother, UpdateMother},
    newborn::{CreateNewborn, Newborn},
    role::{CreateRole, Role, UpdateRole},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

pub trait RoleRepository: Send + Sync {
    fn create(&self, input: CreateRole) -> impl Future<Output = NatalResult<Role>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = NatalResult<Role>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = NatalResult<Role>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateRole,
    ) -> impl Future<Output = NatalResult<Role>> + Send;
    /// Fails with `Referential` while any user still holds the role.
    fn delete(&self, id: Uuid) -> impl Future<Output = NatalResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = NatalResult<PaginatedResult<Role>>> + Send;
}

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = NatalResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = NatalResult<User>> + Send;
    fn get_by_username(&self, username: &str) -> impl Future<Output = NatalResult<User>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = NatalResult<User>> + Send;
    fn count_by_role(&self, role_id: Uuid) -> impl Future<Output = NatalResult<u64>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = NatalResult<PaginatedResult<User>>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only)
// ---------------------------------------------------------------------------

/// Query filters for audit records.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    /// Exact action tag.
    pub action: Option<String>,
    /// Case-insensitive substring over username, action and IP address.
    pub text: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit record. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditRecord,
    ) -> impl Future<Output = NatalResult<AuditRecord>> + Send;
    /// Newest first, at most `limit` records.
    fn list(
        &self,
        filter: AuditLogFilter,
        limit: u64,
    ) -> impl Future<Output = NatalResult<Vec<AuditRecord>>> + Send;
}

// ---------------------------------------------------------------------------
// Clinical records
// ---------------------------------------------------------------------------

pub trait MotherRepository: Send + Sync {
    fn create(&self, input: CreateMother) -> impl Future<Output = NatalResult<Mother>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = NatalResult<Mother>> + Send;
    /// Exact lookup on the searchable hash of the RUT.
    fn get_by_rut_hash(&self, hash: &str)
    -> impl Future<Output = NatalResult<Mother>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateMother,
    ) -> impl Future<Output = NatalResult<Mother>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = NatalResult<PaginatedResult<Mother>>> + Send;
}

pub trait BirthRepository: Send + Sync {
    fn create(&self, input: CreateBirth) -> impl Future<Output = NatalResult<Birth>> + Send;
    /// Out-of-scope records are reported as `NotFound`.
    fn get(
        &self,
        scope: RecordScope,
        id: Uuid,
    ) -> impl Future<Output = NatalResult<Birth>> + Send;
    fn update(
        &self,
        scope: RecordScope,
        id: Uuid,
        input: UpdateBirth,
    ) -> impl Future<Output = NatalResult<Birth>> + Send;
    fn set_document(
        &self,
        scope: RecordScope,
        id: Uuid,
        document: ClinicalDocument,
        content: serde_json::Value,
    ) -> impl Future<Output = NatalResult<Birth>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = NatalResult<()>> + Send;
    fn list(
        &self,
        scope: RecordScope,
        pagination: Pagination,
    ) -> impl Future<Output = NatalResult<PaginatedResult<Birth>>> + Send;
}

pub trait NewbornRepository: Send + Sync {
    fn create(&self, input: CreateNewborn)
    -> impl Future<Output = NatalResult<Newborn>> + Send;
    fn get(
        &self,
        scope: RecordScope,
        id: Uuid,
    ) -> impl Future<Output = NatalResult<Newborn>> + Send;
    fn list_by_birth(
        &self,
        scope: RecordScope,
        birth_id: Uuid,
    ) -> impl Future<Output = NatalResult<Vec<Newborn>>> + Send;
    fn list(
        &self,
        scope: RecordScope,
        pagination: Pagination,
    ) -> impl Future<Output = NatalResult<PaginatedResult<Newborn>>> + Send;
}

pub trait CorrectionRepository: Send + Sync {
    fn create(
        &self,
        input: CreateCorrection,
    ) -> impl Future<Output = NatalResult<Correction>> + Send;
    /// Oldest first.
    fn list_for(
        &self,
        target: CorrectionTarget,
    ) -> impl Future<Output = NatalResult<Vec<Correction>>> + Send;
    fn count_for(&self, target: CorrectionTarget)
    -> impl Future<Output = NatalResult<u64>> + Send;
}
