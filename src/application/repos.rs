//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::api_keys::{ApiKeyRecord, ApiScope};
use crate::domain::entities::{BatchRecord, DocumentRecord, JobRecord};
use crate::domain::jobs::JobPayload;
use crate::domain::mission::MissionSource;
use crate::domain::subjects::SubjectKey;
use crate::domain::types::{JobStatus, JobType};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub payload: JobPayload,
    pub dedupe_key: Option<String>,
    pub owner: String,
    pub priority: i32,
}

/// Job store. Every transition is a single-row conditional update; callers rely on
/// downstream effects being idempotent rather than on row locks.
#[async_trait]
pub trait JobsRepo: Send + Sync {
    /// Most recent job of this type holding `dedupe_key` (pending, processing or completed).
    async fn find_active_by_dedupe(
        &self,
        job_type: JobType,
        dedupe_key: &str,
    ) -> Result<Option<JobRecord>, RepoError>;

    /// Insert a pending job. A dedupe collision surfaces as [`RepoError::Duplicate`].
    async fn insert_job(&self, job: NewJobRecord) -> Result<JobRecord, RepoError>;

    async fn find_job(&self, id: Uuid) -> Result<Option<JobRecord>, RepoError>;

    /// Jobs owned by `owner`, newest first.
    async fn list_jobs_for_owner(
        &self,
        owner: &str,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError>;

    /// Pending jobs plus processing jobs not touched since `stale_before`.
    async fn list_eligible(
        &self,
        stale_before: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError>;

    /// Flip an eligible job to processing. `None` means another cycle claimed it first.
    async fn claim_job(
        &self,
        id: Uuid,
        stale_before: OffsetDateTime,
    ) -> Result<Option<JobRecord>, RepoError>;

    /// Raise progress (never lowers it) and refresh `updated_at`.
    async fn record_progress(&self, id: Uuid, progress: i32) -> Result<(), RepoError>;

    /// Terminal writes only apply to a job still in `processing`; `false` means the
    /// claim was lost (another cycle already finished the job) and nothing changed.
    async fn complete_job(
        &self,
        id: Uuid,
        artifact_path: &str,
        progress: i32,
    ) -> Result<bool, RepoError>;

    async fn fail_job(&self, id: Uuid, message: &str, progress: i32)
    -> Result<bool, RepoError>;

    /// Reset a failed job to pending, clearing progress, error and artifact.
    /// `None` when the job is not in `failed`.
    async fn reset_job(&self, id: Uuid) -> Result<Option<JobRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewDocumentRecord {
    pub sequence_number: i64,
    pub subject_key: SubjectKey,
    pub data_hash: String,
    pub data_snapshot: serde_json::Value,
}

#[async_trait]
pub trait DocumentsRepo: Send + Sync {
    /// Record with the highest sequence number for `subject`.
    async fn latest_for_subject(
        &self,
        subject: &SubjectKey,
    ) -> Result<Option<DocumentRecord>, RepoError>;

    /// Allocate the next global sequence number from an atomic counter.
    async fn next_sequence_number(&self) -> Result<i64, RepoError>;

    async fn insert_document(
        &self,
        document: NewDocumentRecord,
    ) -> Result<DocumentRecord, RepoError>;

    async fn set_storage_path(&self, id: Uuid, storage_path: &str) -> Result<(), RepoError>;

    async fn find_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct UpsertBatchParams {
    pub hash: String,
    pub orders: Vec<SubjectKey>,
    pub status: JobStatus,
    pub artifact_path: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait BatchesRepo: Send + Sync {
    async fn upsert_batch(&self, params: UpsertBatchParams) -> Result<BatchRecord, RepoError>;

    async fn find_batch(&self, hash: &str) -> Result<Option<BatchRecord>, RepoError>;
}

/// Read access to the scheduling data owned by the dashboard.
#[async_trait]
pub trait MissionSourceRepo: Send + Sync {
    async fn fetch_mission(&self, subject: &SubjectKey)
    -> Result<Option<MissionSource>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateApiKeyParams {
    pub name: String,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub scopes: Vec<ApiScope>,
    pub expires_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait ApiKeysRepo: Send + Sync {
    async fn create_key(&self, params: CreateApiKeyParams) -> Result<ApiKeyRecord, RepoError>;

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, RepoError>;

    async fn revoke_key(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError>;

    async fn update_last_used(&self, id: Uuid, used_at: OffsetDateTime) -> Result<(), RepoError>;
}
