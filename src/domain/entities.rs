//! Domain entities mirrored from persistent storage.

use missive_api_types::JobView;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{
    jobs::JobPayload,
    subjects::SubjectKey,
    types::{JobStatus, JobType},
};

#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub payload: JobPayload,
    pub dedupe_key: Option<String>,
    pub owner: String,
    pub priority: i32,
    pub progress: i32,
    pub error_message: Option<String>,
    pub artifact_path: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl JobRecord {
    pub fn job_type(&self) -> JobType {
        self.payload.job_type()
    }

    pub fn view(&self) -> JobView {
        JobView {
            id: self.id,
            job_type: self.job_type(),
            status: self.status,
            progress: self.progress,
            error_message: self.error_message.clone(),
            artifact_path: self.artifact_path.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// One rendered content version of a subject. Never mutated after its storage path is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub sequence_number: i64,
    pub subject_key: SubjectKey,
    pub data_hash: String,
    pub data_snapshot: serde_json::Value,
    pub storage_path: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRecord {
    pub hash: String,
    pub orders: Vec<SubjectKey>,
    pub status: JobStatus,
    pub artifact_path: Option<String>,
    pub error: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
