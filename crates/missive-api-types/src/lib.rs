//! Wire types shared by the missive server and its API clients.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of a job (mirrors Postgres enum `job_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "job_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Statuses that hold a dedupe key and therefore block a new job for it.
    pub fn holds_dedupe_key(self) -> bool {
        !matches!(self, JobStatus::Failed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Supported batch kinds (mirrors Postgres enum `job_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "job_type", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Generate every document and merge them into one PDF.
    MissionOrdersMerge,
    /// Generate every document, email each to its official, and keep the merged PDF.
    MissionOrdersEmail,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::MissionOrdersMerge => "mission_orders_merge",
            JobType::MissionOrdersEmail => "mission_orders_email",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "mission_orders_merge" => Ok(JobType::MissionOrdersMerge),
            "mission_orders_email" => Ok(JobType::MissionOrdersEmail),
            _ => Err(()),
        }
    }
}

fn default_dedupe() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub items: Vec<String>,
    #[serde(default = "default_dedupe")]
    pub dedupe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub job_id: Uuid,
    pub reused: bool,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
}

/// Job fields exposed to UI collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub progress: i32,
    pub error_message: Option<String>,
    pub artifact_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobList {
    pub items: Vec<JobView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRequest {
    pub job_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryResponse {
    pub success: bool,
    pub job: JobView,
}

/// Public fields shown when a document's QR code is scanned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationView {
    pub official_name: String,
    pub role: String,
    pub fixture: String,
    pub competition: String,
    pub location: String,
    pub match_date: String,
    pub order_number: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
}
