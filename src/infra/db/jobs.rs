use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{JobsRepo, NewJobRecord, RepoError};
use crate::domain::entities::JobRecord;
use crate::domain::jobs::JobPayload;
use crate::domain::types::{JobStatus, JobType};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    job_type: JobType,
    status: JobStatus,
    payload: serde_json::Value,
    dedupe_key: Option<String>,
    owner: String,
    priority: i32,
    progress: i32,
    error_message: Option<String>,
    artifact_path: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = RepoError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let payload = JobPayload::from_value(row.job_type, row.payload)
            .map_err(|err| RepoError::integrity(err.to_string()))?;
        Ok(JobRecord {
            id: row.id,
            status: row.status,
            payload,
            dedupe_key: row.dedupe_key,
            owner: row.owner,
            priority: row.priority,
            progress: row.progress,
            error_message: row.error_message,
            artifact_path: row.artifact_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_records(rows: Vec<JobRow>) -> Result<Vec<JobRecord>, RepoError> {
    rows.into_iter().map(JobRecord::try_from).collect()
}

#[async_trait]
impl JobsRepo for PostgresRepositories {
    async fn find_active_by_dedupe(
        &self,
        job_type: JobType,
        dedupe_key: &str,
    ) -> Result<Option<JobRecord>, RepoError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, job_type, status, payload, dedupe_key, owner, priority, progress,
                   error_message, artifact_path, created_at, updated_at
            FROM jobs
            WHERE job_type = $1
              AND dedupe_key = $2
              AND status IN ('pending', 'processing', 'completed')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(job_type)
        .bind(dedupe_key)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRecord::try_from).transpose()
    }

    async fn insert_job(&self, job: NewJobRecord) -> Result<JobRecord, RepoError> {
        let payload = job
            .payload
            .to_value()
            .map_err(|err| RepoError::InvalidInput {
                message: err.to_string(),
            })?;
        let now = OffsetDateTime::now_utc();

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (id, job_type, status, payload, dedupe_key, owner, priority, created_at, updated_at)
            VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $7)
            RETURNING id, job_type, status, payload, dedupe_key, owner, priority, progress,
                      error_message, artifact_path, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job.payload.job_type())
        .bind(payload)
        .bind(job.dedupe_key)
        .bind(job.owner)
        .bind(job.priority)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        JobRecord::try_from(row)
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<JobRecord>, RepoError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, job_type, status, payload, dedupe_key, owner, priority, progress,
                   error_message, artifact_path, created_at, updated_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRecord::try_from).transpose()
    }

    async fn list_jobs_for_owner(
        &self,
        owner: &str,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, job_type, status, payload, dedupe_key, owner, priority, progress,
                   error_message, artifact_path, created_at, updated_at
            FROM jobs
            WHERE owner = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(owner)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        into_records(rows)
    }

    async fn list_eligible(
        &self,
        stale_before: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, job_type, status, payload, dedupe_key, owner, priority, progress,
                   error_message, artifact_path, created_at, updated_at
            FROM jobs
            WHERE status = 'pending'
               OR (status = 'processing' AND updated_at < $1)
            ORDER BY priority DESC, created_at ASC
            LIMIT $2
            "#,
        )
        .bind(stale_before)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        into_records(rows)
    }

    async fn claim_job(
        &self,
        id: Uuid,
        stale_before: OffsetDateTime,
    ) -> Result<Option<JobRecord>, RepoError> {
        // The eligibility predicate is repeated so a concurrent claim makes this a no-op.
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET status = 'processing', updated_at = $3
            WHERE id = $1
              AND (status = 'pending' OR (status = 'processing' AND updated_at < $2))
            RETURNING id, job_type, status, payload, dedupe_key, owner, priority, progress,
                      error_message, artifact_path, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(stale_before)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRecord::try_from).transpose()
    }

    async fn record_progress(&self, id: Uuid, progress: i32) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET progress = GREATEST(progress, $2), updated_at = $3
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(progress)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn complete_job(
        &self,
        id: Uuid,
        artifact_path: &str,
        progress: i32,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                artifact_path = $2,
                progress = GREATEST(progress, $3),
                error_message = NULL,
                updated_at = $4
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(artifact_path)
        .bind(progress)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail_job(
        &self,
        id: Uuid,
        message: &str,
        progress: i32,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed',
                error_message = $2,
                progress = GREATEST(progress, $3),
                artifact_path = NULL,
                updated_at = $4
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(message)
        .bind(progress)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn reset_job(&self, id: Uuid) -> Result<Option<JobRecord>, RepoError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET status = 'pending',
                progress = 0,
                error_message = NULL,
                artifact_path = NULL,
                updated_at = $2
            WHERE id = $1 AND status = 'failed'
            RETURNING id, job_type, status, payload, dedupe_key, owner, priority, progress,
                      error_message, artifact_path, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRecord::try_from).transpose()
    }
}
