use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::application::repos::{BatchesRepo, RepoError, UpsertBatchParams};
use crate::domain::entities::BatchRecord;
use crate::domain::subjects::SubjectKey;
use crate::domain::types::JobStatus;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
struct BatchRow {
    hash: String,
    orders: Vec<String>,
    status: JobStatus,
    artifact_path: Option<String>,
    error: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<BatchRow> for BatchRecord {
    type Error = RepoError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let orders = row
            .orders
            .iter()
            .map(|raw| SubjectKey::parse(raw))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| RepoError::integrity(err.to_string()))?;
        Ok(BatchRecord {
            hash: row.hash,
            orders,
            status: row.status,
            artifact_path: row.artifact_path,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl BatchesRepo for PostgresRepositories {
    async fn upsert_batch(&self, params: UpsertBatchParams) -> Result<BatchRecord, RepoError> {
        let orders: Vec<String> = params.orders.iter().map(ToString::to_string).collect();
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            INSERT INTO batches (hash, orders, status, artifact_path, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (hash) DO UPDATE
            SET orders = EXCLUDED.orders,
                status = EXCLUDED.status,
                artifact_path = EXCLUDED.artifact_path,
                error = EXCLUDED.error,
                updated_at = EXCLUDED.updated_at
            RETURNING hash, orders, status, artifact_path, error, created_at, updated_at
            "#,
        )
        .bind(params.hash)
        .bind(orders)
        .bind(params.status)
        .bind(params.artifact_path)
        .bind(params.error)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        BatchRecord::try_from(row)
    }

    async fn find_batch(&self, hash: &str) -> Result<Option<BatchRecord>, RepoError> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT hash, orders, status, artifact_path, error, created_at, updated_at
            FROM batches
            WHERE hash = $1
            "#,
        )
        .bind(hash)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(BatchRecord::try_from).transpose()
    }
}
