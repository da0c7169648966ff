use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{DocumentsRepo, NewDocumentRecord, RepoError};
use crate::domain::entities::DocumentRecord;
use crate::domain::subjects::SubjectKey;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    sequence_number: i64,
    subject_key: String,
    data_hash: String,
    data_snapshot: serde_json::Value,
    storage_path: Option<String>,
    created_at: OffsetDateTime,
}

impl TryFrom<DocumentRow> for DocumentRecord {
    type Error = RepoError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let subject_key = SubjectKey::parse(&row.subject_key)
            .map_err(|err| RepoError::integrity(err.to_string()))?;
        Ok(DocumentRecord {
            id: row.id,
            sequence_number: row.sequence_number,
            subject_key,
            data_hash: row.data_hash,
            data_snapshot: row.data_snapshot,
            storage_path: row.storage_path,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl DocumentsRepo for PostgresRepositories {
    async fn latest_for_subject(
        &self,
        subject: &SubjectKey,
    ) -> Result<Option<DocumentRecord>, RepoError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, sequence_number, subject_key, data_hash, data_snapshot, storage_path, created_at
            FROM documents
            WHERE subject_key = $1
            ORDER BY sequence_number DESC
            LIMIT 1
            "#,
        )
        .bind(subject.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(DocumentRecord::try_from).transpose()
    }

    async fn next_sequence_number(&self) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT nextval('document_sequence_number_seq')")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert_document(
        &self,
        document: NewDocumentRecord,
    ) -> Result<DocumentRecord, RepoError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (id, sequence_number, subject_key, data_hash, data_snapshot, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, sequence_number, subject_key, data_hash, data_snapshot, storage_path, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(document.sequence_number)
        .bind(document.subject_key.to_string())
        .bind(document.data_hash)
        .bind(document.data_snapshot)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        DocumentRecord::try_from(row)
    }

    async fn set_storage_path(&self, id: Uuid, storage_path: &str) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE documents SET storage_path = $2 WHERE id = $1")
            .bind(id)
            .bind(storage_path)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, RepoError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, sequence_number, subject_key, data_hash, data_snapshot, storage_path, created_at
            FROM documents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(DocumentRecord::try_from).transpose()
    }
}
