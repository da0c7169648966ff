//! Content-addressed generation of single mission orders.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::render::{DocumentRenderer, RenderError, RenderRequest};
use crate::application::repos::{DocumentsRepo, MissionSourceRepo, NewDocumentRecord, RepoError};
use crate::domain::entities::DocumentRecord;
use crate::domain::error::DomainError;
use crate::domain::mission::{MissionSnapshot, MissionSource, RenderingInput, TEMPLATE_REVISION};
use crate::domain::subjects::SubjectKey;
use crate::domain::types::Direction;
use crate::infra::storage::{DocumentStorage, StorageError, document_path};

pub const METRIC_CACHE_HIT: &str = "missive_documents_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "missive_documents_cache_miss_total";

/// Document-wide text and the public verification endpoint.
#[derive(Debug, Clone)]
pub struct DocumentSettings {
    pub direction: Direction,
    pub authority: String,
    pub title: String,
    pub order_suffix: String,
    pub instructions: String,
    pub verify_base_url: String,
}

impl DocumentSettings {
    pub fn verification_url(&self, id: Uuid) -> String {
        format!("{}/{id}", self.verify_base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("source data unavailable for `{subject}`: {reason}")]
    SourceDataUnavailable { subject: String, reason: String },
    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub source: MissionSource,
    pub record: DocumentRecord,
    pub bytes: Bytes,
    /// Served from a previous render.
    pub cached: bool,
}

pub struct DocumentGenerator {
    sources: Arc<dyn MissionSourceRepo>,
    documents: Arc<dyn DocumentsRepo>,
    storage: Arc<DocumentStorage>,
    renderer: Arc<dyn DocumentRenderer>,
    settings: DocumentSettings,
}

impl DocumentGenerator {
    pub fn new(
        sources: Arc<dyn MissionSourceRepo>,
        documents: Arc<dyn DocumentsRepo>,
        storage: Arc<DocumentStorage>,
        renderer: Arc<dyn DocumentRenderer>,
        settings: DocumentSettings,
    ) -> Self {
        Self {
            sources,
            documents,
            storage,
            renderer,
            settings,
        }
    }

    /// Bytes of the mission order for `subject`, rendering only when its input changed.
    ///
    /// A cache hit needs the latest record's hash to match the freshly computed one
    /// and its stored object to still exist; sequence number and verification id then
    /// stay as they were. Anything else allocates a new sequence number and record.
    pub async fn generate(&self, subject: &SubjectKey) -> Result<GeneratedDocument, GenerateError> {
        let source = self.fetch_source(subject).await?;
        let input = self.rendering_input(&source)?;
        let data_hash = input.data_hash()?;

        if let Some(existing) = self.documents.latest_for_subject(subject).await?
            && existing.data_hash == data_hash
            && let Some(path) = existing.storage_path.as_deref()
            && let Some(bytes) = self.storage.get(path).await?
        {
            counter!(METRIC_CACHE_HIT).increment(1);
            debug!(
                target = "application::documents",
                subject = %subject,
                sequence_number = existing.sequence_number,
                "Mission order served from cache"
            );
            return Ok(GeneratedDocument {
                source,
                record: existing,
                bytes,
                cached: true,
            });
        }
        counter!(METRIC_CACHE_MISS).increment(1);

        let sequence_number = self.documents.next_sequence_number().await?;
        let mut record = self
            .documents
            .insert_document(NewDocumentRecord {
                sequence_number,
                subject_key: subject.clone(),
                data_hash,
                data_snapshot: input.canonical_json()?,
            })
            .await?;

        let verification_url = self.settings.verification_url(record.id);
        let rendered = self
            .renderer
            .render(RenderRequest {
                input,
                sequence_number,
                verification_url,
            })
            .await?;
        let bytes = Bytes::from(rendered);

        let path = document_path(sequence_number);
        self.storage.put(&path, bytes.clone()).await?;
        self.documents.set_storage_path(record.id, &path).await?;
        record.storage_path = Some(path);

        info!(
            target = "application::documents",
            subject = %subject,
            document_id = %record.id,
            sequence_number,
            "Mission order rendered"
        );

        Ok(GeneratedDocument {
            source,
            record,
            bytes,
            cached: false,
        })
    }

    async fn fetch_source(&self, subject: &SubjectKey) -> Result<MissionSource, GenerateError> {
        let unavailable = |reason: String| GenerateError::SourceDataUnavailable {
            subject: subject.to_string(),
            reason,
        };
        match self.sources.fetch_mission(subject).await {
            Ok(Some(source)) => Ok(source),
            Ok(None) => Err(unavailable("no scheduled mission".to_string())),
            Err(err) => Err(unavailable(err.to_string())),
        }
    }

    fn rendering_input(&self, source: &MissionSource) -> Result<RenderingInput, GenerateError> {
        Ok(RenderingInput {
            template: TEMPLATE_REVISION,
            direction: self.settings.direction,
            authority: self.settings.authority.clone(),
            title: self.settings.title.clone(),
            order_suffix: self.settings.order_suffix.clone(),
            instructions: self.settings.instructions.clone(),
            mission: MissionSnapshot::from_source(source)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_url_joins_without_double_slash() {
        let settings = DocumentSettings {
            direction: Direction::Rtl,
            authority: String::new(),
            title: String::new(),
            order_suffix: String::new(),
            instructions: String::new(),
            verify_base_url: "https://orders.example.org/verify/".to_string(),
        };
        assert_eq!(
            settings.verification_url(Uuid::nil()),
            "https://orders.example.org/verify/00000000-0000-0000-0000-000000000000"
        );
    }
}
