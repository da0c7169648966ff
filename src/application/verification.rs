//! Public, unauthenticated lookup behind the QR code on every mission order.

use std::sync::Arc;

use missive_api_types::VerificationView;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::DocumentsRepo;
use crate::domain::mission::verification_view;

#[derive(Clone)]
pub struct VerificationService {
    documents: Arc<dyn DocumentsRepo>,
}

impl VerificationService {
    pub fn new(documents: Arc<dyn DocumentsRepo>) -> Self {
        Self { documents }
    }

    /// Curated snapshot of document `id`. Superseded documents stay resolvable.
    pub async fn lookup(&self, id: Uuid) -> Result<Option<VerificationView>, AppError> {
        let Some(record) = self
            .documents
            .find_document(id)
            .await
            .map_err(AppError::from)?
        else {
            return Ok(None);
        };
        Ok(Some(verification_view(&record)?))
    }
}
