use std::sync::Arc;

use crate::application::api_keys::ApiKeyService;
use crate::application::jobs::{EnqueueService, RetryService};
use crate::application::repos::JobsRepo;
use crate::infra::storage::DocumentStorage;

#[derive(Clone)]
pub struct ApiState {
    pub api_keys: Arc<ApiKeyService>,
    pub enqueue: Arc<EnqueueService>,
    pub retry: Arc<RetryService>,
    pub jobs: Arc<dyn JobsRepo>,
    pub storage: Arc<DocumentStorage>,
}
