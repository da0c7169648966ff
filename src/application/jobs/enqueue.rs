use std::sync::Arc;

use missive_api_types::{EnqueueRequest, EnqueueResponse};
use thiserror::Error;
use tracing::{debug, info};

use crate::application::repos::{JobsRepo, NewJobRecord, RepoError};
use crate::domain::entities::JobRecord;
use crate::domain::error::DomainError;
use crate::domain::jobs::{JobPayload, dedupe_key};
use crate::domain::subjects::parse_subject_list;
use crate::domain::types::JobType;

/// A lost insert race is retried this many times before giving up.
const MAX_RACE_ATTEMPTS: usize = 3;
const MAX_ITEMS: usize = 500;
const MAX_MESSAGE_CHARS: usize = 2_000;

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("caller could not be identified")]
    Unauthorized,
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct EnqueueCommand {
    pub job_type: JobType,
    pub items: Vec<String>,
    pub dedupe: bool,
    pub message: Option<String>,
    pub priority: i32,
}

impl From<EnqueueRequest> for EnqueueCommand {
    fn from(request: EnqueueRequest) -> Self {
        Self {
            job_type: request.job_type,
            items: request.items,
            dedupe: request.dedupe,
            message: request.message,
            priority: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnqueueOutcome {
    pub job: JobRecord,
    /// An equivalent job already existed and no new work was scheduled.
    pub reused: bool,
}

impl EnqueueOutcome {
    pub fn response(&self) -> EnqueueResponse {
        EnqueueResponse {
            job_id: self.job.id,
            reused: self.reused,
            status: self.job.status,
            progress: self.reused.then_some(self.job.progress),
            artifact_path: self.job.artifact_path.clone(),
        }
    }
}

#[derive(Clone)]
pub struct EnqueueService {
    jobs: Arc<dyn JobsRepo>,
}

impl EnqueueService {
    pub fn new(jobs: Arc<dyn JobsRepo>) -> Self {
        Self { jobs }
    }

    /// Turn a batch request into exactly one live job per canonical item set.
    pub async fn enqueue(
        &self,
        owner: Option<&str>,
        command: EnqueueCommand,
    ) -> Result<EnqueueOutcome, EnqueueError> {
        let owner = owner
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .ok_or(EnqueueError::Unauthorized)?;

        // Bounded before parsing so an oversized body costs no per-item work.
        if command.items.len() > MAX_ITEMS {
            return Err(DomainError::validation(format!(
                "at most {MAX_ITEMS} items may be requested at once"
            ))
            .into());
        }
        let subjects = parse_subject_list(&command.items)?;
        if command
            .message
            .as_deref()
            .is_some_and(|message| message.chars().count() > MAX_MESSAGE_CHARS)
        {
            return Err(DomainError::validation(format!(
                "message must be at most {MAX_MESSAGE_CHARS} characters"
            ))
            .into());
        }

        let job_type = command.job_type;
        let payload = JobPayload::new(job_type, subjects, command.message);

        if !command.dedupe {
            let job = self
                .jobs
                .insert_job(NewJobRecord {
                    payload,
                    dedupe_key: None,
                    owner: owner.to_string(),
                    priority: command.priority,
                })
                .await?;
            log_created(&job);
            return Ok(EnqueueOutcome { job, reused: false });
        }

        let key = dedupe_key(job_type, payload.subjects());
        for attempt in 1..=MAX_RACE_ATTEMPTS {
            if let Some(job) = self.jobs.find_active_by_dedupe(job_type, &key).await? {
                debug!(
                    target = "application::jobs::enqueue",
                    job_id = %job.id,
                    status = job.status.as_str(),
                    "Reusing equivalent job"
                );
                return Ok(EnqueueOutcome { job, reused: true });
            }

            let insert = self
                .jobs
                .insert_job(NewJobRecord {
                    payload: payload.clone(),
                    dedupe_key: Some(key.clone()),
                    owner: owner.to_string(),
                    priority: command.priority,
                })
                .await;

            match insert {
                Ok(job) => {
                    log_created(&job);
                    return Ok(EnqueueOutcome { job, reused: false });
                }
                Err(RepoError::Duplicate { constraint }) => {
                    debug!(
                        target = "application::jobs::enqueue",
                        attempt,
                        constraint = %constraint,
                        "Concurrent enqueue won the dedupe key; re-querying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RepoError::integrity(format!(
            "dedupe key `{key}` kept colliding without an active holder"
        ))
        .into())
    }
}

fn log_created(job: &JobRecord) {
    info!(
        target = "application::jobs::enqueue",
        job_id = %job.id,
        job_type = job.job_type().as_str(),
        owner = %job.owner,
        items = job.payload.subjects().len(),
        "Job enqueued"
    );
}
