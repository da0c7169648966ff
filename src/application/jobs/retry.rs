use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{JobsRepo, RepoError};
use crate::domain::entities::JobRecord;
use crate::domain::types::JobStatus;

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("job `{0}` not found")]
    NotFound(Uuid),
    #[error("job belongs to another caller")]
    Forbidden,
    #[error("only failed jobs can be retried; job is {}", .0.as_str())]
    NotRetryable(JobStatus),
    #[error("an equivalent job `{active_job_id}` is already active")]
    Superseded { active_job_id: Uuid },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct RetryService {
    jobs: Arc<dyn JobsRepo>,
}

impl RetryService {
    pub fn new(jobs: Arc<dyn JobsRepo>) -> Self {
        Self { jobs }
    }

    /// Reset a failed job owned by `owner` back to pending.
    pub async fn retry(&self, owner: &str, job_id: Uuid) -> Result<JobRecord, RetryError> {
        let job = self
            .jobs
            .find_job(job_id)
            .await?
            .ok_or(RetryError::NotFound(job_id))?;

        if job.owner != owner {
            return Err(RetryError::Forbidden);
        }
        if job.status != JobStatus::Failed {
            return Err(RetryError::NotRetryable(job.status));
        }
        if let Some(active_job_id) = self.active_holder(&job).await? {
            return Err(RetryError::Superseded { active_job_id });
        }

        match self.jobs.reset_job(job.id).await {
            Ok(Some(reset)) => {
                info!(
                    target = "application::jobs::retry",
                    job_id = %reset.id,
                    owner = %owner,
                    "Job reset to pending"
                );
                Ok(reset)
            }
            Ok(None) => {
                // Someone else moved it out of `failed` in between.
                let status = self
                    .jobs
                    .find_job(job_id)
                    .await?
                    .map(|current| current.status)
                    .ok_or(RetryError::NotFound(job_id))?;
                Err(RetryError::NotRetryable(status))
            }
            Err(RepoError::Duplicate { .. }) => match self.active_holder(&job).await? {
                Some(active_job_id) => Err(RetryError::Superseded { active_job_id }),
                None => Err(RepoError::integrity(format!(
                    "job `{job_id}` collided on its dedupe key without an active holder"
                ))
                .into()),
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn active_holder(&self, job: &JobRecord) -> Result<Option<Uuid>, RepoError> {
        let Some(key) = job.dedupe_key.as_deref() else {
            return Ok(None);
        };
        let active = self.jobs.find_active_by_dedupe(job.job_type(), key).await?;
        Ok(active.map(|holder| holder.id).filter(|id| *id != job.id))
    }
}
