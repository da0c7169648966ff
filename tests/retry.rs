mod support;

use std::sync::Arc;

use missive::application::jobs::{EnqueueCommand, EnqueueService, RetryError, RetryService};
use missive::domain::types::{JobStatus, JobType};
use uuid::Uuid;

use support::MemoryJobs;

async fn enqueue(jobs: &Arc<MemoryJobs>, owner: &str) -> Uuid {
    EnqueueService::new(jobs.clone())
        .enqueue(
            Some(owner),
            EnqueueCommand {
                job_type: JobType::MissionOrdersMerge,
                items: vec!["m1:o1".to_string()],
                dedupe: true,
                message: None,
                priority: 0,
            },
        )
        .await
        .expect("enqueue")
        .job
        .id
}

#[tokio::test]
async fn failed_job_goes_back_to_pending() {
    let jobs = Arc::new(MemoryJobs::default());
    let id = enqueue(&jobs, "dashboard").await;
    jobs.force_status(id, JobStatus::Failed).await;

    let reset = RetryService::new(jobs.clone())
        .retry("dashboard", id)
        .await
        .expect("retry");

    assert_eq!(reset.id, id);
    assert_eq!(reset.status, JobStatus::Pending);
    assert_eq!(reset.progress, 0);
    assert!(reset.error_message.is_none());
    assert!(reset.artifact_path.is_none());
}

#[tokio::test]
async fn only_failed_jobs_can_be_retried() {
    let jobs = Arc::new(MemoryJobs::default());
    let id = enqueue(&jobs, "dashboard").await;

    let err = RetryService::new(jobs.clone())
        .retry("dashboard", id)
        .await
        .expect_err("pending job");
    assert!(matches!(err, RetryError::NotRetryable(JobStatus::Pending)));

    jobs.force_status(id, JobStatus::Completed).await;
    let err = RetryService::new(jobs.clone())
        .retry("dashboard", id)
        .await
        .expect_err("completed job");
    assert!(matches!(err, RetryError::NotRetryable(JobStatus::Completed)));
}

#[tokio::test]
async fn callers_cannot_retry_foreign_or_unknown_jobs() {
    let jobs = Arc::new(MemoryJobs::default());
    let id = enqueue(&jobs, "dashboard").await;
    jobs.force_status(id, JobStatus::Failed).await;
    let service = RetryService::new(jobs.clone());

    let err = service.retry("intruder", id).await.expect_err("foreign");
    assert!(matches!(err, RetryError::Forbidden));

    let missing = Uuid::new_v4();
    let err = service.retry("dashboard", missing).await.expect_err("unknown");
    assert!(matches!(err, RetryError::NotFound(id) if id == missing));

    assert_eq!(jobs.get(id).await.status, JobStatus::Failed);
}

#[tokio::test]
async fn retry_is_refused_while_an_equivalent_job_is_active() {
    let jobs = Arc::new(MemoryJobs::default());
    let failed = enqueue(&jobs, "dashboard").await;
    jobs.force_status(failed, JobStatus::Failed).await;
    let replacement = enqueue(&jobs, "dashboard").await;
    assert_ne!(failed, replacement);

    let err = RetryService::new(jobs.clone())
        .retry("dashboard", failed)
        .await
        .expect_err("superseded");
    assert!(matches!(
        err,
        RetryError::Superseded { active_job_id } if active_job_id == replacement
    ));
    assert_eq!(jobs.get(failed).await.status, JobStatus::Failed);
}
