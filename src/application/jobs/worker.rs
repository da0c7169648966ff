//! Bounded processing cycles over the job store.
//!
//! Claims are plain status flips, and a job left in `processing` past the stale
//! threshold is claimed again by a later cycle. A job may therefore run more than
//! once, which stays harmless only while every effect below is idempotent: the
//! document cache is keyed by content hash, artifacts are overwritten at
//! deterministic paths, terminal status writes only land on a job still in
//! `processing` and progress never decreases. Any new side effect added here must
//! keep that property.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{StreamExt, stream};
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::application::documents::{DocumentGenerator, GenerateError};
use crate::application::mail::{MailError, Mailer, MissionOrderMail};
use crate::application::render::merge_documents;
use crate::application::repos::{BatchesRepo, JobsRepo, RepoError, UpsertBatchParams};
use crate::domain::entities::JobRecord;
use crate::domain::jobs::{JobPayload, batch_hash};
use crate::domain::subjects::SubjectKey;
use crate::domain::types::JobStatus;
use crate::infra::storage::{DocumentStorage, batch_path, dispatch_path};

pub const METRIC_JOBS_COMPLETED: &str = "missive_jobs_completed_total";
pub const METRIC_JOBS_FAILED: &str = "missive_jobs_failed_total";
pub const METRIC_JOB_ITEMS_FAILED: &str = "missive_job_items_failed_total";

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// A processing job untouched for this long is considered abandoned.
    pub stale_after: Duration,
    /// Documents generated concurrently inside one job.
    pub fan_out: usize,
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub eligible: usize,
    pub completed: usize,
    pub failed: usize,
    /// Claimed by someone else first, or left for a later cycle after a store error.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Error)]
enum ItemError {
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("dispatch failed: {0}")]
    Mail(#[from] MailError),
}

pub struct BatchWorker {
    jobs: Arc<dyn JobsRepo>,
    batches: Arc<dyn BatchesRepo>,
    generator: Arc<DocumentGenerator>,
    storage: Arc<DocumentStorage>,
    mailer: Option<Arc<dyn Mailer>>,
    settings: WorkerSettings,
}

impl BatchWorker {
    pub fn new(
        jobs: Arc<dyn JobsRepo>,
        batches: Arc<dyn BatchesRepo>,
        generator: Arc<DocumentGenerator>,
        storage: Arc<DocumentStorage>,
        mailer: Option<Arc<dyn Mailer>>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            jobs,
            batches,
            generator,
            storage,
            mailer,
            settings,
        }
    }

    /// Claim and drive up to `max_batches` eligible jobs to a terminal state.
    pub async fn run_cycle(&self, max_batches: usize) -> Result<CycleReport, RepoError> {
        let max_batches = max_batches.max(1);
        let stale_before = OffsetDateTime::now_utc() - self.settings.stale_after;
        let limit = u32::try_from(max_batches).unwrap_or(u32::MAX);
        let eligible = self.jobs.list_eligible(stale_before, limit).await?;

        let mut report = CycleReport {
            eligible: eligible.len(),
            ..CycleReport::default()
        };
        if eligible.is_empty() {
            return Ok(report);
        }

        let outcomes: Vec<JobOutcome> = stream::iter(eligible)
            .map(|job| self.process(job, stale_before))
            .buffer_unordered(max_batches)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                JobOutcome::Completed => report.completed += 1,
                JobOutcome::Failed => report.failed += 1,
                JobOutcome::Skipped => report.skipped += 1,
            }
        }

        info!(
            target = "application::jobs::worker",
            eligible = report.eligible,
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            "Cycle finished"
        );
        Ok(report)
    }

    async fn process(&self, candidate: JobRecord, stale_before: OffsetDateTime) -> JobOutcome {
        let job = match self.jobs.claim_job(candidate.id, stale_before).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!(
                    target = "application::jobs::worker",
                    job_id = %candidate.id,
                    "Job claimed elsewhere"
                );
                return JobOutcome::Skipped;
            }
            Err(err) => {
                warn!(
                    target = "application::jobs::worker",
                    job_id = %candidate.id,
                    error = %err,
                    "Failed to claim job"
                );
                return JobOutcome::Skipped;
            }
        };

        if candidate.status == JobStatus::Processing {
            warn!(
                target = "application::jobs::worker",
                job_id = %job.id,
                last_update = %candidate.updated_at,
                "Reclaiming stale job"
            );
        }
        info!(
            target = "application::jobs::worker",
            job_id = %job.id,
            job_type = job.job_type().as_str(),
            items = job.payload.subjects().len(),
            "Job claimed"
        );

        self.execute(&job).await
    }

    async fn execute(&self, job: &JobRecord) -> JobOutcome {
        let subjects = job.payload.subjects();
        let hash = batch_hash(subjects);
        let note = match &job.payload {
            JobPayload::MissionOrdersEmail(payload) => payload.message.as_deref(),
            JobPayload::MissionOrdersMerge(_) => None,
        };

        self.record_batch(job, &hash, JobStatus::Processing, None, None)
            .await;

        let succeeded = AtomicI32::new(0);
        // `buffered` yields in request order, so the merge keeps the caller's ordering.
        let documents: Vec<Bytes> = stream::iter(subjects)
            .map(|subject| self.process_item(job, subject, note, &succeeded))
            .buffered(self.settings.fan_out.max(1))
            .filter_map(|document| async move { document })
            .collect()
            .await;
        let processed = succeeded.load(Ordering::SeqCst);

        if documents.is_empty() {
            let message = format!(
                "none of the {} requested mission orders could be produced",
                subjects.len()
            );
            return self.finish_failed(job, &hash, &message, processed).await;
        }

        let artifact_path = match &job.payload {
            JobPayload::MissionOrdersMerge(_) => batch_path(&hash),
            JobPayload::MissionOrdersEmail(_) => dispatch_path(&hash),
        };
        if let Err(message) = self.store_merged(documents, &artifact_path).await {
            return self.finish_failed(job, &hash, &message, processed).await;
        }

        match self
            .jobs
            .complete_job(job.id, &artifact_path, processed)
            .await
        {
            Ok(true) => {}
            Ok(false) => return lost_claim(job),
            Err(err) => {
                // Left in processing; a later cycle reclaims it once it goes stale.
                error!(
                    target = "application::jobs::worker",
                    job_id = %job.id,
                    error = %err,
                    "Failed to record job completion"
                );
                return JobOutcome::Skipped;
            }
        }
        self.record_batch(
            job,
            &hash,
            JobStatus::Completed,
            Some(artifact_path.clone()),
            None,
        )
        .await;

        counter!(METRIC_JOBS_COMPLETED).increment(1);
        info!(
            target = "application::jobs::worker",
            job_id = %job.id,
            processed,
            requested = subjects.len(),
            artifact_path = %artifact_path,
            "Job completed"
        );
        JobOutcome::Completed
    }

    /// One sub-item: generate, dispatch when asked to, then heartbeat.
    async fn process_item(
        &self,
        job: &JobRecord,
        subject: &SubjectKey,
        note: Option<&str>,
        succeeded: &AtomicI32,
    ) -> Option<Bytes> {
        let result = self.produce(job, subject, note).await;

        let progress = match result {
            Ok(_) => succeeded.fetch_add(1, Ordering::SeqCst) + 1,
            Err(_) => succeeded.load(Ordering::SeqCst),
        };
        if let Err(err) = self.jobs.record_progress(job.id, progress).await {
            warn!(
                target = "application::jobs::worker",
                job_id = %job.id,
                error = %err,
                "Failed to record progress"
            );
        }

        match result {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                counter!(METRIC_JOB_ITEMS_FAILED).increment(1);
                warn!(
                    target = "application::jobs::worker",
                    job_id = %job.id,
                    subject = %subject,
                    error = %err,
                    "Mission order skipped"
                );
                None
            }
        }
    }

    async fn produce(
        &self,
        job: &JobRecord,
        subject: &SubjectKey,
        note: Option<&str>,
    ) -> Result<Bytes, ItemError> {
        let document = self.generator.generate(subject).await?;

        if let JobPayload::MissionOrdersEmail(_) = job.payload {
            let mailer = self.mailer.as_ref().ok_or(MailError::Disabled)?;
            let mail = MissionOrderMail::for_mission(
                &document.source,
                document.record.sequence_number,
                note,
                document.bytes.clone(),
            )?;
            mailer.send(mail).await?;
            debug!(
                target = "application::jobs::worker",
                job_id = %job.id,
                subject = %subject,
                "Mission order dispatched"
            );
        }

        Ok(document.bytes)
    }

    async fn store_merged(&self, documents: Vec<Bytes>, path: &str) -> Result<(), String> {
        let merged = tokio::task::spawn_blocking(move || merge_documents(&documents))
            .await
            .map_err(|err| format!("merge task aborted: {err}"))?
            .map_err(|err| format!("merge failed: {err}"))?;

        self.storage
            .put(path, Bytes::from(merged))
            .await
            .map_err(|err| format!("artifact upload failed: {err}"))
    }

    async fn finish_failed(
        &self,
        job: &JobRecord,
        hash: &str,
        message: &str,
        processed: i32,
    ) -> JobOutcome {
        match self.jobs.fail_job(job.id, message, processed).await {
            Ok(true) => {}
            Ok(false) => return lost_claim(job),
            Err(err) => {
                error!(
                    target = "application::jobs::worker",
                    job_id = %job.id,
                    error = %err,
                    "Failed to record job failure"
                );
                return JobOutcome::Skipped;
            }
        }
        self.record_batch(
            job,
            hash,
            JobStatus::Failed,
            None,
            Some(message.to_string()),
        )
        .await;

        counter!(METRIC_JOBS_FAILED).increment(1);
        warn!(
            target = "application::jobs::worker",
            job_id = %job.id,
            reason = %message,
            "Job failed"
        );
        JobOutcome::Failed
    }

    /// Batch records only track merge jobs; their state mirrors the job's.
    async fn record_batch(
        &self,
        job: &JobRecord,
        hash: &str,
        status: JobStatus,
        artifact_path: Option<String>,
        error: Option<String>,
    ) {
        let JobPayload::MissionOrdersMerge(payload) = &job.payload else {
            return;
        };
        let params = UpsertBatchParams {
            hash: hash.to_string(),
            orders: payload.subjects.clone(),
            status,
            artifact_path,
            error,
        };
        if let Err(err) = self.batches.upsert_batch(params).await {
            warn!(
                target = "application::jobs::worker",
                job_id = %job.id,
                batch = %hash,
                error = %err,
                "Failed to update batch record"
            );
        }
    }
}

/// A reclaiming cycle already finished the job; its terminal state stands.
fn lost_claim(job: &JobRecord) -> JobOutcome {
    warn!(
        target = "application::jobs::worker",
        job_id = %job.id,
        "Job finished elsewhere; discarding this run's outcome"
    );
    JobOutcome::Skipped
}
