//! In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat, dictionary};
use time::OffsetDateTime;
use time::macros::{date, time};
use tokio::sync::Mutex;
use uuid::Uuid;

use missive::application::documents::{DocumentGenerator, DocumentSettings};
use missive::application::mail::{MailError, Mailer, MissionOrderMail};
use missive::application::render::{DocumentRenderer, RenderError, RenderRequest};
use missive::application::repos::{
    ApiKeysRepo, BatchesRepo, CreateApiKeyParams, DocumentsRepo, JobsRepo, MissionSourceRepo,
    NewDocumentRecord, NewJobRecord, RepoError, UpsertBatchParams,
};
use missive::domain::api_keys::ApiKeyRecord;
use missive::domain::entities::{BatchRecord, DocumentRecord, JobRecord};
use missive::domain::mission::MissionSource;
use missive::domain::subjects::SubjectKey;
use missive::domain::types::{Direction, JobStatus, JobType};
use missive::infra::storage::DocumentStorage;

pub const ELSEWHERE_ARTIFACT: &str = "batches/finished-elsewhere.pdf";

pub fn subject(raw: &str) -> SubjectKey {
    SubjectKey::parse(raw).expect("valid subject")
}

#[derive(Default)]
pub struct MemoryJobs {
    jobs: Mutex<Vec<JobRecord>>,
    /// Next `find_active_by_dedupe` misses once, as if a concurrent insert had not landed yet.
    pub blind_lookup_once: AtomicBool,
    /// Next `complete_job` fails.
    pub fail_completion_once: AtomicBool,
    /// Next progress write finds the job already completed by another cycle.
    pub finished_elsewhere_once: AtomicBool,
    pub inserts: AtomicUsize,
}

impl MemoryJobs {
    pub async fn get(&self, id: Uuid) -> JobRecord {
        self.jobs
            .lock()
            .await
            .iter()
            .find(|job| job.id == id)
            .cloned()
            .expect("job exists")
    }

    pub async fn all(&self) -> Vec<JobRecord> {
        self.jobs.lock().await.clone()
    }

    /// Backdate `updated_at` so the job looks abandoned.
    pub async fn age(&self, id: Uuid, by: time::Duration) {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.iter_mut().find(|job| job.id == id) {
            job.updated_at -= by;
        }
    }

    pub async fn force_status(&self, id: Uuid, status: JobStatus) {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.iter_mut().find(|job| job.id == id) {
            job.status = status;
        }
    }

    pub async fn force_artifact(&self, id: Uuid, artifact_path: &str) {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.iter_mut().find(|job| job.id == id) {
            job.artifact_path = Some(artifact_path.to_string());
        }
    }

    fn holder<'a>(
        jobs: &'a [JobRecord],
        job_type: JobType,
        dedupe_key: &str,
    ) -> Option<&'a JobRecord> {
        jobs.iter()
            .filter(|job| {
                job.job_type() == job_type
                    && job.dedupe_key.as_deref() == Some(dedupe_key)
                    && job.status.holds_dedupe_key()
            })
            .max_by_key(|job| job.created_at)
    }

    fn eligible(job: &JobRecord, stale_before: OffsetDateTime) -> bool {
        job.status == JobStatus::Pending
            || (job.status == JobStatus::Processing && job.updated_at < stale_before)
    }
}

fn duplicate() -> RepoError {
    RepoError::Duplicate {
        constraint: "jobs_dedupe_active_idx".to_string(),
    }
}

#[async_trait]
impl JobsRepo for MemoryJobs {
    async fn find_active_by_dedupe(
        &self,
        job_type: JobType,
        dedupe_key: &str,
    ) -> Result<Option<JobRecord>, RepoError> {
        if self.blind_lookup_once.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let jobs = self.jobs.lock().await;
        Ok(Self::holder(&jobs, job_type, dedupe_key).cloned())
    }

    async fn insert_job(&self, job: NewJobRecord) -> Result<JobRecord, RepoError> {
        let mut jobs = self.jobs.lock().await;
        if let Some(key) = job.dedupe_key.as_deref()
            && Self::holder(&jobs, job.payload.job_type(), key).is_some()
        {
            return Err(duplicate());
        }
        let now = OffsetDateTime::now_utc();
        let record = JobRecord {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            payload: job.payload,
            dedupe_key: job.dedupe_key,
            owner: job.owner,
            priority: job.priority,
            progress: 0,
            error_message: None,
            artifact_path: None,
            created_at: now,
            updated_at: now,
        };
        jobs.push(record.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<JobRecord>, RepoError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.iter().find(|job| job.id == id).cloned())
    }

    async fn list_jobs_for_owner(
        &self,
        owner: &str,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError> {
        let jobs = self.jobs.lock().await;
        let mut owned: Vec<JobRecord> = jobs
            .iter()
            .filter(|job| job.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned.truncate(limit as usize);
        Ok(owned)
    }

    async fn list_eligible(
        &self,
        stale_before: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError> {
        let jobs = self.jobs.lock().await;
        let mut eligible: Vec<JobRecord> = jobs
            .iter()
            .filter(|job| Self::eligible(job, stale_before))
            .cloned()
            .collect();
        eligible.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        eligible.truncate(limit as usize);
        Ok(eligible)
    }

    async fn claim_job(
        &self,
        id: Uuid,
        stale_before: OffsetDateTime,
    ) -> Result<Option<JobRecord>, RepoError> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs
            .iter_mut()
            .find(|job| job.id == id && Self::eligible(job, stale_before))
        else {
            return Ok(None);
        };
        job.status = JobStatus::Processing;
        job.updated_at = OffsetDateTime::now_utc();
        Ok(Some(job.clone()))
    }

    async fn record_progress(&self, id: Uuid, progress: i32) -> Result<(), RepoError> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs
            .iter_mut()
            .find(|job| job.id == id && job.status == JobStatus::Processing)
        else {
            return Ok(());
        };
        if self.finished_elsewhere_once.swap(false, Ordering::SeqCst) {
            job.status = JobStatus::Completed;
            job.artifact_path = Some(ELSEWHERE_ARTIFACT.to_string());
            job.updated_at = OffsetDateTime::now_utc();
            return Ok(());
        }
        job.progress = job.progress.max(progress);
        job.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn complete_job(
        &self,
        id: Uuid,
        artifact_path: &str,
        progress: i32,
    ) -> Result<bool, RepoError> {
        if self.fail_completion_once.swap(false, Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs
            .iter_mut()
            .find(|job| job.id == id && job.status == JobStatus::Processing)
        else {
            return Ok(false);
        };
        job.status = JobStatus::Completed;
        job.artifact_path = Some(artifact_path.to_string());
        job.error_message = None;
        job.progress = job.progress.max(progress);
        job.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn fail_job(
        &self,
        id: Uuid,
        message: &str,
        progress: i32,
    ) -> Result<bool, RepoError> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs
            .iter_mut()
            .find(|job| job.id == id && job.status == JobStatus::Processing)
        else {
            return Ok(false);
        };
        job.status = JobStatus::Failed;
        job.error_message = Some(message.to_string());
        job.artifact_path = None;
        job.progress = job.progress.max(progress);
        job.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn reset_job(&self, id: Uuid) -> Result<Option<JobRecord>, RepoError> {
        let mut jobs = self.jobs.lock().await;
        let Some(index) = jobs
            .iter()
            .position(|job| job.id == id && job.status == JobStatus::Failed)
        else {
            return Ok(None);
        };
        if let Some(key) = jobs[index].dedupe_key.clone()
            && Self::holder(&jobs, jobs[index].job_type(), &key).is_some()
        {
            return Err(duplicate());
        }
        let job = &mut jobs[index];
        job.status = JobStatus::Pending;
        job.progress = 0;
        job.error_message = None;
        job.artifact_path = None;
        job.updated_at = OffsetDateTime::now_utc();
        Ok(Some(job.clone()))
    }
}

#[derive(Default)]
pub struct MemoryDocuments {
    records: Mutex<Vec<DocumentRecord>>,
    sequence: AtomicI64,
}

impl MemoryDocuments {
    pub async fn all(&self) -> Vec<DocumentRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl DocumentsRepo for MemoryDocuments {
    async fn latest_for_subject(
        &self,
        subject: &SubjectKey,
    ) -> Result<Option<DocumentRecord>, RepoError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|record| &record.subject_key == subject)
            .max_by_key(|record| record.sequence_number)
            .cloned())
    }

    async fn next_sequence_number(&self) -> Result<i64, RepoError> {
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn insert_document(
        &self,
        document: NewDocumentRecord,
    ) -> Result<DocumentRecord, RepoError> {
        let record = DocumentRecord {
            id: Uuid::new_v4(),
            sequence_number: document.sequence_number,
            subject_key: document.subject_key,
            data_hash: document.data_hash,
            data_snapshot: document.data_snapshot,
            storage_path: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.records.lock().await.push(record.clone());
        Ok(record)
    }

    async fn set_storage_path(&self, id: Uuid, storage_path: &str) -> Result<(), RepoError> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(RepoError::NotFound)?;
        record.storage_path = Some(storage_path.to_string());
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, RepoError> {
        let records = self.records.lock().await;
        Ok(records.iter().find(|record| record.id == id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryBatches {
    batches: Mutex<HashMap<String, BatchRecord>>,
}

#[async_trait]
impl BatchesRepo for MemoryBatches {
    async fn upsert_batch(&self, params: UpsertBatchParams) -> Result<BatchRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut batches = self.batches.lock().await;
        let created_at = batches
            .get(&params.hash)
            .map(|existing| existing.created_at)
            .unwrap_or(now);
        let record = BatchRecord {
            hash: params.hash.clone(),
            orders: params.orders,
            status: params.status,
            artifact_path: params.artifact_path,
            error: params.error,
            created_at,
            updated_at: now,
        };
        batches.insert(params.hash, record.clone());
        Ok(record)
    }

    async fn find_batch(&self, hash: &str) -> Result<Option<BatchRecord>, RepoError> {
        Ok(self.batches.lock().await.get(hash).cloned())
    }
}

/// Scheduling data keyed by subject. Subjects never registered are unknown.
#[derive(Default)]
pub struct MemorySources {
    missions: Mutex<HashMap<SubjectKey, MissionSource>>,
}

impl MemorySources {
    pub fn with(subjects: &[&str]) -> Self {
        let missions = subjects
            .iter()
            .map(|raw| {
                let key = subject(raw);
                (key.clone(), mission(key))
            })
            .collect();
        Self {
            missions: Mutex::new(missions),
        }
    }

    /// Source data appears upstream for a subject that had none.
    pub async fn publish(&self, raw: &str) {
        let key = subject(raw);
        self.missions
            .lock()
            .await
            .insert(key.clone(), mission(key));
    }

    pub async fn rename_official(&self, raw: &str, name: &str) {
        let mut missions = self.missions.lock().await;
        if let Some(mission) = missions.get_mut(&subject(raw)) {
            mission.official_name = name.to_string();
        }
    }
}

pub fn mission(key: SubjectKey) -> MissionSource {
    MissionSource {
        official_name: format!("Official {}", key.official_id()),
        official_email: Some(format!("{}@example.org", key.official_id())),
        role: "Referee".to_string(),
        competition: "Ligue 1".to_string(),
        home_team: "Home FC".to_string(),
        away_team: "Away SC".to_string(),
        venue: "Stade Municipal".to_string(),
        city: "Oran".to_string(),
        match_date: date!(2026 - 03 - 14),
        kickoff_time: time!(17:30),
        subject: key,
    }
}

#[async_trait]
impl MissionSourceRepo for MemorySources {
    async fn fetch_mission(
        &self,
        subject: &SubjectKey,
    ) -> Result<Option<MissionSource>, RepoError> {
        Ok(self.missions.lock().await.get(subject).cloned())
    }
}

#[derive(Default)]
pub struct MemoryApiKeys {
    keys: Mutex<Vec<ApiKeyRecord>>,
}

#[async_trait]
impl ApiKeysRepo for MemoryApiKeys {
    async fn create_key(&self, params: CreateApiKeyParams) -> Result<ApiKeyRecord, RepoError> {
        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            name: params.name,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            scopes: params.scopes,
            expires_at: params.expires_at,
            revoked_at: None,
            last_used_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.keys.lock().await.push(record.clone());
        Ok(record)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, RepoError> {
        let keys = self.keys.lock().await;
        Ok(keys.iter().find(|key| key.prefix == prefix).cloned())
    }

    async fn revoke_key(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError> {
        let mut keys = self.keys.lock().await;
        if let Some(key) = keys.iter_mut().find(|key| key.id == id) {
            key.revoked_at.get_or_insert(revoked_at);
        }
        Ok(())
    }

    async fn update_last_used(&self, id: Uuid, used_at: OffsetDateTime) -> Result<(), RepoError> {
        let mut keys = self.keys.lock().await;
        if let Some(key) = keys.iter_mut().find(|key| key.id == id) {
            key.last_used_at = Some(used_at);
        }
        Ok(())
    }
}

/// One-page PDF whose content stream names the subject and sequence number.
pub fn labeled_pdf(label: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let content = Content {
        operations: vec![Operation::new(
            "Tj",
            vec![Object::String(
                label.as_bytes().to_vec(),
                StringFormat::Literal,
            )],
        )],
    };
    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        content.encode().expect("content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save");
    bytes
}

pub fn page_labels(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).expect("pdf loads");
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let content = doc.get_page_content(page_id).expect("content");
            String::from_utf8_lossy(&content).to_string()
        })
        .collect()
}

/// Renders a labeled page per request and fails for subjects marked broken.
#[derive(Default)]
pub struct StubRenderer {
    pub renders: AtomicUsize,
    broken: std::sync::Mutex<HashSet<SubjectKey>>,
}

impl StubRenderer {
    pub fn break_subject(&self, raw: &str) {
        if let Ok(mut broken) = self.broken.lock() {
            broken.insert(subject(raw));
        }
    }
}

#[async_trait]
impl DocumentRenderer for StubRenderer {
    async fn render(&self, request: RenderRequest) -> Result<Vec<u8>, RenderError> {
        let subject = request.input.mission.subject.clone();
        let broken = self
            .broken
            .lock()
            .map(|set| set.contains(&subject))
            .unwrap_or(false);
        if broken {
            return Err(RenderError::Pdf(format!("cannot draw {subject}")));
        }
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(labeled_pdf(&format!(
            "{subject}#{}",
            request.sequence_number
        )))
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<MissionOrderMail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: MissionOrderMail) -> Result<(), MailError> {
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

pub fn document_settings() -> DocumentSettings {
    DocumentSettings {
        direction: Direction::Rtl,
        authority: "Ligue Régionale de Football".to_string(),
        title: "Ordre de mission".to_string(),
        order_suffix: "LRF".to_string(),
        instructions: "Présentez-vous une heure avant le coup d'envoi.".to_string(),
        verify_base_url: "https://orders.example.org/verify".to_string(),
    }
}

/// Every collaborator of the generation path, wired over one temporary storage root.
pub struct Harness {
    pub jobs: Arc<MemoryJobs>,
    pub documents: Arc<MemoryDocuments>,
    pub batches: Arc<MemoryBatches>,
    pub sources: Arc<MemorySources>,
    pub renderer: Arc<StubRenderer>,
    pub storage: Arc<DocumentStorage>,
    pub generator: Arc<DocumentGenerator>,
    root: tempfile::TempDir,
}

impl Harness {
    pub fn new(subjects: &[&str]) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let jobs = Arc::new(MemoryJobs::default());
        let documents = Arc::new(MemoryDocuments::default());
        let batches = Arc::new(MemoryBatches::default());
        let sources = Arc::new(MemorySources::with(subjects));
        let renderer = Arc::new(StubRenderer::default());
        let storage = Arc::new(DocumentStorage::new(root.path().to_path_buf()).expect("storage"));
        let generator = Arc::new(DocumentGenerator::new(
            sources.clone(),
            documents.clone(),
            storage.clone(),
            renderer.clone(),
            document_settings(),
        ));
        Self {
            jobs,
            documents,
            batches,
            sources,
            renderer,
            storage,
            generator,
            root,
        }
    }

    /// Where the storage keeps its objects on disk.
    pub fn storage_root(&self) -> &std::path::Path {
        self.root.path()
    }
}
