//! Job API handlers.
//!
//! A deduplicated job is shared by every caller whose request collapsed onto it, so any
//! `jobs_read` key may follow a job by id. Listing and retry stay with the enqueuing key.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use missive_api_types::{EnqueueRequest, JobList, RetryRequest, RetryResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::application::api_keys::ApiPrincipal;
use crate::application::jobs::{EnqueueCommand, EnqueueError, RetryError};
use crate::application::repos::RepoError;
use crate::domain::api_keys::ApiScope;
use crate::domain::entities::JobRecord;
use crate::domain::types::JobStatus;
use crate::infra::storage::StorageError;

use super::error::{ApiError, codes};
use super::state::ApiState;

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct JobsListQuery {
    pub limit: Option<u32>,
}

pub async fn enqueue_job(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    payload: Result<Json<EnqueueRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    principal
        .requires(ApiScope::JobsWrite)
        .map_err(|_| ApiError::forbidden())?;
    let Json(request) = payload
        .map_err(|err| ApiError::bad_request("Malformed request body", Some(err.body_text())))?;

    let outcome = state
        .enqueue
        .enqueue(Some(principal.owner()), EnqueueCommand::from(request))
        .await
        .map_err(enqueue_to_api)?;

    let status = if outcome.reused {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome.response())).into_response())
}

pub async fn list_jobs(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Query(query): Query<JobsListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    principal
        .requires(ApiScope::JobsRead)
        .map_err(|_| ApiError::forbidden())?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let jobs = state
        .jobs
        .list_jobs_for_owner(principal.owner(), limit)
        .await
        .map_err(repo_to_api)?;

    Ok(Json(JobList {
        items: jobs.iter().map(JobRecord::view).collect(),
    }))
}

pub async fn get_job(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal
        .requires(ApiScope::JobsRead)
        .map_err(|_| ApiError::forbidden())?;

    let job = find_job(&state, id).await?;
    Ok(Json(job.view()))
}

pub async fn job_artifact(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    principal
        .requires(ApiScope::JobsRead)
        .map_err(|_| ApiError::forbidden())?;

    let job = find_job(&state, id).await?;
    let path = match (job.status, job.artifact_path.as_deref()) {
        (JobStatus::Completed, Some(path)) => path.to_string(),
        (status, _) => {
            return Err(ApiError::job_conflict(
                codes::ARTIFACT_PENDING,
                "Job has no artifact yet",
                status,
            ));
        }
    };

    let bytes = state
        .storage
        .get(&path)
        .await
        .map_err(storage_to_api)?
        .ok_or_else(|| ApiError::not_found("artifact missing from storage"))?;

    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{id}.pdf\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

pub async fn retry_job(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    retry(&state, &principal, id).await
}

pub async fn retry_job_by_body(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    payload: Result<Json<RetryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload
        .map_err(|err| ApiError::bad_request("Malformed request body", Some(err.body_text())))?;
    retry(&state, &principal, request.job_id).await
}

async fn retry(
    state: &ApiState,
    principal: &ApiPrincipal,
    id: Uuid,
) -> Result<Json<RetryResponse>, ApiError> {
    principal
        .requires(ApiScope::JobsWrite)
        .map_err(|_| ApiError::forbidden())?;

    let job = state
        .retry
        .retry(principal.owner(), id)
        .await
        .map_err(retry_to_api)?;

    Ok(Json(RetryResponse {
        success: true,
        job: job.view(),
    }))
}

async fn find_job(state: &ApiState, id: Uuid) -> Result<JobRecord, ApiError> {
    state
        .jobs
        .find_job(id)
        .await
        .map_err(repo_to_api)?
        .ok_or_else(|| ApiError::not_found("job not found"))
}

fn enqueue_to_api(err: EnqueueError) -> ApiError {
    match err {
        EnqueueError::Unauthorized => ApiError::unauthorized(),
        EnqueueError::Validation(err) => ApiError::invalid_input("Invalid job request", err.to_string()),
        EnqueueError::Repo(err) => repo_to_api(err),
    }
}

fn retry_to_api(err: RetryError) -> ApiError {
    match err {
        RetryError::NotFound(_) => ApiError::not_found("job not found"),
        RetryError::Forbidden => ApiError::new(
            StatusCode::FORBIDDEN,
            codes::FORBIDDEN,
            "Only the enqueuing caller may retry this job",
            None,
        ),
        RetryError::NotRetryable(status) => ApiError::job_conflict(
            codes::NOT_RETRYABLE,
            "Only failed jobs can be retried",
            status,
        ),
        RetryError::Superseded { active_job_id } => ApiError::new(
            StatusCode::CONFLICT,
            codes::SUPERSEDED,
            "An equivalent job is already active",
            Some(active_job_id.to_string()),
        ),
        RetryError::Repo(err) => repo_to_api(err),
    }
}

fn storage_to_api(err: StorageError) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        codes::STORAGE,
        "Artifact could not be read",
        Some(err.to_string()),
    )
}

fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::invalid_input("Invalid input", message),
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(msg) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(msg),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_errors_map_to_conflicts() {
        let err = retry_to_api(RetryError::NotRetryable(JobStatus::Processing));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), codes::NOT_RETRYABLE);

        let err = retry_to_api(RetryError::Superseded {
            active_job_id: Uuid::nil(),
        });
        assert_eq!(err.code(), codes::SUPERSEDED);

        let err = retry_to_api(RetryError::Forbidden);
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = retry_to_api(RetryError::NotFound(Uuid::nil()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn repo_timeouts_are_unavailable() {
        let err = repo_to_api(RepoError::Timeout);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
