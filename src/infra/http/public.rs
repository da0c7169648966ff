use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use uuid::Uuid;

use crate::application::{error::HttpError, verification::VerificationService};

use super::{
    HealthProbe, RouterState, db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub verification: Arc<VerificationService>,
    pub health: Arc<dyn HealthProbe>,
}

pub fn build_router(state: RouterState) -> Router<RouterState> {
    Router::new()
        .route("/verify/{id}", get(verify_document))
        .route("/_health", get(public_health))
        .route("/_health/db", get(public_db_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn public_health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn public_db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

/// Resolve the document id printed in a mission order's QR code.
async fn verify_document(
    State(state): State<HttpState>,
    Path(raw_id): Path<String>,
) -> Result<Response, HttpError> {
    let Ok(id) = Uuid::parse_str(raw_id.trim()) else {
        return Err(HttpError::not_found(
            "infra::http::verify_document",
            "Document not found",
            format!("malformed document id `{raw_id}`"),
        ));
    };

    match state.verification.lookup(id).await {
        Ok(Some(view)) => Ok(Json(view).into_response()),
        Ok(None) => Err(HttpError::not_found(
            "infra::http::verify_document",
            "Document not found",
            format!("no document `{id}`"),
        )),
        Err(err) => Err(HttpError::internal(
            "infra::http::verify_document",
            "Verification unavailable",
            &err,
        )),
    }
}
