pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::RouterState;
use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let auth_state = state.clone();

    Router::new()
        .route(
            "/api/v1/jobs",
            get(handlers::list_jobs).post(handlers::enqueue_job),
        )
        .route("/api/v1/jobs/retry", post(handlers::retry_job_by_body))
        .route("/api/v1/jobs/{id}", get(handlers::get_job))
        .route("/api/v1/jobs/{id}/artifact", get(handlers::job_artifact))
        .route("/api/v1/jobs/{id}/retry", post(handlers::retry_job))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::api_auth,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
