use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storefront_core::JobId;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/:job_id", get(get_job))
        .route("/:job_id/run", post(run_job))
        .route("/:job_id/cancel", post(cancel_job))
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id: JobId = match errors::parse_id(&job_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.coordinator.get(job_id).await {
        Ok(Some(job)) => (StatusCode::OK, Json(job)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "job_not_found", format!("job {job_id} not found")),
        Err(e) => errors::coordinator_error_to_response(e),
    }
}

/// Run the job's next slice now, ignoring any backoff.
pub async fn run_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id: JobId = match errors::parse_id(&job_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.coordinator.run_next(job_id).await {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(e) => errors::coordinator_error_to_response(e),
    }
}

pub async fn cancel_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id: JobId = match errors::parse_id(&job_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.coordinator.cancel(job_id).await {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(e) => errors::coordinator_error_to_response(e),
    }
}
