use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use storefront_core::DomainError;
use storefront_infra::jobs::CoordinatorError;
use storefront_infra::{PipelineError, PublisherError};

pub fn coordinator_error_to_response(err: CoordinatorError) -> axum::response::Response {
    match err {
        CoordinatorError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "job_not_found", err.to_string()),
        CoordinatorError::Finished(_) => json_error(StatusCode::CONFLICT, "job_finished", err.to_string()),
        CoordinatorError::ShopBusy(_) => json_error(StatusCode::CONFLICT, "shop_busy", err.to_string()),
        CoordinatorError::Domain(e) => domain_error_to_response(e),
        CoordinatorError::Store(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string()),
        CoordinatorError::Repository(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "repository_error", e.to_string())
        }
    }
}

pub fn publisher_error_to_response(err: PublisherError) -> axum::response::Response {
    match err {
        PublisherError::Pipeline(PipelineError::Invalid(e)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "invalid_workflow",
                "message": e.to_string(),
                "issues": e.issues,
            })),
        )
            .into_response(),
        PublisherError::Pipeline(PipelineError::Provider(e)) => {
            json_error(StatusCode::BAD_GATEWAY, "provider_error", e.to_string())
        }
        PublisherError::Pipeline(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "publish_error", e.to_string()),
        PublisherError::Repository(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "repository_error", e.to_string())
        }
        PublisherError::Listing(e) => domain_error_to_response(e),
        PublisherError::NotListed { .. } => json_error(StatusCode::NOT_FOUND, "not_listed", err.to_string()),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path segment into a typed id.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}
