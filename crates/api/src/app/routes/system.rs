use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, Json};

use storefront_workflow::WorkflowComponent;

use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// The step types a workflow may use, with their parameter schemas.
pub async fn components(Extension(services): Extension<Arc<AppServices>>) -> Json<Vec<WorkflowComponent>> {
    Json(services.registry.iter().cloned().collect())
}
