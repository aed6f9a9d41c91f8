use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use storefront_core::{ProductId, ShopId};
use storefront_infra::jobs::ScheduleOutcome;
use storefront_infra::{BatchOutcome, SkipReason};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:shop_id/publish", post(schedule_publish))
        .route("/:shop_id/products/publish", post(publish_products))
        .route("/:shop_id/products/:product_id/unpublish", post(unpublish_product))
        .route("/:shop_id/collections/publish", post(publish_collection))
        .route("/:shop_id/workflow/validate", post(validate_workflow))
}

fn shop_not_found(shop_id: ShopId) -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "shop_not_found", format!("shop {shop_id} not found"))
}

/// Start a bulk publish job over the shop's unpublished products.
pub async fn schedule_publish(
    Extension(services): Extension<Arc<AppServices>>,
    Path(shop_id): Path<String>,
    body: Option<Json<dto::ScheduleRequest>>,
) -> axum::response::Response {
    let shop_id: ShopId = match errors::parse_id(&shop_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let body = body.map(|Json(b)| b).unwrap_or_default();

    match services.coordinator.schedule(shop_id, body.batch_size).await {
        Ok(outcome @ ScheduleOutcome::Scheduled { .. }) => (StatusCode::ACCEPTED, Json(outcome)).into_response(),
        Ok(ScheduleOutcome::Skipped {
            reason: SkipReason::ShopNotFound,
        }) => shop_not_found(shop_id),
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::coordinator_error_to_response(e),
    }
}

/// Publish the given products right away as a single batch.
pub async fn publish_products(
    Extension(services): Extension<Arc<AppServices>>,
    Path(shop_id): Path<String>,
    Json(body): Json<dto::PublishProductsRequest>,
) -> axum::response::Response {
    let shop_id: ShopId = match errors::parse_id(&shop_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if body.product_ids.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "product_ids must not be empty");
    }

    batch_response(shop_id, services.publisher.publish_products(shop_id, &body.product_ids).await)
}

pub async fn publish_collection(
    Extension(services): Extension<Arc<AppServices>>,
    Path(shop_id): Path<String>,
    Json(body): Json<dto::PublishCollectionRequest>,
) -> axum::response::Response {
    let shop_id: ShopId = match errors::parse_id(&shop_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    batch_response(
        shop_id,
        services.publisher.publish_collection(shop_id, body.collection_id).await,
    )
}

pub async fn unpublish_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path((shop_id, product_id)): Path<(String, String)>,
) -> axum::response::Response {
    let shop_id: ShopId = match errors::parse_id(&shop_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let product_id: ProductId = match errors::parse_id(&product_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.publisher.unpublish(shop_id, product_id).await {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(e) => errors::publisher_error_to_response(e),
    }
}

/// Check the shop's stored workflow without running it.
pub async fn validate_workflow(
    Extension(services): Extension<Arc<AppServices>>,
    Path(shop_id): Path<String>,
) -> axum::response::Response {
    let shop_id: ShopId = match errors::parse_id(&shop_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.repository.shop(shop_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return shop_not_found(shop_id),
        Err(e) => return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "repository_error", e.to_string()),
    }

    let workflow = match services.repository.workflow(shop_id).await {
        Ok(w) => w.filter(|w| !w.is_empty()),
        Err(e) => return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "repository_error", e.to_string()),
    };

    let report = match workflow {
        None => dto::WorkflowReport {
            workflow_id: None,
            valid: true,
            steps: 0,
            direct_upload: true,
            issues: Vec::new(),
        },
        Some(workflow) => {
            let issues = match services.validate_workflow(&workflow) {
                Ok(()) => Vec::new(),
                Err(e) => e.issues,
            };
            dto::WorkflowReport {
                workflow_id: Some(workflow.id),
                valid: issues.is_empty(),
                steps: workflow.steps().len(),
                direct_upload: false,
                issues,
            }
        }
    };

    (StatusCode::OK, Json(report)).into_response()
}

fn batch_response(
    shop_id: ShopId,
    result: Result<BatchOutcome, storefront_infra::PublisherError>,
) -> axum::response::Response {
    match result {
        Ok(BatchOutcome::Skipped {
            reason: SkipReason::ShopNotFound,
        }) => shop_not_found(shop_id),
        Ok(BatchOutcome::Skipped {
            reason: SkipReason::ShopBusy,
        }) => errors::json_error(StatusCode::CONFLICT, "shop_busy", SkipReason::ShopBusy.to_string()),
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::publisher_error_to_response(e),
    }
}
