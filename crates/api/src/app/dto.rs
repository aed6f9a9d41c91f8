use serde::{Deserialize, Serialize};

use storefront_core::{CollectionId, ProductId, WorkflowId};
use storefront_workflow::ValidationIssue;

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleRequest {
    /// Products per run; the configured default when absent.
    pub batch_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PublishProductsRequest {
    pub product_ids: Vec<ProductId>,
}

#[derive(Debug, Deserialize)]
pub struct PublishCollectionRequest {
    pub collection_id: CollectionId,
}

#[derive(Debug, Serialize)]
pub struct WorkflowReport {
    pub workflow_id: Option<WorkflowId>,
    pub valid: bool,
    pub steps: usize,
    /// No steps configured: products go straight to the shop.
    pub direct_upload: bool,
    pub issues: Vec<ValidationIssue>,
}
