//! Storefront provider adapters.
//!
//! Two families with incompatible write models sit behind one trait:
//!
//! - `shopify`: bulk asynchronous mutations fed by a staged JSONL upload.
//! - `woocommerce`: synchronous per-resource REST calls.
//!
//! Adapters never retry. Batch-level errors bubble up to the job coordinator,
//! which retries whole batches.

pub mod memory;
pub mod shopify;
pub mod woocommerce;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_catalog::{Product, ProviderKind, PublishReceipt, Shop};
use storefront_core::{ProductId, RunId, ShopId};

use crate::media::MediaSyncError;
use crate::reconcile::ReconcileError;
use crate::run::PublishRun;

pub use shopify::ShopifyAdapter;
pub use woocommerce::WooCommerceAdapter;

/// A `userErrors` entry from the GraphQL API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(String),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("provider reported errors: {}", user_error_summary(.0))]
    UserErrors(Vec<UserError>),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("media sync failed: {0}")]
    Media(String),

    #[error("run belongs to shop {run_shop}, not {shop}")]
    RunMismatch { run_shop: ShopId, shop: ShopId },

    #[error("configuration error: {0}")]
    Configuration(String),

    /// A product was created remotely, then could neither be completed nor
    /// deleted. Publishing it again would create a duplicate.
    #[error("product {remote_id} left incomplete on the store: {reason}")]
    Incomplete { remote_id: String, reason: String },
}

impl ProviderError {
    /// Whether re-running the batch later may succeed.
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            ProviderError::RunMismatch { .. } | ProviderError::Configuration(_) | ProviderError::Incomplete { .. }
        )
    }
}

impl From<MediaSyncError> for ProviderError {
    fn from(err: MediaSyncError) -> Self {
        ProviderError::Media(err.to_string())
    }
}

fn user_error_summary(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| match &e.field {
            Some(field) if !field.is_empty() => format!("{}: {}", field.join("."), e.message),
            _ => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedProduct {
    pub product_id: ProductId,
    /// Provider-side reference (bulk operation id or remote product id).
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductFailure {
    pub product_id: ProductId,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadProgress {
    Nothing,
    Partial,
    Full,
}

/// Outcome of one provider call over a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub provider: ProviderKind,
    pub published: Vec<PublishedProduct>,
    pub failures: Vec<ProductFailure>,
}

impl UploadReport {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            published: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn published(&mut self, product_id: ProductId, reference: impl Into<String>) {
        self.published.push(PublishedProduct {
            product_id,
            reference: reference.into(),
        });
    }

    pub fn failed(&mut self, product_id: ProductId, reason: impl Into<String>) {
        self.failures.push(ProductFailure {
            product_id,
            reason: reason.into(),
        });
    }

    pub fn progress(&self) -> UploadProgress {
        match (self.published.is_empty(), self.failures.is_empty()) {
            (true, _) => UploadProgress::Nothing,
            (false, true) => UploadProgress::Full,
            (false, false) => UploadProgress::Partial,
        }
    }

    /// Receipt backing the Published transition of `product_id`, if it was accepted.
    pub fn receipt_for(&self, product_id: ProductId, run_id: RunId) -> Option<PublishReceipt> {
        self.published
            .iter()
            .find(|p| p.product_id == product_id)
            .map(|p| PublishReceipt {
                provider: self.provider,
                run_id,
                reference: p.reference.clone(),
            })
    }

    pub fn failure_for(&self, product_id: ProductId) -> Option<&str> {
        self.failures
            .iter()
            .find(|f| f.product_id == product_id)
            .map(|f| f.reason.as_str())
    }

    /// Fold another report of the same provider into this one.
    pub fn merge(&mut self, other: UploadReport) {
        self.published.extend(other.published);
        self.failures.extend(other.failures);
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Publish one product synchronously. A rejected product is an error.
    async fn upload_product(
        &self,
        run: &PublishRun,
        shop: &Shop,
        product: &Product,
    ) -> Result<UploadReport, ProviderError>;

    /// Publish a batch using the provider's batch strategy.
    async fn upload_product_many(
        &self,
        run: &PublishRun,
        shop: &Shop,
        products: &[Product],
    ) -> Result<UploadReport, ProviderError>;
}

/// Reject a run created for another shop.
pub(crate) fn ensure_run_matches(run: &PublishRun, shop: &Shop) -> Result<(), ProviderError> {
    if run.shop_id() != shop.id {
        return Err(ProviderError::RunMismatch {
            run_shop: run.shop_id(),
            shop: shop.id,
        });
    }
    Ok(())
}

/// Adapter per provider kind.
#[derive(Clone, Default)]
pub struct Providers {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&kind).cloned()
    }
}
