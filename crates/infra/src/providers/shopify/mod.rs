//! Bulk-staged adapter for the Shopify Admin GraphQL API.

pub mod api;
pub mod client;
pub mod input;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use storefront_catalog::{Credentials, Product, ProviderKind, Shop};

use crate::media::MediaSync;
use crate::reconcile::{self, DirectoryError, LocalName, MatchMode, RemoteDirectory, RemoteEntry};
use crate::run::{PublishRun, RemoteKind};

use super::{ProviderAdapter, ProviderError, UploadReport, ensure_run_matches};

pub use api::{BulkOperation, BulkStagedApi, StagedParameter, StagedTarget};
pub use client::ShopifyClient;
pub use input::{PRODUCT_CREATE_MUTATION, ProductLine, product_line, to_jsonl};

const STAGED_FILENAME: &str = "bulk_op_vars.jsonl";

/// Shop collections as a reconciliation directory, matched by exact title.
struct CollectionDirectory<'a> {
    api: &'a dyn BulkStagedApi,
    credentials: &'a Credentials,
}

#[async_trait]
impl RemoteDirectory for CollectionDirectory<'_> {
    fn kind(&self) -> RemoteKind {
        RemoteKind::Collection
    }

    fn match_mode(&self) -> MatchMode {
        MatchMode::Exact
    }

    async fn search(&self, name: &str) -> Result<Vec<RemoteEntry>, DirectoryError> {
        self.api
            .find_collections(self.credentials, name)
            .await
            .map_err(|e| DirectoryError(e.to_string()))
    }

    async fn create(&self, name: &str, description: &str) -> Result<String, DirectoryError> {
        self.api
            .create_collection(self.credentials, name, description)
            .await
            .map_err(|e| DirectoryError(e.to_string()))
    }
}

pub struct ShopifyAdapter {
    api: Arc<dyn BulkStagedApi>,
    media: MediaSync,
}

impl ShopifyAdapter {
    pub fn new(api: Arc<dyn BulkStagedApi>, media: MediaSync) -> Self {
        Self { api, media }
    }

    fn check_shop(shop: &Shop) -> Result<(), ProviderError> {
        if shop.provider != ProviderKind::Shopify {
            return Err(ProviderError::Configuration(format!(
                "shop {} is a {} shop",
                shop.id, shop.provider
            )));
        }
        Ok(())
    }

    async fn collection_ids(
        &self,
        run: &PublishRun,
        shop: &Shop,
        products: &[Product],
    ) -> Result<BTreeMap<String, String>, ProviderError> {
        let wanted: Vec<LocalName> = products
            .iter()
            .flat_map(|p| p.collections.iter())
            .map(|c| LocalName::new(c.name.clone(), c.description.clone()))
            .collect();
        if wanted.is_empty() {
            return Ok(BTreeMap::new());
        }

        let directory = CollectionDirectory {
            api: self.api.as_ref(),
            credentials: &shop.credentials,
        };
        Ok(reconcile::resolve(&directory, run, &wanted).await?)
    }

    /// First inventory location, looked up once per run.
    async fn location(&self, run: &PublishRun, shop: &Shop) -> Result<Option<String>, ProviderError> {
        let mut cache = run.cache().await;
        if let Some(location) = cache.location() {
            return Ok(location.map(str::to_string));
        }
        let location = self.api.first_location(&shop.credentials).await?;
        if location.is_none() {
            info!(shop_id = %shop.id, "shop has no inventory location; skipping quantities");
        }
        cache.set_location(location.clone());
        Ok(location)
    }

    async fn lines(
        &self,
        run: &PublishRun,
        shop: &Shop,
        products: &[Product],
    ) -> Result<Vec<ProductLine>, ProviderError> {
        let collection_ids = self.collection_ids(run, shop, products).await?;
        let location = self.location(run, shop).await?;

        let mut lines = Vec::with_capacity(products.len());
        for product in products {
            let mut product = product.clone();
            let media = self.media.durable_urls(&mut product).await?;
            lines.push(product_line(&product, &collection_ids, location.as_deref(), media));
        }
        Ok(lines)
    }
}

#[async_trait]
impl ProviderAdapter for ShopifyAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Shopify
    }

    #[instrument(skip_all, fields(shop_id = %shop.id, run_id = %run.run_id(), product_id = %product.id), err)]
    async fn upload_product(
        &self,
        run: &PublishRun,
        shop: &Shop,
        product: &Product,
    ) -> Result<UploadReport, ProviderError> {
        ensure_run_matches(run, shop)?;
        Self::check_shop(shop)?;

        let mut lines = self.lines(run, shop, std::slice::from_ref(product)).await?;
        let line = lines
            .pop()
            .ok_or_else(|| ProviderError::Decode("no product line built".to_string()))?;
        let remote_id = self.api.create_product(&shop.credentials, &line).await?;

        info!(remote_id = %remote_id, "product created");
        let mut report = UploadReport::new(ProviderKind::Shopify);
        report.published(product.id, remote_id);
        Ok(report)
    }

    #[instrument(skip_all, fields(shop_id = %shop.id, run_id = %run.run_id(), count = products.len()), err)]
    async fn upload_product_many(
        &self,
        run: &PublishRun,
        shop: &Shop,
        products: &[Product],
    ) -> Result<UploadReport, ProviderError> {
        ensure_run_matches(run, shop)?;
        Self::check_shop(shop)?;

        let mut report = UploadReport::new(ProviderKind::Shopify);
        if products.is_empty() {
            return Ok(report);
        }

        let lines = self.lines(run, shop, products).await?;
        let payload = to_jsonl(&lines).map_err(|e| ProviderError::Decode(e.to_string()))?;

        let target = self
            .api
            .staged_upload_target(&shop.credentials, STAGED_FILENAME)
            .await?;
        let path = target
            .key()
            .ok_or_else(|| ProviderError::Decode("staged target has no `key` parameter".to_string()))?
            .to_string();
        self.api
            .upload_staged_file(&target, STAGED_FILENAME, payload.into_bytes())
            .await?;
        let operation = self
            .api
            .run_bulk_mutation(&shop.credentials, PRODUCT_CREATE_MUTATION, &path)
            .await?;

        info!(bulk_operation = %operation.id, status = %operation.status, "bulk operation started");
        for product in products {
            report.published(product.id, operation.id.clone());
        }
        Ok(report)
    }
}
