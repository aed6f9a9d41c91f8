//! Per-item REST adapter for WooCommerce.

pub mod api;
pub mod client;
pub mod payload;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use storefront_catalog::{Credentials, Product, ProviderKind, Shop};

use crate::media::MediaSync;
use crate::reconcile::{self, DirectoryError, LocalName, MatchMode, RemoteDirectory, RemoteEntry};
use crate::run::{PublishRun, RemoteKind};

use super::{ProviderAdapter, ProviderError, UploadReport, ensure_run_matches};

pub use api::RestCatalogApi;
pub use client::WooCommerceClient;
pub use payload::{ProductPayload, VariationPayload, product_payload};

struct CategoryDirectory<'a> {
    api: &'a dyn RestCatalogApi,
    credentials: &'a Credentials,
}

#[async_trait]
impl RemoteDirectory for CategoryDirectory<'_> {
    fn kind(&self) -> RemoteKind {
        RemoteKind::Category
    }

    fn match_mode(&self) -> MatchMode {
        MatchMode::CaseInsensitive
    }

    async fn search(&self, name: &str) -> Result<Vec<RemoteEntry>, DirectoryError> {
        self.api
            .search_categories(self.credentials, name)
            .await
            .map_err(|e| DirectoryError(e.to_string()))
    }

    async fn create(&self, name: &str, description: &str) -> Result<String, DirectoryError> {
        self.api
            .create_category(self.credentials, name, description)
            .await
            .map_err(|e| DirectoryError(e.to_string()))
    }
}

struct AttributeDirectory<'a> {
    api: &'a dyn RestCatalogApi,
    credentials: &'a Credentials,
}

#[async_trait]
impl RemoteDirectory for AttributeDirectory<'_> {
    fn kind(&self) -> RemoteKind {
        RemoteKind::Attribute
    }

    fn match_mode(&self) -> MatchMode {
        MatchMode::CaseInsensitive
    }

    async fn search(&self, _name: &str) -> Result<Vec<RemoteEntry>, DirectoryError> {
        self.api
            .list_attributes(self.credentials)
            .await
            .map_err(|e| DirectoryError(e.to_string()))
    }

    async fn create(&self, name: &str, _description: &str) -> Result<String, DirectoryError> {
        self.api
            .create_attribute(self.credentials, name)
            .await
            .map_err(|e| DirectoryError(e.to_string()))
    }
}

/// Remote ids resolved for one batch.
struct Resolved {
    categories: BTreeMap<String, String>,
    attributes: BTreeMap<String, String>,
}

pub struct WooCommerceAdapter {
    api: Arc<dyn RestCatalogApi>,
    media: MediaSync,
}

impl WooCommerceAdapter {
    pub fn new(api: Arc<dyn RestCatalogApi>, media: MediaSync) -> Self {
        Self { api, media }
    }

    fn check_shop(shop: &Shop) -> Result<(), ProviderError> {
        if shop.provider != ProviderKind::WooCommerce {
            return Err(ProviderError::Configuration(format!(
                "shop {} is a {} shop",
                shop.id, shop.provider
            )));
        }
        Ok(())
    }

    /// Categories (collections and category path) and attribute names of
    /// every product, resolved before any product is created.
    async fn resolve(&self, run: &PublishRun, shop: &Shop, products: &[Product]) -> Result<Resolved, ProviderError> {
        let mut categories: Vec<LocalName> = Vec::new();
        let mut attributes: Vec<LocalName> = Vec::new();
        for product in products {
            for c in &product.collections {
                categories.push(LocalName::new(c.name.clone(), c.description.clone()));
            }
            for name in &product.category_path {
                categories.push(LocalName::new(name.clone(), ""));
            }
            for name in product.attribute_names() {
                attributes.push(LocalName::new(name, ""));
            }
        }

        let category_dir = CategoryDirectory {
            api: self.api.as_ref(),
            credentials: &shop.credentials,
        };
        let attribute_dir = AttributeDirectory {
            api: self.api.as_ref(),
            credentials: &shop.credentials,
        };
        Ok(Resolved {
            categories: reconcile::resolve(&category_dir, run, &categories).await?,
            attributes: reconcile::resolve(&attribute_dir, run, &attributes).await?,
        })
    }

    async fn create_one(&self, shop: &Shop, resolved: &Resolved, product: &Product) -> Result<String, ProviderError> {
        let mut product = product.clone();
        let images = self.media.durable_urls(&mut product).await?;
        let (payload, variations) =
            product_payload(&product, &resolved.categories, &resolved.attributes, images)?;

        let remote_id = self.api.create_product(&shop.credentials, &payload).await?;
        if !variations.is_empty() {
            if let Err(cause) = self
                .api
                .create_variations(&shop.credentials, &remote_id, &variations)
                .await
            {
                return Err(self.discard(shop, &remote_id, cause).await);
            }
        }
        info!(product_id = %product.id, remote_id = %remote_id, variations = variations.len(), "product created");
        Ok(remote_id)
    }

    /// Delete a product whose variations were refused, so that publishing it
    /// again starts clean. Returns the error to report for the product.
    async fn discard(&self, shop: &Shop, remote_id: &str, cause: ProviderError) -> ProviderError {
        match self.api.delete_product(&shop.credentials, remote_id).await {
            Ok(()) => {
                warn!(remote_id, error = %cause, "variations refused, product deleted");
                cause
            }
            Err(e) => {
                error!(remote_id, error = %cause, delete_error = %e, "product left incomplete");
                ProviderError::Incomplete {
                    remote_id: remote_id.to_string(),
                    reason: format!("{cause}; delete failed: {e}"),
                }
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for WooCommerceAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::WooCommerce
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

        let resolved = self.resolve(run, shop, std::slice::from_ref(product)).await?;
        let remote_id = self.create_one(shop, &resolved, product).await?;

        let mut report = UploadReport::new(ProviderKind::WooCommerce);
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

        let mut report = UploadReport::new(ProviderKind::WooCommerce);
        if products.is_empty() {
            return Ok(report);
        }

        let resolved = self.resolve(run, shop, products).await?;
        for product in products {
            match self.create_one(shop, &resolved, product).await {
                Ok(remote_id) => report.published(product.id, remote_id),
                Err(e) => {
                    warn!(product_id = %product.id, error = %e, "product rejected");
                    report.failed(product.id, e.to_string());
                }
            }
        }
        Ok(report)
    }
}
