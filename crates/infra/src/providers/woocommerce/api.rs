use async_trait::async_trait;

use storefront_catalog::Credentials;

use crate::providers::ProviderError;
use crate::reconcile::RemoteEntry;

use super::payload::{ProductPayload, VariationPayload};

/// Upper bound of one category search page.
pub const CATEGORY_PAGE_SIZE: usize = 100;

/// The slice of the WooCommerce REST v3 API the per-item adapter needs.
#[async_trait]
pub trait RestCatalogApi: Send + Sync {
    async fn search_categories(
        &self,
        credentials: &Credentials,
        name: &str,
    ) -> Result<Vec<RemoteEntry>, ProviderError>;

    async fn create_category(
        &self,
        credentials: &Credentials,
        name: &str,
        description: &str,
    ) -> Result<String, ProviderError>;

    async fn list_attributes(&self, credentials: &Credentials) -> Result<Vec<RemoteEntry>, ProviderError>;

    async fn create_attribute(&self, credentials: &Credentials, name: &str) -> Result<String, ProviderError>;

    /// Returns the remote product id.
    async fn create_product(
        &self,
        credentials: &Credentials,
        product: &ProductPayload,
    ) -> Result<String, ProviderError>;

    async fn create_variations(
        &self,
        credentials: &Credentials,
        product_id: &str,
        variations: &[VariationPayload],
    ) -> Result<(), ProviderError>;

    /// Permanently removes a product together with its variations.
    async fn delete_product(&self, credentials: &Credentials, product_id: &str) -> Result<(), ProviderError>;
}
