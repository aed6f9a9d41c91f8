//! Catalog persistence boundary.
//!
//! The relational store for catalog entities lives outside this crate; the
//! publisher only needs the queries and writes below.

pub mod in_memory;

use async_trait::async_trait;
use thiserror::Error;

use storefront_catalog::{Collection, Image, ListingStatus, Product, ProductOnShop, Shop};
use storefront_core::{CollectionId, DomainError, ProductId, ShopId};
use storefront_workflow::Workflow;

pub use in_memory::InMemoryCatalogRepository;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn shop(&self, shop_id: ShopId) -> Result<Option<Shop>, RepositoryError>;

    async fn workflow(&self, shop_id: ShopId) -> Result<Option<Workflow>, RepositoryError>;

    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError>;

    /// Products for `ids` in the given order. Unknown ids are skipped.
    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    async fn save_product(&self, product: &Product) -> Result<(), RepositoryError>;

    /// Persist the image list of a product (durable URLs, storage refs).
    async fn update_images(&self, product_id: ProductId, images: &[Image]) -> Result<(), RepositoryError>;

    /// Clear the product's collection links, then connect-or-create each
    /// collection by name, as one atomic change.
    async fn replace_product_collections(
        &self,
        product_id: ProductId,
        collections: &[Collection],
    ) -> Result<Vec<Collection>, RepositoryError>;

    async fn products_in_collection(&self, collection_id: CollectionId) -> Result<Vec<ProductId>, RepositoryError>;

    async fn listing(&self, shop_id: ShopId, product_id: ProductId) -> Result<Option<ProductOnShop>, RepositoryError>;

    /// Listings of a shop with `status`, ordered by product id.
    async fn listings_with_status(
        &self,
        shop_id: ShopId,
        status: ListingStatus,
    ) -> Result<Vec<ProductOnShop>, RepositoryError>;

    async fn save_listing(&self, listing: &ProductOnShop) -> Result<(), RepositoryError>;
}
