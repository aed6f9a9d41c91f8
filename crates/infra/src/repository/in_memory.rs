use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use storefront_catalog::{Collection, Image, ListingStatus, Product, ProductOnShop, Shop};
use storefront_core::{CollectionId, ProductId, ShopId};
use storefront_workflow::Workflow;

use super::{CatalogRepository, RepositoryError};

#[derive(Debug, Default)]
struct State {
    shops: HashMap<ShopId, Shop>,
    workflows: HashMap<ShopId, Workflow>,
    products: HashMap<ProductId, Product>,
    collections: HashMap<String, Collection>,
    listings: BTreeMap<(ShopId, ProductId), ProductOnShop>,
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalogRepository {
    state: RwLock<State>,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn insert_shop(&self, shop: Shop) {
        self.state.write().unwrap().shops.insert(shop.id, shop);
    }

    pub fn insert_workflow(&self, workflow: Workflow) {
        self.state
            .write()
            .unwrap()
            .workflows
            .insert(workflow.shop_id, workflow);
    }

    /// Store a product and register its collections by name.
    pub fn insert_product(&self, product: Product) {
        let mut state = self.state.write().unwrap();
        for c in &product.collections {
            state
                .collections
                .entry(c.name.clone())
                .or_insert_with(|| c.clone());
        }
        state.products.insert(product.id, product);
    }

    /// Attach a product to a shop as NotPublished.
    pub fn list_on(&self, shop_id: ShopId, product_id: ProductId) {
        self.state
            .write()
            .unwrap()
            .listings
            .entry((shop_id, product_id))
            .or_insert_with(|| ProductOnShop::new(shop_id, product_id));
    }

    pub fn insert_listing(&self, listing: ProductOnShop) {
        self.state
            .write()
            .unwrap()
            .listings
            .insert((listing.shop_id, listing.product_id), listing);
    }

    pub fn product(&self, product_id: ProductId) -> Option<Product> {
        self.state.read().unwrap().products.get(&product_id).cloned()
    }

    pub fn listing_status(&self, shop_id: ShopId, product_id: ProductId) -> Option<ListingStatus> {
        self.state
            .read()
            .unwrap()
            .listings
            .get(&(shop_id, product_id))
            .map(ProductOnShop::status)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn shop(&self, shop_id: ShopId) -> Result<Option<Shop>, RepositoryError> {
        Ok(self.state.read().unwrap().shops.get(&shop_id).cloned())
    }

    async fn workflow(&self, shop_id: ShopId) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.state.read().unwrap().workflows.get(&shop_id).cloned())
    }

    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        self.insert_workflow(workflow.clone());
        Ok(())
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn save_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut state = self.state.write().unwrap();
        if !state.products.contains_key(&product.id) {
            return Err(RepositoryError::NotFound(format!("product {}", product.id)));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_images(&self, product_id: ProductId, images: &[Image]) -> Result<(), RepositoryError> {
        let mut state = self.state.write().unwrap();
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {product_id}")))?;
        product.images = images.to_vec();
        Ok(())
    }

    async fn replace_product_collections(
        &self,
        product_id: ProductId,
        collections: &[Collection],
    ) -> Result<Vec<Collection>, RepositoryError> {
        let mut state = self.state.write().unwrap();
        if !state.products.contains_key(&product_id) {
            return Err(RepositoryError::NotFound(format!("product {product_id}")));
        }

        let mut connected: Vec<Collection> = Vec::new();
        for c in collections {
            let stored = state
                .collections
                .entry(c.name.clone())
                .or_insert_with(|| c.clone())
                .clone();
            if !connected.iter().any(|x| x.id == stored.id) {
                connected.push(stored);
            }
        }

        if let Some(product) = state.products.get_mut(&product_id) {
            product.collections = connected.clone();
        }
        Ok(connected)
    }

    async fn products_in_collection(&self, collection_id: CollectionId) -> Result<Vec<ProductId>, RepositoryError> {
        let state = self.state.read().unwrap();
        let mut ids: Vec<ProductId> = state
            .products
            .values()
            .filter(|p| p.collections.iter().any(|c| c.id == collection_id))
            .map(|p| p.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn listing(&self, shop_id: ShopId, product_id: ProductId) -> Result<Option<ProductOnShop>, RepositoryError> {
        Ok(self
            .state
            .read()
            .unwrap()
            .listings
            .get(&(shop_id, product_id))
            .cloned())
    }

    async fn listings_with_status(
        &self,
        shop_id: ShopId,
        status: ListingStatus,
    ) -> Result<Vec<ProductOnShop>, RepositoryError> {
        let state = self.state.read().unwrap();
        Ok(state
            .listings
            .range((shop_id, ProductId::from_uuid(uuid::Uuid::nil()))..)
            .take_while(|((s, _), _)| *s == shop_id)
            .filter(|(_, l)| l.status() == status)
            .map(|(_, l)| l.clone())
            .collect())
    }

    async fn save_listing(&self, listing: &ProductOnShop) -> Result<(), RepositoryError> {
        self.state
            .write()
            .unwrap()
            .listings
            .insert((listing.shop_id, listing.product_id), listing.clone());
        Ok(())
    }
}
