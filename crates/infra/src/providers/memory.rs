//! In-memory provider APIs for tests/dev.
//!
//! Both fakes record what they were asked to do and support error injection.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use storefront_catalog::Credentials;

use crate::reconcile::RemoteEntry;

use super::shopify::{BulkOperation, BulkStagedApi, ProductLine, StagedParameter, StagedTarget};
use super::woocommerce::{ProductPayload, RestCatalogApi, VariationPayload};
use super::{ProviderError, UserError};

fn search(entries: &[RemoteEntry], term: &str) -> Vec<RemoteEntry> {
    let term = term.to_lowercase();
    entries
        .iter()
        .filter(|e| e.name.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShopifyCall {
    FindCollections(String),
    CreateCollection(String),
    FirstLocation,
    StagedUploadTarget,
    UploadStagedFile,
    RunBulkMutation,
    CreateProduct(String),
}

#[derive(Debug, Default)]
struct ShopifyState {
    collections: Vec<RemoteEntry>,
    location: Option<String>,
    calls: Vec<ShopifyCall>,
    payloads: Vec<String>,
    created: Vec<ProductLine>,
    bulk_operations: u32,
    bulk_user_errors: Option<Vec<UserError>>,
    transport_failures: u32,
}

/// Fake Admin GraphQL API.
#[derive(Debug, Default)]
pub struct InMemoryShopify {
    state: Mutex<ShopifyState>,
}

impl InMemoryShopify {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_location(&self, location: Option<String>) {
        self.state.lock().unwrap().location = location;
    }

    pub fn seed_collection(&self, title: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = format!("gid://shopify/Collection/{}", state.collections.len() + 1);
        state.collections.push(RemoteEntry {
            id: id.clone(),
            name: title.to_string(),
        });
        id
    }

    /// Every later bulk mutation returns these `userErrors`.
    pub fn fail_bulk_with(&self, errors: Vec<UserError>) {
        self.state.lock().unwrap().bulk_user_errors = Some(errors);
    }

    /// The next `count` bulk mutations fail at the transport level.
    pub fn fail_next_bulk(&self, count: u32) {
        self.state.lock().unwrap().transport_failures = count;
    }

    pub fn calls(&self) -> Vec<ShopifyCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.state.lock().unwrap().payloads.clone()
    }

    pub fn last_payload(&self) -> Option<String> {
        self.state.lock().unwrap().payloads.last().cloned()
    }

    pub fn collections(&self) -> Vec<RemoteEntry> {
        self.state.lock().unwrap().collections.clone()
    }

    pub fn collection_id(&self, title: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .collections
            .iter()
            .find(|c| c.name == title)
            .map(|c| c.id.clone())
    }

    pub fn created_products(&self) -> Vec<ProductLine> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn bulk_operations(&self) -> u32 {
        self.state.lock().unwrap().bulk_operations
    }
}

#[async_trait]
impl BulkStagedApi for InMemoryShopify {
    async fn find_collections(&self, _credentials: &Credentials, title: &str) -> Result<Vec<RemoteEntry>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ShopifyCall::FindCollections(title.to_string()));
        Ok(search(&state.collections, title))
    }

    async fn create_collection(
        &self,
        _credentials: &Credentials,
        title: &str,
        _description_html: &str,
    ) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ShopifyCall::CreateCollection(title.to_string()));
        let id = format!("gid://shopify/Collection/{}", state.collections.len() + 1);
        state.collections.push(RemoteEntry {
            id: id.clone(),
            name: title.to_string(),
        });
        Ok(id)
    }

    async fn first_location(&self, _credentials: &Credentials) -> Result<Option<String>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ShopifyCall::FirstLocation);
        Ok(state.location.clone())
    }

    async fn staged_upload_target(&self, _credentials: &Credentials, filename: &str) -> Result<StagedTarget, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ShopifyCall::StagedUploadTarget);
        let key = format!("tmp/staged/{}/{filename}", state.payloads.len() + 1);
        Ok(StagedTarget {
            url: "https://staged.local/upload".to_string(),
            resource_url: None,
            parameters: vec![
                StagedParameter {
                    name: "Content-Type".to_string(),
                    value: "text/jsonl".to_string(),
                },
                StagedParameter {
                    name: "key".to_string(),
                    value: key,
                },
            ],
        })
    }

    async fn upload_staged_file(&self, _target: &StagedTarget, _filename: &str, payload: Vec<u8>) -> Result<(), ProviderError> {
        let payload = String::from_utf8(payload).map_err(|e| ProviderError::Decode(e.to_string()))?;
        let mut state = self.state.lock().unwrap();
        state.calls.push(ShopifyCall::UploadStagedFile);
        state.payloads.push(payload);
        Ok(())
    }

    async fn run_bulk_mutation(
        &self,
        _credentials: &Credentials,
        _mutation: &str,
        _staged_upload_path: &str,
    ) -> Result<BulkOperation, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ShopifyCall::RunBulkMutation);
        if state.transport_failures > 0 {
            state.transport_failures -= 1;
            return Err(ProviderError::Http("connection reset".to_string()));
        }
        if let Some(errors) = state.bulk_user_errors.clone() {
            return Err(ProviderError::UserErrors(errors));
        }
        state.bulk_operations += 1;
        Ok(BulkOperation {
            id: format!("gid://shopify/BulkOperation/{}", state.bulk_operations),
            status: "CREATED".to_string(),
        })
    }

    async fn create_product(&self, _credentials: &Credentials, line: &ProductLine) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ShopifyCall::CreateProduct(line.input.title.clone()));
        state.created.push(line.clone());
        Ok(format!("gid://shopify/Product/{}", state.created.len()))
    }
}

/// A product created on the fake REST store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedProduct {
    pub id: String,
    pub payload: ProductPayload,
    pub variations: Vec<VariationPayload>,
}

#[derive(Debug, Default)]
struct WooState {
    next_id: u64,
    categories: Vec<RemoteEntry>,
    attributes: Vec<RemoteEntry>,
    products: Vec<CreatedProduct>,
    rejected: HashSet<String>,
    fail_category_creates: bool,
    fail_variation_creates: bool,
    fail_deletes: bool,
}

impl WooState {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

/// Fake WooCommerce REST API.
#[derive(Debug, Default)]
pub struct InMemoryWooCommerce {
    state: Mutex<WooState>,
}

impl InMemoryWooCommerce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_category(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.categories.push(RemoteEntry {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }

    /// Creates of products named `name` fail with a 400.
    pub fn reject_product(&self, name: &str) {
        self.state.lock().unwrap().rejected.insert(name.to_string());
    }

    pub fn fail_category_creates(&self) {
        self.state.lock().unwrap().fail_category_creates = true;
    }

    /// Variation batches fail with a 500; the parent product is still created.
    pub fn fail_variation_creates(&self) {
        self.state.lock().unwrap().fail_variation_creates = true;
    }

    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().fail_deletes = true;
    }

    pub fn categories(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .categories
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn attributes(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .attributes
            .iter()
            .map(|a| a.name.clone())
            .collect()
    }

    pub fn products(&self) -> Vec<CreatedProduct> {
        self.state.lock().unwrap().products.clone()
    }
}

#[async_trait]
impl RestCatalogApi for InMemoryWooCommerce {
    async fn search_categories(&self, _credentials: &Credentials, name: &str) -> Result<Vec<RemoteEntry>, ProviderError> {
        Ok(search(&self.state.lock().unwrap().categories, name))
    }

    async fn create_category(&self, _credentials: &Credentials, name: &str, _description: &str) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_category_creates {
            return Err(ProviderError::Api {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        let id = state.next_id();
        state.categories.push(RemoteEntry {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn list_attributes(&self, _credentials: &Credentials) -> Result<Vec<RemoteEntry>, ProviderError> {
        Ok(self.state.lock().unwrap().attributes.clone())
    }

    async fn create_attribute(&self, _credentials: &Credentials, name: &str) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.attributes.push(RemoteEntry {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn create_product(&self, _credentials: &Credentials, product: &ProductPayload) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.rejected.contains(&product.name) {
            return Err(ProviderError::Api {
                status: 400,
                body: format!("invalid product `{}`", product.name),
            });
        }
        let id = state.next_id();
        state.products.push(CreatedProduct {
            id: id.clone(),
            payload: product.clone(),
            variations: Vec::new(),
        });
        Ok(id)
    }

    async fn create_variations(
        &self,
        _credentials: &Credentials,
        product_id: &str,
        variations: &[VariationPayload],
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_variation_creates {
            return Err(ProviderError::Api {
                status: 500,
                body: "variation batch failed".to_string(),
            });
        }
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| ProviderError::Api {
                status: 404,
                body: format!("product {product_id} not found"),
            })?;
        product.variations.extend_from_slice(variations);
        Ok(())
    }

    async fn delete_product(&self, _credentials: &Credentials, product_id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            return Err(ProviderError::Api {
                status: 500,
                body: "delete failed".to_string(),
            });
        }
        let before = state.products.len();
        state.products.retain(|p| p.id != product_id);
        if state.products.len() == before {
            return Err(ProviderError::Api {
                status: 404,
                body: format!("product {product_id} not found"),
            });
        }
        Ok(())
    }
}
