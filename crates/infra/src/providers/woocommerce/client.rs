use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use storefront_catalog::Credentials;

use crate::providers::ProviderError;
use crate::reconcile::RemoteEntry;

use super::api::{CATEGORY_PAGE_SIZE, RestCatalogApi};
use super::payload::{ProductPayload, VariationPayload};

/// WooCommerce REST v3 client, authenticated with the consumer key/secret.
#[derive(Debug, Clone)]
pub struct WooCommerceClient {
    http: reqwest::Client,
}

impl WooCommerceClient {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to build http client: {e}")))?;
        Ok(Self { http })
    }

    fn url(credentials: &Credentials, path: &str) -> String {
        format!("{}/wp-json/wc/v3/{path}", credentials.store_url())
    }

    async fn send(&self, req: reqwest::RequestBuilder, credentials: &Credentials) -> Result<Value, ProviderError> {
        let resp = req
            .basic_auth(&credentials.api_key, Some(&credentials.api_secret))
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        resp.json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn get(&self, credentials: &Credentials, path: &str, query: &[(&str, String)]) -> Result<Value, ProviderError> {
        let req = self.http.get(Self::url(credentials, path)).query(query);
        self.send(req, credentials).await
    }

    async fn post<B: Serialize + Sync>(&self, credentials: &Credentials, path: &str, body: &B) -> Result<Value, ProviderError> {
        let req = self.http.post(Self::url(credentials, path)).json(body);
        self.send(req, credentials).await
    }

    async fn delete(&self, credentials: &Credentials, path: &str, query: &[(&str, String)]) -> Result<Value, ProviderError> {
        let req = self.http.delete(Self::url(credentials, path)).query(query);
        self.send(req, credentials).await
    }
}

/// Remote id as a string; the API returns integers.
fn id_of(value: &Value) -> Result<String, ProviderError> {
    match value.get("id") {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(ProviderError::Decode(format!("response has no id: {value}"))),
    }
}

fn entries(value: &Value) -> Result<Vec<RemoteEntry>, ProviderError> {
    let items = value
        .as_array()
        .ok_or_else(|| ProviderError::Decode("expected a JSON array".to_string()))?;
    items
        .iter()
        .map(|item| {
            Ok(RemoteEntry {
                id: id_of(item)?,
                name: item
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl RestCatalogApi for WooCommerceClient {
    async fn search_categories(
        &self,
        credentials: &Credentials,
        name: &str,
    ) -> Result<Vec<RemoteEntry>, ProviderError> {
        let body = self
            .get(
                credentials,
                "products/categories",
                &[("search", name.to_string()), ("per_page", CATEGORY_PAGE_SIZE.to_string())],
            )
            .await?;
        entries(&body)
    }

    async fn create_category(
        &self,
        credentials: &Credentials,
        name: &str,
        description: &str,
    ) -> Result<String, ProviderError> {
        let body = self
            .post(
                credentials,
                "products/categories",
                &json!({ "name": name, "description": description }),
            )
            .await?;
        id_of(&body)
    }

    async fn list_attributes(&self, credentials: &Credentials) -> Result<Vec<RemoteEntry>, ProviderError> {
        let body = self.get(credentials, "products/attributes", &[]).await?;
        entries(&body)
    }

    async fn create_attribute(&self, credentials: &Credentials, name: &str) -> Result<String, ProviderError> {
        let body = self
            .post(
                credentials,
                "products/attributes",
                &json!({ "name": name, "type": "select", "has_archives": false }),
            )
            .await?;
        id_of(&body)
    }

    async fn create_product(
        &self,
        credentials: &Credentials,
        product: &ProductPayload,
    ) -> Result<String, ProviderError> {
        let body = self.post(credentials, "products", product).await?;
        id_of(&body)
    }

    async fn create_variations(
        &self,
        credentials: &Credentials,
        product_id: &str,
        variations: &[VariationPayload],
    ) -> Result<(), ProviderError> {
        self.post(
            credentials,
            &format!("products/{product_id}/variations/batch"),
            &json!({ "create": variations }),
        )
        .await?;
        Ok(())
    }

    async fn delete_product(&self, credentials: &Credentials, product_id: &str) -> Result<(), ProviderError> {
        // Without `force` the product only moves to the trash and keeps its SKU.
        self.delete(credentials, &format!("products/{product_id}"), &[("force", "true".to_string())])
            .await?;
        Ok(())
    }
}
