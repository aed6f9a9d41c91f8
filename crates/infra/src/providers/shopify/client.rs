use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use tracing::debug;

use storefront_catalog::Credentials;

use crate::providers::{ProviderError, UserError};
use crate::reconcile::RemoteEntry;

use super::api::{BulkOperation, BulkStagedApi, COLLECTION_PAGE_SIZE, StagedTarget};
use super::input::{PRODUCT_CREATE_MUTATION, ProductLine};

pub const API_VERSION: &str = "2024-01";

const FIND_COLLECTIONS: &str = r#"query collections($first: Int!, $query: String!) {
  collections(first: $first, query: $query) { edges { node { id title } } }
}"#;

const CREATE_COLLECTION: &str = r#"mutation collectionCreate($input: CollectionInput!) {
  collectionCreate(input: $input) {
    collection { id }
    userErrors { field message }
  }
}"#;

const FIRST_LOCATION: &str = r#"query { locations(first: 1) { edges { node { id } } } }"#;

const STAGED_UPLOADS_CREATE: &str = r#"mutation stagedUploadsCreate($input: [StagedUploadInput!]!) {
  stagedUploadsCreate(input: $input) {
    stagedTargets { url resourceUrl parameters { name value } }
    userErrors { field message }
  }
}"#;

const BULK_OPERATION_RUN_MUTATION: &str = r#"mutation bulkOperationRunMutation($mutation: String!, $stagedUploadPath: String!) {
  bulkOperationRunMutation(mutation: $mutation, stagedUploadPath: $stagedUploadPath) {
    bulkOperation { id status }
    userErrors { field message }
  }
}"#;

/// Admin GraphQL client.
#[derive(Debug, Clone)]
pub struct ShopifyClient {
    http: reqwest::Client,
}

impl ShopifyClient {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to build http client: {e}")))?;
        Ok(Self { http })
    }

    fn endpoint(credentials: &Credentials) -> String {
        format!("{}/admin/api/{API_VERSION}/graphql.json", credentials.store_url())
    }

    /// Run one GraphQL document and return its `data` object.
    async fn graphql(&self, credentials: &Credentials, query: &str, variables: Value) -> Result<Value, ProviderError> {
        let token = credentials
            .access_token
            .as_deref()
            .ok_or_else(|| ProviderError::Configuration("shop has no access token".to_string()))?;

        let resp = self
            .http
            .post(Self::endpoint(credentials))
            .header("X-Shopify-Access-Token", token)
            .json(&json!({ "query": query, "variables": variables }))
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

        let mut body: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: errors.to_string(),
            });
        }
        Ok(body.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }
}

/// Value at `pointer`, or a decode error naming it.
fn field<'a>(value: &'a Value, pointer: &str) -> Result<&'a Value, ProviderError> {
    value
        .pointer(pointer)
        .filter(|v| !v.is_null())
        .ok_or_else(|| ProviderError::Decode(format!("missing `{pointer}` in response")))
}

fn string_field(value: &Value, pointer: &str) -> Result<String, ProviderError> {
    field(value, pointer)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Decode(format!("`{pointer}` is not a string")))
}

/// Fail on a non-empty `userErrors` list under `pointer`.
fn check_user_errors(value: &Value, pointer: &str) -> Result<(), ProviderError> {
    let Some(raw) = value.pointer(pointer) else {
        return Ok(());
    };
    let errors: Vec<UserError> =
        serde_json::from_value(raw.clone()).map_err(|e| ProviderError::Decode(e.to_string()))?;
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::UserErrors(errors))
    }
}

/// Quote a value for the search syntax of `query:` arguments.
fn search_term(title: &str) -> String {
    format!("title:'{}'", title.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[async_trait]
impl BulkStagedApi for ShopifyClient {
    async fn find_collections(
        &self,
        credentials: &Credentials,
        title: &str,
    ) -> Result<Vec<RemoteEntry>, ProviderError> {
        let data = self
            .graphql(
                credentials,
                FIND_COLLECTIONS,
                json!({ "first": COLLECTION_PAGE_SIZE, "query": search_term(title) }),
            )
            .await?;

        let edges = field(&data, "/collections/edges")?
            .as_array()
            .cloned()
            .unwrap_or_default();
        edges
            .iter()
            .map(|edge| {
                Ok(RemoteEntry {
                    id: string_field(edge, "/node/id")?,
                    name: string_field(edge, "/node/title")?,
                })
            })
            .collect()
    }

    async fn create_collection(
        &self,
        credentials: &Credentials,
        title: &str,
        description_html: &str,
    ) -> Result<String, ProviderError> {
        let data = self
            .graphql(
                credentials,
                CREATE_COLLECTION,
                json!({ "input": { "title": title, "descriptionHtml": description_html } }),
            )
            .await?;
        check_user_errors(&data, "/collectionCreate/userErrors")?;
        string_field(&data, "/collectionCreate/collection/id")
    }

    async fn first_location(&self, credentials: &Credentials) -> Result<Option<String>, ProviderError> {
        let data = self.graphql(credentials, FIRST_LOCATION, json!({})).await?;
        Ok(data
            .pointer("/locations/edges/0/node/id")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn staged_upload_target(
        &self,
        credentials: &Credentials,
        filename: &str,
    ) -> Result<StagedTarget, ProviderError> {
        let data = self
            .graphql(
                credentials,
                STAGED_UPLOADS_CREATE,
                json!({ "input": [{
                    "resource": "BULK_MUTATION_VARIABLES",
                    "filename": filename,
                    "mimeType": "text/jsonl",
                    "httpMethod": "POST",
                }] }),
            )
            .await?;
        check_user_errors(&data, "/stagedUploadsCreate/userErrors")?;

        let target = field(&data, "/stagedUploadsCreate/stagedTargets/0")?;
        serde_json::from_value(target.clone()).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn upload_staged_file(
        &self,
        target: &StagedTarget,
        filename: &str,
        payload: Vec<u8>,
    ) -> Result<(), ProviderError> {
        let mut form = Form::new();
        for param in &target.parameters {
            form = form.text(param.name.clone(), param.value.clone());
        }
        let file = Part::bytes(payload)
            .file_name(filename.to_string())
            .mime_str("text/jsonl")
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        form = form.part("file", file);

        let resp = self
            .http
            .post(&target.url)
            .multipart(form)
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
        debug!(url = %target.url, "staged payload uploaded");
        Ok(())
    }

    async fn run_bulk_mutation(
        &self,
        credentials: &Credentials,
        mutation: &str,
        staged_upload_path: &str,
    ) -> Result<BulkOperation, ProviderError> {
        let data = self
            .graphql(
                credentials,
                BULK_OPERATION_RUN_MUTATION,
                json!({ "mutation": mutation, "stagedUploadPath": staged_upload_path }),
            )
            .await?;
        check_user_errors(&data, "/bulkOperationRunMutation/userErrors")?;

        Ok(BulkOperation {
            id: string_field(&data, "/bulkOperationRunMutation/bulkOperation/id")?,
            status: string_field(&data, "/bulkOperationRunMutation/bulkOperation/status")?,
        })
    }

    async fn create_product(
        &self,
        credentials: &Credentials,
        line: &ProductLine,
    ) -> Result<String, ProviderError> {
        let variables = serde_json::to_value(line).map_err(|e| ProviderError::Decode(e.to_string()))?;
        let data = self
            .graphql(credentials, PRODUCT_CREATE_MUTATION, variables)
            .await?;
        check_user_errors(&data, "/productCreate/userErrors")?;
        string_field(&data, "/productCreate/product/id")
    }
}
