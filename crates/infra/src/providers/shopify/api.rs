use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use storefront_catalog::Credentials;

use crate::providers::ProviderError;
use crate::reconcile::RemoteEntry;

use super::input::ProductLine;

/// Upper bound of one collection search page.
pub const COLLECTION_PAGE_SIZE: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedParameter {
    pub name: String,
    pub value: String,
}

/// Pre-signed upload target returned by `stagedUploadsCreate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedTarget {
    pub url: String,
    #[serde(default, rename = "resourceUrl")]
    pub resource_url: Option<String>,
    pub parameters: Vec<StagedParameter>,
}

impl StagedTarget {
    /// The `key` form parameter, which doubles as the staged upload path.
    pub fn key(&self) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == "key")
            .map(|p| p.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperation {
    pub id: String,
    pub status: String,
}

/// The slice of the Admin GraphQL API the bulk adapter needs.
///
/// Implementations surface non-empty `userErrors` as
/// [`ProviderError::UserErrors`].
#[async_trait]
pub trait BulkStagedApi: Send + Sync {
    async fn find_collections(
        &self,
        credentials: &Credentials,
        title: &str,
    ) -> Result<Vec<RemoteEntry>, ProviderError>;

    async fn create_collection(
        &self,
        credentials: &Credentials,
        title: &str,
        description_html: &str,
    ) -> Result<String, ProviderError>;

    /// First inventory location of the shop, if any.
    async fn first_location(&self, credentials: &Credentials) -> Result<Option<String>, ProviderError>;

    async fn staged_upload_target(
        &self,
        credentials: &Credentials,
        filename: &str,
    ) -> Result<StagedTarget, ProviderError>;

    /// Multipart POST of `payload` to the staged URL with the target's form fields.
    async fn upload_staged_file(
        &self,
        target: &StagedTarget,
        filename: &str,
        payload: Vec<u8>,
    ) -> Result<(), ProviderError>;

    async fn run_bulk_mutation(
        &self,
        credentials: &Credentials,
        mutation: &str,
        staged_upload_path: &str,
    ) -> Result<BulkOperation, ProviderError>;

    /// Synchronous `productCreate`; returns the product id.
    async fn create_product(
        &self,
        credentials: &Credentials,
        line: &ProductLine,
    ) -> Result<String, ProviderError>;
}
