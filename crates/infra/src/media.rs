//! Syncing product images to media storage.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use storefront_catalog::Product;

use crate::collaborators::{CollaboratorError, MediaStorage, UploadOptions};
use crate::repository::{CatalogRepository, RepositoryError};

pub const DEFAULT_FOLDER: &str = "products";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaSyncError {
    #[error("upload of image {image} failed: {source}")]
    Upload {
        image: String,
        #[source]
        source: CollaboratorError,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Uploads images lacking a durable URL and persists the result.
///
/// Uploads use the image id as public id with overwrite enabled, so a retried
/// sync replaces rather than duplicates.
#[derive(Clone)]
pub struct MediaSync {
    storage: Arc<dyn MediaStorage>,
    repository: Arc<dyn CatalogRepository>,
}

impl MediaSync {
    pub fn new(storage: Arc<dyn MediaStorage>, repository: Arc<dyn CatalogRepository>) -> Self {
        Self {
            storage,
            repository,
        }
    }

    pub fn storage(&self) -> &Arc<dyn MediaStorage> {
        &self.storage
    }

    /// Sync every unsynced image of `product`, sequentially. Returns the number
    /// of images uploaded.
    pub async fn sync_product(&self, product: &mut Product, folder: &str) -> Result<usize, MediaSyncError> {
        let mut uploaded = 0;
        for image in product.images.iter_mut().filter(|i| !i.is_synced()) {
            let options = UploadOptions {
                overwrite: true,
                public_id: Some(image.id.to_string()),
                folder: Some(folder.to_string()),
            };
            let asset = self
                .storage
                .upload(&image.source, &options)
                .await
                .map_err(|source| MediaSyncError::Upload {
                    image: image.id.to_string(),
                    source,
                })?;
            image.mark_synced(asset.secure_url, asset.public_id);
            uploaded += 1;
        }

        if uploaded > 0 {
            self.repository
                .update_images(product.id, &product.images)
                .await?;
            debug!(product_id = %product.id, uploaded, "product images synced");
        }
        Ok(uploaded)
    }

    /// Durable URLs of `product`'s images, syncing any that are missing first.
    pub async fn durable_urls(&self, product: &mut Product) -> Result<Vec<String>, MediaSyncError> {
        self.sync_product(product, DEFAULT_FOLDER).await?;
        Ok(product
            .images
            .iter()
            .filter_map(|i| i.durable_url.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemoryMediaStorage;
    use crate::repository::InMemoryCatalogRepository;
    use storefront_catalog::Price;
    use storefront_core::ProductId;

    #[tokio::test]
    async fn only_unsynced_images_are_uploaded_and_persisted() {
        let storage = Arc::new(InMemoryMediaStorage::default());
        let repo = Arc::new(InMemoryCatalogRepository::new());
        let mut product = Product::new(ProductId::new(), "Tee", Price::new(1000, "EUR"))
            .unwrap()
            .with_image("https://cdn/a.jpg")
            .with_image("data:image/png;base64,AA");
        product.images[0].mark_synced("https://media/a.jpg", "products/a");
        repo.insert_product(product.clone());

        let sync = MediaSync::new(storage.clone(), repo.clone());
        let uploaded = sync.sync_product(&mut product, "products").await.unwrap();

        assert_eq!(uploaded, 1);
        assert_eq!(storage.upload_count(), 1);
        let stored = repo.product(product.id).unwrap();
        assert!(stored.images.iter().all(|i| i.is_synced()));
        assert_eq!(stored.images[0].durable_url.as_deref(), Some("https://media/a.jpg"));
    }

    #[tokio::test]
    async fn durable_urls_follow_image_order() {
        let storage = Arc::new(InMemoryMediaStorage::new("https://media.test"));
        let repo = Arc::new(InMemoryCatalogRepository::new());
        let mut product = Product::new(ProductId::new(), "Tee", Price::new(1000, "EUR"))
            .unwrap()
            .with_image("https://cdn/a.jpg")
            .with_image("https://cdn/b.jpg");
        repo.insert_product(product.clone());

        let urls = MediaSync::new(storage, repo)
            .durable_urls(&mut product)
            .await
            .unwrap();

        assert_eq!(
            urls,
            vec![
                format!("https://media.test/products/{}", product.images[0].id),
                format!("https://media.test/products/{}", product.images[1].id),
            ]
        );
    }
}
