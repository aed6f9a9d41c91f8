use async_trait::async_trait;
use tracing::info;

use storefront_catalog::Product;
use storefront_workflow::{ComponentCode, Step, StepError, StepInputs};

use crate::context::PublishContext;
use crate::media::MediaSyncError;

/// Uploads every image without a durable URL.
pub struct SyncImagesStep;

pub(crate) fn media_error(err: MediaSyncError) -> StepError {
    match err {
        MediaSyncError::Upload { .. } => StepError::Collaborator(err.to_string()),
        MediaSyncError::Repository(e) => StepError::Repository(e.to_string()),
    }
}

#[async_trait]
impl Step<PublishContext> for SyncImagesStep {
    fn code(&self) -> ComponentCode {
        ComponentCode::SyncImages
    }

    async fn run(
        &self,
        ctx: &PublishContext,
        mut batch: Vec<Product>,
        inputs: &StepInputs,
    ) -> Result<Vec<Product>, StepError> {
        let folder = inputs.text("folder")?;
        let sync = ctx.services.media_sync();

        let mut uploaded = 0;
        for product in &mut batch {
            uploaded += sync.sync_product(product, folder).await.map_err(media_error)?;
        }
        info!(run_id = %ctx.run.run_id(), uploaded, "images synced");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{fixture, inputs, product};
    use serde_json::json;

    #[tokio::test]
    async fn images_get_durable_urls_in_configured_folder() {
        let f = fixture();
        let mut p = product(&f.repo, "Tee", 1000).with_image("data:image/png;base64,AAAA");
        f.repo.insert_product(p.clone());
        p.images.push(storefront_catalog::Image::new("https://cdn/b.jpg", 1));

        let out = SyncImagesStep
            .run(&f.ctx, vec![p], &inputs(ComponentCode::SyncImages, json!({"folder": "spring"})))
            .await
            .unwrap();

        let image = &out[0].images[0];
        assert_eq!(
            image.durable_url.as_deref(),
            Some(format!("https://media.local/spring/{}", image.id).as_str())
        );
        assert!(out[0].images.iter().all(|i| i.is_synced()));
        assert_eq!(f.repo.product(out[0].id).unwrap().images.len(), 2);
    }

    #[tokio::test]
    async fn missing_product_record_is_a_repository_error() {
        let f = fixture();
        let orphan = storefront_catalog::Product::new(
            storefront_core::ProductId::new(),
            "Orphan",
            storefront_catalog::Price::new(100, "EUR"),
        )
        .unwrap()
        .with_image("https://cdn/a.jpg");

        let err = SyncImagesStep
            .run(&f.ctx, vec![orphan], &inputs(ComponentCode::SyncImages, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Repository(_)));
    }
}
