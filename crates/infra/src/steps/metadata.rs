use async_trait::async_trait;
use tracing::debug;

use storefront_catalog::{Image, Product};
use storefront_workflow::{ComponentCode, Step, StepError, StepInputs};

use crate::collaborators::{CollaboratorError, UploadOptions};
use crate::context::PublishContext;

/// Writes one metadata tag into every synced image and re-uploads it under
/// the same public id.
pub struct SetImageMetadataStep;

fn collaborator(err: CollaboratorError) -> StepError {
    StepError::Collaborator(err.to_string())
}

impl SetImageMetadataStep {
    async fn tag_image(ctx: &PublishContext, image: &mut Image, tag: &str, value: &str) -> Result<(), StepError> {
        let (Some(url), Some(public_id)) = (image.durable_url.clone(), image.storage_ref.clone()) else {
            return Err(StepError::Input(format!(
                "image {} is not synced; sync_images must run first",
                image.id
            )));
        };

        let services = &ctx.services;
        let bytes = services.fetcher.fetch(&url).await.map_err(collaborator)?;
        let handle = services.metadata.load(&bytes).await.map_err(collaborator)?;
        services
            .metadata
            .set_tag(&handle, tag, value)
            .await
            .map_err(collaborator)?;
        let block = services.metadata.dump(&handle).await.map_err(collaborator)?;
        let tagged = services
            .metadata
            .insert(&block, bytes)
            .await
            .map_err(collaborator)?;

        let options = UploadOptions {
            overwrite: true,
            public_id: Some(public_id),
            folder: None,
        };
        let asset = services
            .media
            .upload_file(tagged, &options)
            .await
            .map_err(collaborator)?;
        image.mark_synced(asset.secure_url, asset.public_id);
        Ok(())
    }
}

#[async_trait]
impl Step<PublishContext> for SetImageMetadataStep {
    fn code(&self) -> ComponentCode {
        ComponentCode::SetImageMetadata
    }

    async fn run(
        &self,
        ctx: &PublishContext,
        mut batch: Vec<Product>,
        inputs: &StepInputs,
    ) -> Result<Vec<Product>, StepError> {
        let tag = inputs.text("tag")?;
        let value = inputs.text("value")?;

        for product in &mut batch {
            if product.images.is_empty() {
                continue;
            }
            for image in &mut product.images {
                Self::tag_image(ctx, image, tag, value).await?;
            }
            ctx.services
                .repository
                .update_images(product.id, &product.images)
                .await
                .map_err(|e| StepError::Repository(e.to_string()))?;
            debug!(product_id = %product.id, tag, "image metadata written");
        }
        Ok(batch)
    }
}
