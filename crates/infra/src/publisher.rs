//! Immediate, single-batch publishing outside the job system.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use storefront_catalog::{ListingStatus, ProductOnShop};
use storefront_core::{CollectionId, DomainError, ProductId, ShopId};

use crate::pipeline::{BatchOutcome, PipelineError, PublishPipeline, SkipReason};
use crate::repository::{CatalogRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("listing update rejected: {0}")]
    Listing(#[from] DomainError),

    #[error("product {product_id} is not listed on shop {shop_id}")]
    NotListed { shop_id: ShopId, product_id: ProductId },
}

#[derive(Clone)]
pub struct Publisher {
    repository: Arc<dyn CatalogRepository>,
    pipeline: PublishPipeline,
}

impl Publisher {
    pub fn new(pipeline: PublishPipeline) -> Self {
        Self {
            repository: Arc::clone(pipeline.repository()),
            pipeline,
        }
    }

    /// Publish `product_ids` to `shop_id` right away as one batch.
    ///
    /// Unpublished listings are scheduled first; already published ones are
    /// pushed again. Listings held by a publish job are left to that job.
    /// If the batch fails as a whole, the listings scheduled here are
    /// released. Skipped with [`SkipReason::ShopBusy`] while another run
    /// holds the shop.
    #[instrument(skip(self, product_ids), fields(shop_id = %shop_id, count = product_ids.len()), err)]
    pub async fn publish_products(
        &self,
        shop_id: ShopId,
        product_ids: &[ProductId],
    ) -> Result<BatchOutcome, PublisherError> {
        let Some(shop) = self.repository.shop(shop_id).await? else {
            return Ok(BatchOutcome::Skipped {
                reason: SkipReason::ShopNotFound,
            });
        };
        if !shop.is_active() {
            return Ok(BatchOutcome::Skipped {
                reason: SkipReason::ShopInactive,
            });
        }
        let Some(guard) = self.pipeline.guards().try_claim(shop_id) else {
            info!("shop busy, direct publish skipped");
            return Ok(BatchOutcome::Skipped {
                reason: SkipReason::ShopBusy,
            });
        };

        let mut seen = HashSet::new();
        let ids: Vec<ProductId> = product_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        let known: HashSet<ProductId> = self.repository.products(&ids).await?.iter().map(|p| p.id).collect();

        let now = Utc::now();
        let mut batch = Vec::with_capacity(ids.len());
        let mut scheduled = Vec::new();
        for id in ids {
            if !known.contains(&id) {
                batch.push(id);
                continue;
            }
            let mut listing = self
                .repository
                .listing(shop_id, id)
                .await?
                .unwrap_or_else(|| ProductOnShop::new(shop_id, id));
            if let Some(job_id) = listing.scheduled_by() {
                debug!(product_id = %id, job_id = %job_id, "listing held by a publish job, skipped");
                continue;
            }
            if listing.status() == ListingStatus::NotPublished {
                listing.schedule(None, now)?;
                self.repository.save_listing(&listing).await?;
                scheduled.push(id);
            }
            batch.push(id);
        }

        match self.pipeline.run_batch(&guard, None, &batch).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(error = %e, scheduled = scheduled.len(), "direct publish failed, releasing listings");
                self.release(shop_id, &scheduled, &e.to_string()).await?;
                Err(e.into())
            }
        }
    }

    /// Publish every product of a collection.
    pub async fn publish_collection(
        &self,
        shop_id: ShopId,
        collection_id: CollectionId,
    ) -> Result<BatchOutcome, PublisherError> {
        let ids = self.repository.products_in_collection(collection_id).await?;
        info!(shop_id = %shop_id, collection_id = %collection_id, products = ids.len(), "publishing collection");
        self.publish_products(shop_id, &ids).await
    }

    /// Withdraw a published listing. Local only; the provider is not called.
    #[instrument(skip(self), fields(shop_id = %shop_id, product_id = %product_id), err)]
    pub async fn unpublish(&self, shop_id: ShopId, product_id: ProductId) -> Result<ProductOnShop, PublisherError> {
        let mut listing = self
            .repository
            .listing(shop_id, product_id)
            .await?
            .ok_or(PublisherError::NotListed { shop_id, product_id })?;
        listing.unpublish(Utc::now())?;
        self.repository.save_listing(&listing).await?;
        info!("listing unpublished");
        Ok(listing)
    }

    async fn release(&self, shop_id: ShopId, ids: &[ProductId], cause: &str) -> Result<(), PublisherError> {
        let now = Utc::now();
        for id in ids {
            if let Some(mut listing) = self.repository.listing(shop_id, *id).await? {
                if listing.status() == ListingStatus::Scheduled && listing.scheduled_by().is_none() {
                    listing.release(cause, now)?;
                    self.repository.save_listing(&listing).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_catalog::{Collection, Credentials, Price, Product, ProviderKind, Shop, ShopStatus};
    use storefront_workflow::{ComponentRegistry, WorkflowExecutor};

    use crate::config::PublisherConfig;
    use crate::context::Services;
    use crate::jobs::{InMemoryJobStore, JobCoordinator, JobStatus, ScheduleOutcome};
    use crate::providers::memory::InMemoryWooCommerce;
    use crate::providers::{Providers, WooCommerceAdapter};
    use crate::repository::InMemoryCatalogRepository;
    use crate::steps::standard_steps;

    struct Harness {
        repo: Arc<InMemoryCatalogRepository>,
        api: Arc<InMemoryWooCommerce>,
        pipeline: PublishPipeline,
        publisher: Publisher,
        shop_id: ShopId,
    }

    fn harness() -> Harness {
        let repo = Arc::new(InMemoryCatalogRepository::new());
        let services = Services::in_memory(repo.clone());
        let api = Arc::new(InMemoryWooCommerce::new());
        let providers = Providers::new().with(Arc::new(WooCommerceAdapter::new(api.clone(), services.media_sync())));
        let executor = WorkflowExecutor::new(Arc::new(ComponentRegistry::standard()), Arc::new(standard_steps()));

        let shop = Shop {
            id: ShopId::new(),
            name: "Corner".into(),
            provider: ProviderKind::WooCommerce,
            status: ShopStatus::Active,
            credentials: Credentials {
                store_url: "https://corner.example".into(),
                api_key: "ck".into(),
                api_secret: "cs".into(),
                access_token: None,
            },
        };
        repo.insert_shop(shop.clone());

        let pipeline = PublishPipeline::new(services, providers, executor);
        Harness {
            publisher: Publisher::new(pipeline.clone()),
            pipeline,
            repo,
            api,
            shop_id: shop.id,
        }
    }

    fn product(h: &Harness, name: &str) -> ProductId {
        let product = Product::new(ProductId::new(), name, Price::new(1500, "EUR")).unwrap();
        let id = product.id;
        h.repo.insert_product(product);
        id
    }

    #[tokio::test]
    async fn publishes_unlisted_products_immediately() {
        let h = harness();
        let id = product(&h, "Mug");

        let outcome = h.publisher.publish_products(h.shop_id, &[id, id]).await.unwrap();

        assert_eq!(outcome.settled(), 1);
        assert_eq!(h.repo.listing_status(h.shop_id, id), Some(ListingStatus::Published));
        assert_eq!(h.api.products().len(), 1);
    }

    #[tokio::test]
    async fn unknown_products_get_no_listing() {
        let h = harness();
        let ghost = ProductId::new();

        let outcome = h.publisher.publish_products(h.shop_id, &[ghost]).await.unwrap();

        let BatchOutcome::Completed(report) = outcome else {
            panic!("expected a completed batch");
        };
        assert_eq!(report.missing, vec![ghost]);
        assert_eq!(h.repo.listing_status(h.shop_id, ghost), None);
    }

    #[tokio::test]
    async fn failed_batch_releases_what_it_scheduled() {
        let h = harness();
        let product = Product::new(ProductId::new(), "Mug", Price::new(1500, "EUR"))
            .unwrap()
            .with_category_path(["Kitchen"]);
        let id = product.id;
        h.repo.insert_product(product);
        h.api.fail_category_creates();

        let err = h.publisher.publish_products(h.shop_id, &[id]).await.unwrap_err();

        assert!(matches!(err, PublisherError::Pipeline(PipelineError::Provider(_))));
        assert_eq!(h.repo.listing_status(h.shop_id, id), Some(ListingStatus::NotPublished));
    }

    #[tokio::test]
    async fn busy_shop_is_skipped_untouched() {
        let h = harness();
        let id = product(&h, "Mug");
        let _held = h.pipeline.guards().try_claim(h.shop_id).unwrap();

        let outcome = h.publisher.publish_products(h.shop_id, &[id]).await.unwrap();

        assert_eq!(
            outcome,
            BatchOutcome::Skipped {
                reason: SkipReason::ShopBusy
            }
        );
        assert_eq!(h.repo.listing_status(h.shop_id, id), None);
        assert!(h.api.products().is_empty());
    }

    #[tokio::test]
    async fn listings_held_by_a_job_are_left_to_it() {
        let h = harness();
        let id = product(&h, "Mug");
        h.repo.list_on(h.shop_id, id);
        let coordinator = JobCoordinator::new(InMemoryJobStore::arc(), h.pipeline.clone(), &PublisherConfig::default());
        let ScheduleOutcome::Scheduled { job_id, .. } = coordinator.schedule(h.shop_id, None).await.unwrap() else {
            panic!("expected a job");
        };

        let outcome = h.publisher.publish_products(h.shop_id, &[id]).await.unwrap();

        assert_eq!(
            outcome,
            BatchOutcome::Skipped {
                reason: SkipReason::NoEligibleProducts
            }
        );
        assert!(h.api.products().is_empty());
        let listing = h.repo.listing(h.shop_id, id).await.unwrap().unwrap();
        assert_eq!(listing.scheduled_by(), Some(job_id));
        assert_eq!(
            coordinator.schedule(h.shop_id, None).await.unwrap(),
            ScheduleOutcome::Skipped {
                reason: SkipReason::NoEligibleProducts
            }
        );

        let progress = coordinator.run_next(job_id).await.unwrap();
        assert_eq!(progress.status, JobStatus::Succeeded);
        assert_eq!(h.api.products().len(), 1);
        assert_eq!(h.repo.listing_status(h.shop_id, id), Some(ListingStatus::Published));
    }

    #[tokio::test]
    async fn collection_publish_and_unpublish() {
        let h = harness();
        let summer = Collection::new("Summer", "").unwrap();
        let product = Product::new(ProductId::new(), "Hat", Price::new(900, "EUR"))
            .unwrap()
            .with_collection(summer.clone());
        let id = product.id;
        h.repo.insert_product(product);

        h.publisher.publish_collection(h.shop_id, summer.id).await.unwrap();
        assert_eq!(h.repo.listing_status(h.shop_id, id), Some(ListingStatus::Published));

        let listing = h.publisher.unpublish(h.shop_id, id).await.unwrap();
        assert_eq!(listing.status(), ListingStatus::NotPublished);
        assert!(matches!(
            h.publisher.unpublish(h.shop_id, id).await,
            Err(PublisherError::Listing(_))
        ));
        assert!(matches!(
            h.publisher.unpublish(h.shop_id, ProductId::new()).await,
            Err(PublisherError::NotListed { .. })
        ));
    }
}
