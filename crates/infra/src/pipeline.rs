//! One batch, end to end: load products, run the shop's workflow (or publish
//! directly when it has none), then settle every listing of the batch.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{Span, debug, info, instrument, warn};

use storefront_catalog::{ListingStatus, ProductOnShop, ProviderKind, PublishReceipt};
use storefront_core::{DomainError, JobId, ProductId, RunId, ShopId};
use storefront_workflow::{ValidationError, WorkflowError, WorkflowExecutor};

use crate::context::{PublishContext, Services};
use crate::guard::{ShopGuard, ShopGuards};
use crate::providers::{ProductFailure, ProviderError, Providers, PublishedProduct, UploadReport};
use crate::repository::{CatalogRepository, RepositoryError};

/// Why nothing was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ShopNotFound,
    ShopInactive,
    NoEligibleProducts,
    /// Another run holds the shop.
    ShopBusy,
}

impl core::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            SkipReason::ShopNotFound => "shop not found",
            SkipReason::ShopInactive => "shop is not active",
            SkipReason::NoEligibleProducts => "no eligible products",
            SkipReason::ShopBusy => "shop has a run in progress",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Workflow(WorkflowError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("listing update rejected: {0}")]
    Listing(#[from] DomainError),

    #[error("no adapter configured for {0}")]
    NoAdapter(ProviderKind),
}

impl PipelineError {
    /// Whether the same batch may succeed on a later attempt.
    pub fn is_retriable(&self) -> bool {
        match self {
            PipelineError::Provider(e) => e.is_retriable(),
            PipelineError::Workflow(e) => e.is_retriable(),
            PipelineError::Repository(_) => true,
            PipelineError::Invalid(_) | PipelineError::Listing(_) | PipelineError::NoAdapter(_) => false,
        }
    }
}

/// Where every product of a completed batch ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub run_id: RunId,
    pub published: Vec<PublishedProduct>,
    /// Dropped by a filter step.
    pub filtered: Vec<ProductId>,
    /// Rejected individually by the provider.
    pub rejected: Vec<ProductFailure>,
    /// No longer in the catalog.
    pub missing: Vec<ProductId>,
}

impl BatchReport {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            published: Vec::new(),
            filtered: Vec::new(),
            rejected: Vec::new(),
            missing: Vec::new(),
        }
    }

    /// Products that reached a final outcome for this attempt.
    pub fn settled(&self) -> usize {
        self.published.len() + self.filtered.len() + self.rejected.len() + self.missing.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum BatchOutcome {
    Skipped { reason: SkipReason },
    Completed(BatchReport),
}

impl BatchOutcome {
    pub fn settled(&self) -> usize {
        match self {
            BatchOutcome::Skipped { .. } => 0,
            BatchOutcome::Completed(report) => report.settled(),
        }
    }
}

#[derive(Clone)]
pub struct PublishPipeline {
    repository: Arc<dyn CatalogRepository>,
    services: Services,
    providers: Providers,
    executor: WorkflowExecutor<PublishContext>,
    guards: ShopGuards,
}

impl PublishPipeline {
    pub fn new(services: Services, providers: Providers, executor: WorkflowExecutor<PublishContext>) -> Self {
        Self {
            repository: Arc::clone(&services.repository),
            services,
            providers,
            executor,
            guards: ShopGuards::default(),
        }
    }

    pub fn repository(&self) -> &Arc<dyn CatalogRepository> {
        &self.repository
    }

    pub fn executor(&self) -> &WorkflowExecutor<PublishContext> {
        &self.executor
    }

    /// Busy shops, shared by every clone of this pipeline.
    pub fn guards(&self) -> &ShopGuards {
        &self.guards
    }

    /// Publish `product_ids` to the guarded shop as one run.
    ///
    /// Listings of published products become Published (or get a republish
    /// receipt). Listings of filtered, rejected or missing products are
    /// released only while still Scheduled by `owner` (`None` for a direct
    /// publish). Batch-level failures leave listings untouched.
    #[instrument(
        name = "publish_run",
        skip_all,
        fields(shop_id = %guard.shop_id(), count = product_ids.len(), run_id = tracing::field::Empty),
        err
    )]
    pub async fn run_batch(
        &self,
        guard: &ShopGuard,
        owner: Option<JobId>,
        product_ids: &[ProductId],
    ) -> Result<BatchOutcome, PipelineError> {
        let shop_id = guard.shop_id();
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
        if product_ids.is_empty() {
            return Ok(BatchOutcome::Skipped {
                reason: SkipReason::NoEligibleProducts,
            });
        }
        let adapter = self
            .providers
            .get(shop.provider)
            .ok_or(PipelineError::NoAdapter(shop.provider))?;

        let provider = adapter.kind();
        let ctx = PublishContext::new(shop, adapter, self.services.clone());
        let run_id = ctx.run.run_id();
        Span::current().record("run_id", tracing::field::display(run_id));

        let products = self.repository.products(product_ids).await?;
        let mut report = BatchReport::new(run_id);

        let upload = if products.is_empty() {
            None
        } else {
            match self.repository.workflow(shop_id).await? {
                Some(workflow) if !workflow.is_empty() => {
                    let result = self.executor.execute(&workflow, &ctx, products.clone()).await;
                    let ledger = ctx.into_ledger();
                    match result {
                        Ok(outcome) => {
                            debug!(steps = outcome.steps_run, remaining = outcome.batch.len(), "workflow completed");
                            ledger.merged()
                        }
                        Err(WorkflowError::Invalid(e)) => return Err(PipelineError::Invalid(e)),
                        Err(e) => {
                            let failure = ledger.failure().cloned();
                            // Keep receipts of anything a provider already accepted.
                            if let Some(partial) = ledger.merged() {
                                self.record_receipts(shop_id, run_id, &partial).await?;
                            }
                            return Err(match failure {
                                Some(provider) => PipelineError::Provider(provider),
                                None => PipelineError::Workflow(e),
                            });
                        }
                    }
                }
                _ => Some(
                    ctx.adapter
                        .upload_product_many(&ctx.run, &ctx.shop, &products)
                        .await?,
                ),
            }
        };

        let upload = upload.unwrap_or_else(|| UploadReport::new(provider));
        let now = Utc::now();
        for product_id in product_ids {
            let listing = self.repository.listing(shop_id, *product_id).await?;

            if let Some(receipt) = upload.receipt_for(*product_id, run_id) {
                let mut listing = listing.unwrap_or_else(|| ProductOnShop::new(shop_id, *product_id));
                settle_published(&mut listing, receipt.clone(), now)?;
                self.repository.save_listing(&listing).await?;
                report.published.push(PublishedProduct {
                    product_id: *product_id,
                    reference: receipt.reference,
                });
                continue;
            }

            let cause = if let Some(reason) = upload.failure_for(*product_id) {
                report.rejected.push(ProductFailure {
                    product_id: *product_id,
                    reason: reason.to_string(),
                });
                format!("rejected by provider: {reason}")
            } else if products.iter().any(|p| p.id == *product_id) {
                report.filtered.push(*product_id);
                "filtered out by workflow".to_string()
            } else {
                report.missing.push(*product_id);
                "product not found".to_string()
            };

            let Some(mut listing) = listing.filter(|l| l.status() == ListingStatus::Scheduled) else {
                continue;
            };
            if listing.scheduled_by() == owner {
                listing.release(cause, now)?;
                self.repository.save_listing(&listing).await?;
            } else {
                debug!(product_id = %product_id, held_by = ?listing.scheduled_by(), "listing held by another run");
            }
        }

        if !report.rejected.is_empty() {
            warn!(rejected = report.rejected.len(), "some products were rejected");
        }
        info!(
            published = report.published.len(),
            filtered = report.filtered.len(),
            rejected = report.rejected.len(),
            missing = report.missing.len(),
            "batch settled"
        );
        Ok(BatchOutcome::Completed(report))
    }

    async fn record_receipts(&self, shop_id: ShopId, run_id: RunId, upload: &UploadReport) -> Result<(), PipelineError> {
        let now = Utc::now();
        for published in &upload.published {
            let Some(receipt) = upload.receipt_for(published.product_id, run_id) else {
                continue;
            };
            let mut listing = self
                .repository
                .listing(shop_id, published.product_id)
                .await?
                .unwrap_or_else(|| ProductOnShop::new(shop_id, published.product_id));
            settle_published(&mut listing, receipt, now)?;
            self.repository.save_listing(&listing).await?;
        }
        Ok(())
    }
}

/// Move a listing to Published, whatever the status it was found in.
fn settle_published(
    listing: &mut ProductOnShop,
    receipt: PublishReceipt,
    at: chrono::DateTime<Utc>,
) -> Result<(), DomainError> {
    match listing.status() {
        ListingStatus::NotPublished => {
            listing.schedule(None, at)?;
            listing.publish(receipt, at)
        }
        ListingStatus::Scheduled => listing.publish(receipt, at),
        ListingStatus::Published => listing.record_republish(receipt, at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storefront_catalog::{Credentials, Price, Product, Shop, ShopStatus};
    use storefront_workflow::{ComponentCode, ComponentRegistry, Workflow, WorkflowStep};

    use crate::providers::WooCommerceAdapter;
    use crate::providers::memory::InMemoryWooCommerce;
    use crate::repository::InMemoryCatalogRepository;
    use crate::steps::standard_steps;

    struct Harness {
        repo: Arc<InMemoryCatalogRepository>,
        api: Arc<InMemoryWooCommerce>,
        pipeline: PublishPipeline,
        shop: Shop,
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

        Harness {
            pipeline: PublishPipeline::new(services, providers, executor),
            repo,
            api,
            shop,
        }
    }

    fn scheduled_product(h: &Harness, name: &str, cents: u64) -> ProductId {
        let product = Product::new(ProductId::new(), name, Price::new(cents, "EUR")).unwrap();
        let id = product.id;
        h.repo.insert_product(product);
        let mut listing = ProductOnShop::new(h.shop.id, id);
        listing.schedule(None, Utc::now()).unwrap();
        h.repo.insert_listing(listing);
        id
    }

    async fn run(h: &Harness, ids: &[ProductId]) -> Result<BatchOutcome, PipelineError> {
        let guard = h.pipeline.guards().try_claim(h.shop.id).unwrap();
        h.pipeline.run_batch(&guard, None, ids).await
    }

    fn workflow(h: &Harness, steps: Vec<(ComponentCode, serde_json::Value)>) {
        let registry = ComponentRegistry::standard();
        let mut workflow = Workflow::new(h.shop.id);
        for (order, (code, inputs)) in steps.into_iter().enumerate() {
            let inputs = inputs.as_object().cloned().unwrap_or_default();
            workflow
                .insert_step(&registry, WorkflowStep::new(code, order as u32, inputs))
                .unwrap();
        }
        h.repo.insert_workflow(workflow);
    }

    #[tokio::test]
    async fn without_workflow_products_are_published_directly() {
        let h = harness();
        let ids = vec![scheduled_product(&h, "A", 100), scheduled_product(&h, "B", 200)];

        let outcome = run(&h, &ids).await.unwrap();

        assert_eq!(outcome.settled(), 2);
        for id in &ids {
            assert_eq!(h.repo.listing_status(h.shop.id, *id), Some(ListingStatus::Published));
        }
        assert_eq!(h.api.products().len(), 2);
    }

    #[tokio::test]
    async fn filtered_products_are_released() {
        let h = harness();
        workflow(
            &h,
            vec![
                (ComponentCode::FilterByPrice, json!({"min": 1.5})),
                (ComponentCode::EmitToShop, json!({})),
            ],
        );
        let cheap = scheduled_product(&h, "cheap", 100);
        let fine = scheduled_product(&h, "fine", 300);

        let outcome = run(&h, &[cheap, fine]).await.unwrap();

        let BatchOutcome::Completed(report) = outcome else {
            panic!("expected a completed batch");
        };
        assert_eq!(report.filtered, vec![cheap]);
        assert_eq!(report.published.len(), 1);
        assert_eq!(h.repo.listing_status(h.shop.id, cheap), Some(ListingStatus::NotPublished));
        assert_eq!(h.repo.listing_status(h.shop.id, fine), Some(ListingStatus::Published));
    }

    #[tokio::test]
    async fn listings_owned_by_a_job_survive_a_direct_run() {
        let h = harness();
        workflow(
            &h,
            vec![
                (ComponentCode::FilterByPrice, json!({"min": 1.5})),
                (ComponentCode::EmitToShop, json!({})),
            ],
        );
        let product = Product::new(ProductId::new(), "cheap", Price::new(100, "EUR")).unwrap();
        let id = product.id;
        h.repo.insert_product(product);
        let job_id = JobId::new();
        let mut listing = ProductOnShop::new(h.shop.id, id);
        listing.schedule(Some(job_id), Utc::now()).unwrap();
        h.repo.insert_listing(listing);

        let outcome = run(&h, &[id]).await.unwrap();
        assert_eq!(outcome.settled(), 1);
        let listing = h.repo.listing(h.shop.id, id).await.unwrap().unwrap();
        assert_eq!(listing.scheduled_by(), Some(job_id));

        let guard = h.pipeline.guards().try_claim(h.shop.id).unwrap();
        h.pipeline.run_batch(&guard, Some(job_id), &[id]).await.unwrap();
        assert_eq!(h.repo.listing_status(h.shop.id, id), Some(ListingStatus::NotPublished));
    }

    #[tokio::test]
    async fn invalid_workflow_fails_without_side_effects() {
        let h = harness();
        workflow(&h, vec![(ComponentCode::AdjustPrice, json!({"percent": 5}))]);
        let id = scheduled_product(&h, "A", 100);

        let err = run(&h, &[id]).await.unwrap_err();

        assert!(matches!(err, PipelineError::Invalid(_)));
        assert!(!err.is_retriable());
        assert!(h.api.products().is_empty());
        assert_eq!(h.repo.listing_status(h.shop.id, id), Some(ListingStatus::Scheduled));
    }

    #[tokio::test]
    async fn batch_level_provider_failure_keeps_listings_scheduled() {
        let h = harness();
        h.api.fail_category_creates();
        let product = Product::new(ProductId::new(), "Mug", Price::new(900, "EUR"))
            .unwrap()
            .with_category_path(["Kitchen"]);
        let id = product.id;
        h.repo.insert_product(product);
        let mut listing = ProductOnShop::new(h.shop.id, id);
        listing.schedule(None, Utc::now()).unwrap();
        h.repo.insert_listing(listing);

        let err = run(&h, &[id]).await.unwrap_err();

        assert!(matches!(err, PipelineError::Provider(ProviderError::Reconcile(_))));
        assert!(err.is_retriable());
        assert_eq!(h.repo.listing_status(h.shop.id, id), Some(ListingStatus::Scheduled));
    }

    #[tokio::test]
    async fn rejected_products_settle_and_release() {
        let h = harness();
        h.api.reject_product("bad");
        let good = scheduled_product(&h, "good", 100);
        let bad = scheduled_product(&h, "bad", 100);
        let gone = ProductId::new();

        let outcome = run(&h, &[good, bad, gone]).await.unwrap();

        let BatchOutcome::Completed(report) = outcome else {
            panic!("expected a completed batch");
        };
        assert_eq!(report.settled(), 3);
        assert_eq!(report.rejected[0].product_id, bad);
        assert_eq!(report.missing, vec![gone]);
        assert_eq!(h.repo.listing_status(h.shop.id, bad), Some(ListingStatus::NotPublished));
    }

    #[tokio::test]
    async fn republishing_keeps_listing_published() {
        let h = harness();
        let id = scheduled_product(&h, "A", 100);
        run(&h, &[id]).await.unwrap();
        run(&h, &[id]).await.unwrap();

        let listing = h.repo.listing(h.shop.id, id).await.unwrap().unwrap();
        assert_eq!(listing.status(), ListingStatus::Published);
        assert_eq!(listing.history().len(), 3);
    }

    #[tokio::test]
    async fn inactive_shop_is_skipped() {
        let h = harness();
        let mut closed = h.shop.clone();
        closed.status = ShopStatus::Closed;
        h.repo.insert_shop(closed);

        let outcome = run(&h, &[ProductId::new()]).await.unwrap();
        assert_eq!(
            outcome,
            BatchOutcome::Skipped {
                reason: SkipReason::ShopInactive
            }
        );
    }
}
