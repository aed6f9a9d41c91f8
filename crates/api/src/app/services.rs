//! Service wiring: catalog, provider clients, pipeline and job system.

use std::sync::Arc;

use tracing::{info, warn};

use storefront_infra::collaborators::HttpImageFetcher;
use storefront_infra::jobs::{InMemoryJobStore, JobCoordinator, JobStore, PostgresJobStore};
use storefront_infra::providers::shopify::ShopifyClient;
use storefront_infra::providers::woocommerce::WooCommerceClient;
use storefront_infra::providers::{Providers, ShopifyAdapter, WooCommerceAdapter};
use storefront_infra::repository::{CatalogRepository, InMemoryCatalogRepository};
use storefront_infra::steps::standard_steps;
use storefront_infra::{PublishPipeline, Publisher, PublisherConfig, Services};
use storefront_workflow::{ComponentRegistry, ValidationError, Workflow, WorkflowExecutor};

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub repository: Arc<dyn CatalogRepository>,
    pub registry: Arc<ComponentRegistry>,
    pub coordinator: JobCoordinator,
    pub publisher: Publisher,
}

impl AppServices {
    pub fn new(services: Services, providers: Providers, jobs: Arc<dyn JobStore>, config: &PublisherConfig) -> Self {
        let registry = Arc::new(ComponentRegistry::standard());
        let executor = WorkflowExecutor::new(Arc::clone(&registry), Arc::new(standard_steps()));
        let repository = Arc::clone(&services.repository);
        let pipeline = PublishPipeline::new(services, providers, executor);

        Self {
            repository,
            registry,
            coordinator: JobCoordinator::new(jobs, pipeline.clone(), config),
            publisher: Publisher::new(pipeline),
        }
    }

    pub fn validate_workflow(&self, workflow: &Workflow) -> Result<(), ValidationError> {
        self.coordinator.pipeline().executor().validate_workflow(workflow)
    }
}

/// Wire the production services from `config`.
///
/// The catalog is held in memory; jobs go to Postgres when a database URL is
/// configured.
pub async fn build_services(config: &PublisherConfig) -> anyhow::Result<AppServices> {
    let repository: Arc<dyn CatalogRepository> = InMemoryCatalogRepository::arc();
    let mut services = Services::in_memory(repository);
    services.fetcher = Arc::new(HttpImageFetcher::new(config.http_timeout)?);

    let shopify = ShopifyClient::new(config.http_timeout)?;
    let woocommerce = WooCommerceClient::new(config.http_timeout)?;
    let providers = Providers::new()
        .with(Arc::new(ShopifyAdapter::new(Arc::new(shopify), services.media_sync())))
        .with(Arc::new(WooCommerceAdapter::new(Arc::new(woocommerce), services.media_sync())));

    let jobs: Arc<dyn JobStore> = match &config.database_url {
        Some(url) => {
            info!("using postgres job store");
            Arc::new(PostgresJobStore::connect(url).await?)
        }
        None => {
            warn!("DATABASE_URL not set; publish jobs are kept in memory");
            InMemoryJobStore::arc()
        }
    };

    Ok(AppServices::new(services, providers, jobs, config))
}
