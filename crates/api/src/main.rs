use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use storefront_infra::PublisherConfig;
use storefront_infra::jobs::{PublishWorker, PublishWorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init();

    let config = PublisherConfig::from_env();
    let services = Arc::new(storefront_api::app::services::build_services(&config).await?);

    let worker = PublishWorker::new(
        services.coordinator.clone(),
        PublishWorkerConfig::from_publisher(&config),
    )
    .start();

    let app = storefront_api::app::build_app(services);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}
