//! Schedules bulk publish jobs and works them off one slice at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use storefront_catalog::ListingStatus;
use storefront_core::{DomainError, JobId, ShopId};

use super::store::{JobStore, JobStoreError};
use super::types::{JobStatus, PublishJob, RetryPolicy};
use crate::config::PublisherConfig;
use crate::guard::ShopGuard;
use crate::pipeline::{BatchOutcome, PublishPipeline, SkipReason};
use crate::repository::{CatalogRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {0} has already finished")]
    Finished(JobId),

    /// Another run holds the job's shop; try again once it settles.
    #[error("shop {0} has a run in progress")]
    ShopBusy(ShopId),

    #[error(transparent)]
    Store(#[from] JobStoreError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ScheduleOutcome {
    Scheduled { job_id: JobId, products: usize, batch_size: usize },
    Skipped { reason: SkipReason },
}

/// Where a job stands after a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Products settled by this tick.
    pub settled: usize,
    pub uploaded_products: usize,
    pub total: usize,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl JobProgress {
    fn of(job: &PublishJob, settled: usize) -> Self {
        Self {
            job_id: job.id,
            status: job.status(),
            settled,
            uploaded_products: job.uploaded_products(),
            total: job.total(),
            next_run_at: job.next_run_at,
            last_error: job.last_error.clone(),
        }
    }

    /// Nothing more will happen without the backoff elapsing (or ever).
    pub fn is_waiting(&self) -> bool {
        self.status.is_terminal() || self.next_run_at.is_some()
    }
}

#[derive(Clone)]
pub struct JobCoordinator {
    store: Arc<dyn JobStore>,
    repository: Arc<dyn CatalogRepository>,
    pipeline: PublishPipeline,
    default_batch_size: usize,
    retry_policy: RetryPolicy,
}

impl JobCoordinator {
    pub fn new(store: Arc<dyn JobStore>, pipeline: PublishPipeline, config: &PublisherConfig) -> Self {
        Self {
            store,
            repository: Arc::clone(pipeline.repository()),
            pipeline,
            default_batch_size: config.default_batch_size.max(1),
            retry_policy: config.retry_policy.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn pipeline(&self) -> &PublishPipeline {
        &self.pipeline
    }

    pub async fn get(&self, job_id: JobId) -> Result<Option<PublishJob>, CoordinatorError> {
        Ok(self.store.get(job_id).await?)
    }

    /// Snapshot the shop's unpublished products into a new job and mark them
    /// Scheduled.
    #[instrument(skip(self), fields(shop_id = %shop_id), err)]
    pub async fn schedule(
        &self,
        shop_id: ShopId,
        batch_size: Option<usize>,
    ) -> Result<ScheduleOutcome, CoordinatorError> {
        let Some(shop) = self.repository.shop(shop_id).await? else {
            return Ok(ScheduleOutcome::Skipped {
                reason: SkipReason::ShopNotFound,
            });
        };
        if !shop.is_active() {
            return Ok(ScheduleOutcome::Skipped {
                reason: SkipReason::ShopInactive,
            });
        }

        let listings = self
            .repository
            .listings_with_status(shop_id, ListingStatus::NotPublished)
            .await?;
        if listings.is_empty() {
            info!("no unpublished products");
            return Ok(ScheduleOutcome::Skipped {
                reason: SkipReason::NoEligibleProducts,
            });
        }

        let product_ids = listings.iter().map(|l| l.product_id).collect();
        let batch_size = batch_size.unwrap_or(self.default_batch_size);
        let job = PublishJob::new(shop_id, product_ids, batch_size)?
            .with_retry_policy(self.retry_policy.clone());
        self.store.insert(&job).await?;

        let now = Utc::now();
        for mut listing in listings {
            listing.schedule(Some(job.id), now)?;
            self.repository.save_listing(&listing).await?;
        }

        info!(job_id = %job.id, products = job.total(), batch_size, "publish job scheduled");
        Ok(ScheduleOutcome::Scheduled {
            job_id: job.id,
            products: job.total(),
            batch_size,
        })
    }

    /// Publish the job's next slice and record the result.
    ///
    /// Runs regardless of a pending backoff delay; the worker only picks up
    /// due jobs. Fails with [`CoordinatorError::ShopBusy`] while another run
    /// holds the shop.
    pub async fn run_next(&self, job_id: JobId) -> Result<JobProgress, CoordinatorError> {
        let job = self.active(job_id).await?;
        let guard = self.claim(job.shop_id)?;
        self.run_next_with(job_id, &guard).await
    }

    /// [`run_next`](Self::run_next) for a caller already holding the shop.
    #[instrument(skip(self, guard), fields(job_id = %job_id), err)]
    pub async fn run_next_with(&self, job_id: JobId, guard: &ShopGuard) -> Result<JobProgress, CoordinatorError> {
        // Reloaded under the guard: a concurrent run may have moved the cursor.
        let mut job = self.active(job_id).await?;
        if job.shop_id != guard.shop_id() {
            return Err(DomainError::invariant(format!("job {job_id} belongs to shop {}", job.shop_id)).into());
        }

        let slice = job.next_slice().to_vec();
        let started = Utc::now();
        let mut settled = 0;

        match self.pipeline.run_batch(guard, Some(job.id), &slice).await {
            Ok(BatchOutcome::Completed(report)) => {
                settled = job.record_progress(report.settled(), started)?;
            }
            Ok(BatchOutcome::Skipped { reason }) => {
                warn!(%reason, "batch skipped, failing job");
                job.record_failure(reason.to_string(), false, started)?;
            }
            Err(e) => {
                let retriable = e.is_retriable();
                warn!(error = %e, retriable, attempts = job.attempts + 1, "batch failed");
                job.record_failure(e.to_string(), retriable, started)?;
            }
        }

        if job.is_terminal() {
            self.release_unsettled(&job).await?;
        }
        self.store.update(&job).await?;

        info!(
            status = %job.status(),
            settled,
            uploaded = job.uploaded_products(),
            total = job.total(),
            "job advanced"
        );
        Ok(JobProgress::of(&job, settled))
    }

    /// Run slices until the job finishes or has to wait for a retry.
    pub async fn drive(&self, job_id: JobId) -> Result<JobProgress, CoordinatorError> {
        loop {
            let progress = self.run_next(job_id).await?;
            if progress.is_waiting() {
                return Ok(progress);
            }
        }
    }

    /// Stop a job and release the listings it still holds.
    #[instrument(skip(self), fields(job_id = %job_id), err)]
    pub async fn cancel(&self, job_id: JobId) -> Result<JobProgress, CoordinatorError> {
        let job = self.active(job_id).await?;
        let _guard = self.claim(job.shop_id)?;
        let mut job = self.active(job_id).await?;

        job.cancel("cancelled")?;
        self.release_unsettled(&job).await?;
        self.store.update(&job).await?;
        info!(uploaded = job.uploaded_products(), "job cancelled");
        Ok(JobProgress::of(&job, 0))
    }

    async fn active(&self, job_id: JobId) -> Result<PublishJob, CoordinatorError> {
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or(CoordinatorError::NotFound(job_id))?;
        if job.is_terminal() {
            return Err(CoordinatorError::Finished(job_id));
        }
        Ok(job)
    }

    fn claim(&self, shop_id: ShopId) -> Result<ShopGuard, CoordinatorError> {
        self.pipeline.guards().try_claim(shop_id).ok_or_else(|| {
            debug!(shop_id = %shop_id, "shop busy");
            CoordinatorError::ShopBusy(shop_id)
        })
    }

    async fn release_unsettled(&self, job: &PublishJob) -> Result<(), CoordinatorError> {
        let cause = match &job.last_error {
            Some(error) => format!("job {} failed: {error}", job.id),
            None => format!("job {} stopped", job.id),
        };
        let now = Utc::now();
        let mut released = 0;
        for product_id in job.unsettled() {
            let Some(mut listing) = self.repository.listing(job.shop_id, *product_id).await? else {
                continue;
            };
            if listing.scheduled_by() == Some(job.id) {
                listing.release(cause.clone(), now)?;
                self.repository.save_listing(&listing).await?;
                released += 1;
            }
        }
        if released > 0 {
            info!(job_id = %job.id, released, "listings released");
        }
        Ok(())
    }
}
