//! Background worker that advances due publish jobs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::coordinator::{CoordinatorError, JobCoordinator};
use crate::config::PublisherConfig;
use crate::guard::ShopGuards;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct PublishWorkerConfig {
    /// How often to poll for due jobs
    pub poll_interval: Duration,
    /// Maximum jobs picked up per poll
    pub max_concurrent: usize,
    /// Name for logging
    pub name: String,
}

impl Default for PublishWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1_000),
            max_concurrent: 4,
            name: "publish-worker".to_string(),
        }
    }
}

impl PublishWorkerConfig {
    pub fn from_publisher(config: &PublisherConfig) -> Self {
        Self::default().with_poll_interval(config.poll_interval)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WorkerStats {
    pub polls: u64,
    pub batches_run: u64,
    pub batches_errored: u64,
    /// Due jobs left for a later poll because their shop was busy.
    pub skipped_busy_shop: u64,
}

/// Handle to control a running worker.
#[derive(Debug)]
pub struct PublishWorkerHandle {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl PublishWorkerHandle {
    /// Stop polling and wait for in-flight batches to finish.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.join.await {
            error!(error = %e, "publish worker task ended abnormally");
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Polls the job store and runs one slice per due job, at most one run per
/// shop at a time.
pub struct PublishWorker {
    coordinator: JobCoordinator,
    config: PublishWorkerConfig,
    stats: Arc<Mutex<WorkerStats>>,
}

impl PublishWorker {
    pub fn new(coordinator: JobCoordinator, config: PublishWorkerConfig) -> Self {
        Self {
            coordinator,
            config,
            stats: Arc::new(Mutex::new(WorkerStats::default())),
        }
    }

    /// Claims shared with the pipeline, so direct publishes and job
    /// endpoints see the same busy shops.
    pub fn guards(&self) -> &ShopGuards {
        self.coordinator.pipeline().guards()
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().unwrap().clone()
    }

    /// Spawn the polling loop.
    pub fn start(self) -> PublishWorkerHandle {
        let shutdown = Arc::new(Notify::new());
        let stats = Arc::clone(&self.stats);
        let signal = Arc::clone(&shutdown);

        let join = tokio::spawn(async move {
            info!(worker = %self.config.name, interval_ms = self.config.poll_interval.as_millis() as u64, "publish worker started");

            let mut interval = tokio::time::interval(self.config.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut in_flight = JoinSet::new();

            loop {
                tokio::select! {
                    _ = signal.notified() => {
                        info!(worker = %self.config.name, "publish worker received shutdown signal");
                        break;
                    }
                    _ = interval.tick() => {
                        while in_flight.try_join_next().is_some() {}
                        self.poll_once(&mut in_flight).await;
                    }
                }
            }

            let pending = in_flight.len();
            if pending > 0 {
                info!(pending, "waiting for in-flight batches");
            }
            while in_flight.join_next().await.is_some() {}
            info!(worker = %self.config.name, "publish worker stopped");
        });

        PublishWorkerHandle {
            shutdown,
            join,
            stats,
        }
    }

    /// Start one batch for every due job whose shop is idle. Returns the
    /// number of batches started.
    pub async fn poll_once(&self, in_flight: &mut JoinSet<()>) -> usize {
        self.stats.lock().unwrap().polls += 1;

        let due = match self
            .coordinator
            .store()
            .due(Utc::now(), self.config.max_concurrent)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                warn!(error = %e, "failed to load due jobs");
                return 0;
            }
        };

        let mut started = 0;
        for job in due {
            let Some(guard) = self.guards().try_claim(job.shop_id) else {
                debug!(job_id = %job.id, shop_id = %job.shop_id, "shop busy, job deferred");
                self.stats.lock().unwrap().skipped_busy_shop += 1;
                continue;
            };

            let coordinator = self.coordinator.clone();
            let stats = Arc::clone(&self.stats);
            in_flight.spawn(async move {
                let result = coordinator.run_next_with(job.id, &guard).await;
                drop(guard);
                let mut stats = stats.lock().unwrap();
                stats.batches_run += 1;
                match result {
                    Ok(progress) => debug!(job_id = %job.id, status = %progress.status, "worker batch done"),
                    // Finished between the poll and the run.
                    Err(CoordinatorError::Finished(_)) => {}
                    Err(e) => {
                        stats.batches_errored += 1;
                        warn!(job_id = %job.id, error = %e, "worker batch errored");
                    }
                }
            });
            started += 1;
        }
        started
    }
}
