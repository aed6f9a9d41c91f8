//! Bulk publish jobs.
//!
//! A job snapshots a shop's unpublished products and publishes them in
//! fixed-size slices. The `uploaded_products` counter is the only resumption
//! cursor: it advances by the products each slice settled and never moves
//! back. Batch-level failures are retried with backoff per the job's
//! [`RetryPolicy`]; validation failures end the job at once.
//!
//! ## Components
//!
//! - `PublishJob`: the persisted job record
//! - `JobStore`: persistence (in-memory or Postgres)
//! - `JobCoordinator`: schedule / run / drive / cancel
//! - `PublishWorker`: background polling with one run per shop at a time

pub mod coordinator;
pub mod postgres;
pub mod store;
pub mod types;
pub mod worker;

pub use coordinator::{CoordinatorError, JobCoordinator, JobProgress, ScheduleOutcome};
pub use postgres::PostgresJobStore;
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
pub use types::{BackoffStrategy, JobAttemptRecord, JobStatus, PublishJob, RetryPolicy};
pub use worker::{PublishWorker, PublishWorkerConfig, PublishWorkerHandle, WorkerStats};
