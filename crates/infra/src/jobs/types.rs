//! Publish job record and retry policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, JobId, ProductId, ShopId};

/// Job execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its next batch (possibly behind a backoff delay).
    Scheduled,
    /// Every product of the job was settled.
    Succeeded,
    /// Cancelled, invalid, or out of retries.
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Scheduled => "scheduled",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(JobStatus::Scheduled),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::validation(format!("unknown job status '{other}'"))),
        }
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^attempt
    #[default]
    Exponential,
    /// Linear backoff: base * attempt
    Linear,
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of failed attempts before the job fails (0 = no retries)
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Backoff strategy
    pub strategy: BackoffStrategy,
    /// Jitter factor (0.0-1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// Create a policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
            jitter: 0.0,
        }
    }

    /// Create a policy with exponential backoff.
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
            jitter: 0.1,
        }
    }

    /// Calculate delay for a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Exponential => {
                let exp = 2_f64.powi((attempt - 1).min(62) as i32);
                (base_ms * exp).min(max_ms)
            }
            BackoffStrategy::Linear => (base_ms * attempt as f64).min(max_ms),
        };

        // Deterministic jitter derived from the attempt number.
        let jitter_range = delay_ms * self.jitter;
        let jitter = if jitter_range > 0.0 {
            let pseudo_random = ((attempt as f64 * 17.0) % 100.0) / 100.0;
            jitter_range * (pseudo_random - 0.5) * 2.0
        } else {
            0.0
        };

        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }

    /// Check if more retries are allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Record of one batch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    /// Products settled by this attempt.
    pub settled: usize,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// A bulk publish of a snapshot of products to one shop, worked off in
/// fixed-size slices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishJob {
    pub id: JobId,
    pub shop_id: ShopId,
    pub batch_size: usize,
    pub product_ids: Vec<ProductId>,
    uploaded_products: usize,
    status: JobStatus,
    pub last_run_time: Option<DateTime<Utc>>,
    /// Consecutive failed attempts.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub retry_policy: RetryPolicy,
    pub history: Vec<JobAttemptRecord>,
}

impl PublishJob {
    pub fn new(shop_id: ShopId, product_ids: Vec<ProductId>, batch_size: usize) -> DomainResult<Self> {
        if batch_size == 0 {
            return Err(DomainError::validation("batch size must be at least 1"));
        }
        if product_ids.is_empty() {
            return Err(DomainError::validation("a publish job needs at least one product"));
        }
        Ok(Self {
            id: JobId::new(),
            shop_id,
            batch_size,
            product_ids,
            uploaded_products: 0,
            status: JobStatus::Scheduled,
            last_run_time: None,
            attempts: 0,
            last_error: None,
            next_run_at: None,
            created_at: Utc::now(),
            retry_policy: RetryPolicy::default(),
            history: Vec::new(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Rebuild a job from persisted columns.
    ///
    /// The counter is clamped to the product list.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: JobId,
        shop_id: ShopId,
        batch_size: usize,
        product_ids: Vec<ProductId>,
        uploaded_products: usize,
        status: JobStatus,
        created_at: DateTime<Utc>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            id,
            shop_id,
            batch_size: batch_size.max(1),
            uploaded_products: uploaded_products.min(product_ids.len()),
            product_ids,
            status,
            last_run_time: None,
            attempts: 0,
            last_error: None,
            next_run_at: None,
            created_at,
            retry_policy,
            history: Vec::new(),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn uploaded_products(&self) -> usize {
        self.uploaded_products
    }

    pub fn total(&self) -> usize {
        self.product_ids.len()
    }

    pub fn remaining(&self) -> usize {
        self.total() - self.uploaded_products
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The products of the next attempt: `product_ids[uploaded..uploaded + batch_size]`.
    pub fn next_slice(&self) -> &[ProductId] {
        let start = self.uploaded_products;
        let end = (start + self.batch_size).min(self.total());
        &self.product_ids[start..end]
    }

    /// Scheduled and not waiting on a backoff delay.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Scheduled && self.next_run_at.is_none_or(|at| at <= now)
    }

    /// Products still owned by the job once it stops.
    pub fn unsettled(&self) -> &[ProductId] {
        &self.product_ids[self.uploaded_products..]
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.is_terminal() {
            return Err(DomainError::conflict(format!(
                "job {} is already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn push_attempt(&mut self, started_at: DateTime<Utc>, settled: usize, error: Option<String>) {
        let now = Utc::now();
        self.history.push(JobAttemptRecord {
            attempt: self.history.len() as u32 + 1,
            started_at,
            finished_at: now,
            success: error.is_none(),
            settled,
            error,
            duration_ms: (now - started_at).num_milliseconds().max(0) as u64,
        });
    }

    /// Advance the counter by `settled`, capped at the number of remaining
    /// products. Returns how far the counter actually moved.
    pub fn record_progress(&mut self, settled: usize, started_at: DateTime<Utc>) -> DomainResult<usize> {
        self.ensure_open()?;
        let advanced = settled.min(self.remaining());
        self.uploaded_products += advanced;
        self.last_run_time = Some(started_at);
        self.attempts = 0;
        self.last_error = None;
        self.next_run_at = None;
        if self.remaining() == 0 {
            self.status = JobStatus::Succeeded;
        }
        self.push_attempt(started_at, advanced, None);
        Ok(advanced)
    }

    /// Record a failed attempt. Retriable failures are rescheduled with
    /// backoff until the retry policy runs out; anything else fails the job.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        retriable: bool,
        started_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_open()?;
        let error = error.into();
        let now = Utc::now();
        self.attempts += 1;
        self.last_run_time = Some(started_at);
        self.last_error = Some(error.clone());
        self.push_attempt(started_at, 0, Some(error));

        if retriable && self.retry_policy.should_retry(self.attempts) {
            let delay = self.retry_policy.delay_for_attempt(self.attempts);
            self.next_run_at = Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
        } else {
            self.status = JobStatus::Failed;
            self.next_run_at = None;
        }
        Ok(())
    }

    /// Stop the job where it is.
    pub fn cancel(&mut self, reason: impl Into<String>) -> DomainResult<()> {
        self.ensure_open()?;
        self.status = JobStatus::Failed;
        self.last_error = Some(reason.into());
        self.next_run_at = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(count: usize, batch_size: usize) -> PublishJob {
        let ids = (0..count).map(|_| ProductId::new()).collect();
        PublishJob::new(ShopId::new(), ids, batch_size).unwrap()
    }

    #[test]
    fn exponential_backoff_calculates_correctly() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            strategy: BackoffStrategy::Exponential,
            jitter: 0.0,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(20), Duration::from_secs(10));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(500));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[test]
    fn linear_backoff_increases_linearly() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            strategy: BackoffStrategy::Linear,
            jitter: 0.0,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..Default::default()
        };

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn empty_jobs_and_zero_batches_are_rejected() {
        assert!(PublishJob::new(ShopId::new(), vec![], 20).is_err());
        assert!(PublishJob::new(ShopId::new(), vec![ProductId::new()], 0).is_err());
    }

    #[test]
    fn slices_walk_the_product_list() {
        let mut job = job(45, 20);
        assert_eq!(job.next_slice().len(), 20);

        job.record_progress(20, Utc::now()).unwrap();
        assert_eq!(job.next_slice(), &job.product_ids[20..40]);

        job.record_progress(20, Utc::now()).unwrap();
        assert_eq!(job.next_slice().len(), 5);

        job.record_progress(5, Utc::now()).unwrap();
        assert_eq!(job.status(), JobStatus::Succeeded);
        assert_eq!(job.uploaded_products(), 45);
        assert_eq!(job.history.len(), 3);
        assert!(job.history.iter().all(|h| h.success));
    }

    #[test]
    fn progress_is_capped_at_the_list_length() {
        let mut job = job(3, 20);
        assert_eq!(job.record_progress(10, Utc::now()).unwrap(), 3);
        assert_eq!(job.uploaded_products(), 3);
    }

    #[test]
    fn retriable_failures_back_off_then_fail() {
        let mut job = job(5, 5).with_retry_policy(RetryPolicy {
            max_attempts: 2,
            ..Default::default()
        });

        job.record_failure("provider down", true, Utc::now()).unwrap();
        assert_eq!(job.status(), JobStatus::Scheduled);
        assert!(job.next_run_at.is_some());
        assert!(!job.is_due(Utc::now() - chrono::Duration::seconds(1)));

        job.record_failure("provider down", true, Utc::now()).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.uploaded_products(), 0);
        assert_eq!(job.last_error.as_deref(), Some("provider down"));
    }

    #[test]
    fn non_retriable_failure_fails_immediately() {
        let mut job = job(5, 5);
        job.record_failure("workflow is invalid", false, Utc::now()).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let mut job = job(10, 5);
        job.record_failure("timeout", true, Utc::now()).unwrap();
        job.record_progress(5, Utc::now()).unwrap();
        assert_eq!(job.attempts, 0);
        assert!(job.last_error.is_none());
        assert!(job.is_due(Utc::now()));
    }

    #[test]
    fn terminal_jobs_are_immutable() {
        let mut job = job(1, 1);
        job.cancel("operator request").unwrap();
        assert!(job.record_progress(1, Utc::now()).is_err());
        assert!(job.record_failure("x", true, Utc::now()).is_err());
        assert!(job.cancel("again").is_err());
        assert_eq!(job.uploaded_products(), 0);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [JobStatus::Scheduled, JobStatus::Succeeded, JobStatus::Failed] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("running".parse::<JobStatus>().is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Tick {
            Progress(usize),
            Failure(bool),
            Cancel,
        }

        fn tick() -> impl Strategy<Value = Tick> {
            prop_oneof![
                (0usize..40).prop_map(Tick::Progress),
                any::<bool>().prop_map(Tick::Failure),
                Just(Tick::Cancel),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig { cases: 128, ..ProptestConfig::default() })]

            #[test]
            fn counter_never_decreases_or_overflows(
                count in 1usize..60,
                batch in 1usize..25,
                ticks in proptest::collection::vec(tick(), 0..30),
            ) {
                let mut job = job(count, batch);
                let mut previous = 0;
                for t in ticks {
                    let _ = match t {
                        Tick::Progress(n) => job.record_progress(n, Utc::now()).map(|_| ()),
                        Tick::Failure(retriable) => job.record_failure("boom", retriable, Utc::now()),
                        Tick::Cancel => job.cancel("stop"),
                    };
                    prop_assert!(job.uploaded_products() >= previous);
                    prop_assert!(job.uploaded_products() <= job.total());
                    prop_assert!(job.next_slice().len() <= batch);
                    previous = job.uploaded_products();
                }
            }
        }
    }
}
