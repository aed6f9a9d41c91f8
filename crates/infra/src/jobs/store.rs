//! Job storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use storefront_core::{JobId, ShopId};

use super::types::{JobStatus, PublishJob};

/// Persistence for publish jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a new job.
    async fn insert(&self, job: &PublishJob) -> Result<(), JobStoreError>;

    async fn get(&self, job_id: JobId) -> Result<Option<PublishJob>, JobStoreError>;

    /// Replace a stored job.
    async fn update(&self, job: &PublishJob) -> Result<(), JobStoreError>;

    /// Scheduled jobs whose backoff has elapsed at `now`, oldest first.
    async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<PublishJob>, JobStoreError>;

    /// Non-terminal jobs of a shop, oldest first.
    async fn open_for_shop(&self, shop_id: ShopId) -> Result<Vec<PublishJob>, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// In-memory job store for tests/dev.
#[derive(Debug)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, PublishJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &PublishJob) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, job_id: JobId) -> Result<Option<PublishJob>, JobStoreError> {
        Ok(self.jobs.read().unwrap().get(&job_id).cloned())
    }

    async fn update(&self, job: &PublishJob) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(JobStoreError::NotFound(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<PublishJob>, JobStoreError> {
        let jobs = self.jobs.read().unwrap();
        let mut result: Vec<_> = jobs.values().filter(|j| j.is_due(now)).cloned().collect();

        // FIFO
        result.sort_by_key(|j| j.created_at);
        result.truncate(limit);
        Ok(result)
    }

    async fn open_for_shop(&self, shop_id: ShopId) -> Result<Vec<PublishJob>, JobStoreError> {
        let jobs = self.jobs.read().unwrap();
        let mut result: Vec<_> = jobs
            .values()
            .filter(|j| j.shop_id == shop_id && j.status() == JobStatus::Scheduled)
            .cloned()
            .collect();
        result.sort_by_key(|j| j.created_at);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::ProductId;

    fn job(shop_id: ShopId) -> PublishJob {
        PublishJob::new(shop_id, vec![ProductId::new(), ProductId::new()], 1).unwrap()
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemoryJobStore::new();
        let job = job(ShopId::new());

        store.insert(&job).await.unwrap();

        assert_eq!(store.get(job.id).await.unwrap(), Some(job.clone()));
        assert!(matches!(
            store.insert(&job).await,
            Err(JobStoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn update_requires_existing_job() {
        let store = InMemoryJobStore::new();
        let job = job(ShopId::new());
        assert!(matches!(store.update(&job).await, Err(JobStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn due_skips_backoff_and_terminal_jobs() {
        let store = InMemoryJobStore::new();
        let shop = ShopId::new();

        let ready = job(shop);
        let mut waiting = job(shop);
        waiting.record_failure("timeout", true, Utc::now()).unwrap();
        let mut done = job(shop);
        done.cancel("stop").unwrap();

        for j in [&ready, &waiting, &done] {
            store.insert(j).await.unwrap();
        }

        let due = store.due(Utc::now(), 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, ready.id);

        let later = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(store.due(later, 10).await.unwrap().len(), 2);
        assert_eq!(store.open_for_shop(shop).await.unwrap().len(), 2);
        assert!(store.open_for_shop(ShopId::new()).await.unwrap().is_empty());
    }
}
