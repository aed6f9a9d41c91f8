//! Postgres-backed job store.
//!
//! One row per job in `publish_jobs`. The product snapshot, retry policy and
//! attempt history are stored as `jsonb`; everything the worker filters on is
//! a plain column.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | JobStoreError |
//! |------------|----------------------|---------------|
//! | Database (unique violation on insert) | `23505` | `AlreadyExists` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed | N/A | `Storage` |
//! | Other | N/A | `Storage` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use storefront_core::{JobId, ProductId, ShopId};

use super::store::{JobStore, JobStoreError};
use super::types::{JobAttemptRecord, JobStatus, PublishJob, RetryPolicy};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS publish_jobs (
    id UUID PRIMARY KEY,
    shop_id UUID NOT NULL,
    batch_size INTEGER NOT NULL CHECK (batch_size > 0),
    product_ids JSONB NOT NULL,
    uploaded_products INTEGER NOT NULL DEFAULT 0 CHECK (uploaded_products >= 0),
    status TEXT NOT NULL,
    last_run_time TIMESTAMPTZ,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    next_run_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL,
    retry_policy JSONB NOT NULL,
    history JSONB NOT NULL DEFAULT '[]'::jsonb
)
"#;

const CREATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS publish_jobs_due_idx
    ON publish_jobs (status, next_run_at, created_at)
"#;

const SELECT_COLUMNS: &str = r#"
    SELECT id, shop_id, batch_size, product_ids, uploaded_products, status,
           last_run_time, attempts, last_error, next_run_at, created_at,
           retry_policy, history
    FROM publish_jobs
"#;

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect to `database_url` and make sure the table exists.
    pub async fn connect(database_url: &str) -> Result<Self, JobStoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Create the job table and its index if missing.
    pub async fn migrate(&self) -> Result<(), JobStoreError> {
        for statement in [CREATE_TABLE, CREATE_INDEX] {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    async fn fetch(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<PublishJob>, JobStoreError> {
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter()
            .map(|row| {
                JobRow::from_row(row)
                    .map_err(|e| JobStoreError::Storage(format!("failed to read job row: {e}")))
                    .and_then(PublishJob::try_from)
            })
            .collect()
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip_all, fields(job_id = %job.id, shop_id = %job.shop_id), err)]
    async fn insert(&self, job: &PublishJob) -> Result<(), JobStoreError> {
        let json = JobJson::encode(job)?;
        sqlx::query(
            r#"
            INSERT INTO publish_jobs (
                id, shop_id, batch_size, product_ids, uploaded_products, status,
                last_run_time, attempts, last_error, next_run_at, created_at,
                retry_policy, history
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.shop_id.as_uuid())
        .bind(job.batch_size as i32)
        .bind(json.product_ids)
        .bind(job.uploaded_products() as i32)
        .bind(job.status().as_str())
        .bind(job.last_run_time)
        .bind(job.attempts as i32)
        .bind(&job.last_error)
        .bind(job.next_run_at)
        .bind(job.created_at)
        .bind(json.retry_policy)
        .bind(json.history)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                JobStoreError::AlreadyExists(job.id)
            } else {
                map_sqlx_error("insert_job", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn get(&self, job_id: JobId) -> Result<Option<PublishJob>, JobStoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = $1");
        let mut jobs = self
            .fetch("get_job", sqlx::query(&sql).bind(job_id.as_uuid()))
            .await?;
        Ok(jobs.pop())
    }

    #[instrument(skip_all, fields(job_id = %job.id, status = %job.status()), err)]
    async fn update(&self, job: &PublishJob) -> Result<(), JobStoreError> {
        let json = JobJson::encode(job)?;
        let result = sqlx::query(
            r#"
            UPDATE publish_jobs SET
                batch_size = $2,
                uploaded_products = $3,
                status = $4,
                last_run_time = $5,
                attempts = $6,
                last_error = $7,
                next_run_at = $8,
                retry_policy = $9,
                history = $10
            WHERE id = $1
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.batch_size as i32)
        .bind(job.uploaded_products() as i32)
        .bind(job.status().as_str())
        .bind(job.last_run_time)
        .bind(job.attempts as i32)
        .bind(&job.last_error)
        .bind(job.next_run_at)
        .bind(json.retry_policy)
        .bind(json.history)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_job", e))?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(job.id));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<PublishJob>, JobStoreError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE status = $1 AND (next_run_at IS NULL OR next_run_at <= $2) \
             ORDER BY created_at ASC LIMIT $3"
        );
        self.fetch(
            "due_jobs",
            sqlx::query(&sql)
                .bind(JobStatus::Scheduled.as_str())
                .bind(now)
                .bind(limit as i64),
        )
        .await
    }

    #[instrument(skip(self), fields(shop_id = %shop_id), err)]
    async fn open_for_shop(&self, shop_id: ShopId) -> Result<Vec<PublishJob>, JobStoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE shop_id = $1 AND status = $2 ORDER BY created_at ASC");
        self.fetch(
            "open_jobs_for_shop",
            sqlx::query(&sql)
                .bind(shop_id.as_uuid())
                .bind(JobStatus::Scheduled.as_str()),
        )
        .await
    }
}

/// The jsonb columns of a job.
struct JobJson {
    product_ids: serde_json::Value,
    retry_policy: serde_json::Value,
    history: serde_json::Value,
}

impl JobJson {
    fn encode(job: &PublishJob) -> Result<Self, JobStoreError> {
        let encode = |what: &str, value: Result<serde_json::Value, serde_json::Error>| {
            value.map_err(|e| JobStoreError::Storage(format!("failed to encode {what}: {e}")))
        };
        Ok(Self {
            product_ids: encode("product ids", serde_json::to_value(&job.product_ids))?,
            retry_policy: encode("retry policy", serde_json::to_value(&job.retry_policy))?,
            history: encode("history", serde_json::to_value(&job.history))?,
        })
    }
}

struct JobRow {
    id: uuid::Uuid,
    shop_id: uuid::Uuid,
    batch_size: i32,
    product_ids: serde_json::Value,
    uploaded_products: i32,
    status: String,
    last_run_time: Option<DateTime<Utc>>,
    attempts: i32,
    last_error: Option<String>,
    next_run_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    retry_policy: serde_json::Value,
    history: serde_json::Value,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for JobRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            id: row.try_get("id")?,
            shop_id: row.try_get("shop_id")?,
            batch_size: row.try_get("batch_size")?,
            product_ids: row.try_get("product_ids")?,
            uploaded_products: row.try_get("uploaded_products")?,
            status: row.try_get("status")?,
            last_run_time: row.try_get("last_run_time")?,
            attempts: row.try_get("attempts")?,
            last_error: row.try_get("last_error")?,
            next_run_at: row.try_get("next_run_at")?,
            created_at: row.try_get("created_at")?,
            retry_policy: row.try_get("retry_policy")?,
            history: row.try_get("history")?,
        })
    }
}

impl TryFrom<JobRow> for PublishJob {
    type Error = JobStoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let decode_err = |what: &str, e: serde_json::Error| {
            JobStoreError::Storage(format!("job {}: invalid {what}: {e}", row.id))
        };
        let product_ids: Vec<ProductId> =
            serde_json::from_value(row.product_ids.clone()).map_err(|e| decode_err("product_ids", e))?;
        let retry_policy: RetryPolicy =
            serde_json::from_value(row.retry_policy.clone()).map_err(|e| decode_err("retry_policy", e))?;
        let history: Vec<JobAttemptRecord> =
            serde_json::from_value(row.history.clone()).map_err(|e| decode_err("history", e))?;
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|e| JobStoreError::Storage(format!("job {}: {e}", row.id)))?;

        let mut job = PublishJob::restore(
            JobId::from_uuid(row.id),
            ShopId::from_uuid(row.shop_id),
            row.batch_size.max(1) as usize,
            product_ids,
            row.uploaded_products.max(0) as usize,
            status,
            row.created_at,
            retry_policy,
        );
        job.last_run_time = row.last_run_time;
        job.attempts = row.attempts.max(0) as u32;
        job.last_error = row.last_error;
        job.next_run_at = row.next_run_at;
        job.history = history;
        Ok(job)
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            JobStoreError::Storage(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => JobStoreError::Storage(format!("connection pool closed in {operation}")),
        _ => JobStoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
