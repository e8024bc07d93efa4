//! The durable `backfill_log` row (spec §4.3.4, §6): one row per
//! `(year, month)`, `UNIQUE` on that pair, written before generation starts
//! and updated to `completed`/`failed` at the end. This is the durable
//! record a UI/analytics consumer can query after the ephemeral
//! `BackfillJobStatus` KV entry has expired; the two serve different
//! audiences but track the same job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillLogStatus {
    Processing,
    Completed,
    Failed,
}

impl BackfillLogStatus {
    fn as_str(&self) -> &'static str {
        match self {
            BackfillLogStatus::Processing => "processing",
            BackfillLogStatus::Completed => "completed",
            BackfillLogStatus::Failed => "failed",
        }
    }
}

#[async_trait]
pub trait BackfillLogStore: Send + Sync {
    /// Create or update the `(year, month)` row to `processing` (spec
    /// §4.3.4 step 1: "write backfill_log row with ON CONFLICT update").
    async fn mark_processing(&self, year: i32, month: i32, job_id: &str) -> Result<()>;

    /// Mark the row `completed`, recording final counts.
    async fn mark_completed(&self, year: i32, month: i32, isbns_resolved: u32, isbns_queued: u32) -> Result<()>;

    /// Mark the row `failed` with an error message.
    async fn mark_failed(&self, year: i32, month: i32, error: &str) -> Result<()>;
}

pub struct PostgresBackfillLogStore {
    pool: PgPool,
}

impl PostgresBackfillLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BackfillLogStore for PostgresBackfillLogStore {
    async fn mark_processing(&self, year: i32, month: i32, job_id: &str) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO backfill_log (year, month, job_id, status, isbns_resolved, isbns_queued, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 0, 0, $5, $5)
            ON CONFLICT (year, month) DO UPDATE SET
                job_id = EXCLUDED.job_id,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(year)
        .bind(month)
        .bind(job_id)
        .bind(BackfillLogStatus::Processing.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_completed(&self, year: i32, month: i32, isbns_resolved: u32, isbns_queued: u32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE backfill_log
            SET status = $3, isbns_resolved = $4, isbns_queued = $5, updated_at = NOW()
            WHERE year = $1 AND month = $2
            "#,
        )
        .bind(year)
        .bind(month)
        .bind(BackfillLogStatus::Completed.as_str())
        .bind(isbns_resolved as i32)
        .bind(isbns_queued as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, year: i32, month: i32, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE backfill_log
            SET status = $3, error = $4, updated_at = NOW()
            WHERE year = $1 AND month = $2
            "#,
        )
        .bind(year)
        .bind(month)
        .bind(BackfillLogStatus::Failed.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
