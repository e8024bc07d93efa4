//! # Alexandria Locks
//!
//! Postgres session-scoped advisory locks guarding backfill generation for a
//! given (year, month) pair against duplicate concurrent runs (spec §5).
//! Grounded on the teacher's repository-trait-plus-`PgPool`-impl shape
//! (`ingestion::repository::{ContentRepository, PostgresContentRepository}`),
//! generalized from a content upsert repository into a lock manager.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("invalid year/month ({year}, {month}): {reason}")]
    InvalidYearMonth {
        year: i32,
        month: i32,
        reason: &'static str,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, LockError>;

/// Deterministic advisory lock key for a (year, month) pair: `year * 100 + month`.
/// Validated so it never collides with an unrelated key space in the same
/// Postgres instance (year must be in 1900..=2099, month must be 1..=12).
pub fn month_lock_key(year: i32, month: i32) -> Result<i64> {
    if !(1..=12).contains(&month) {
        return Err(LockError::InvalidYearMonth {
            year,
            month,
            reason: "month must be in 1..=12",
        });
    }
    if !(1900..=2099).contains(&year) {
        return Err(LockError::InvalidYearMonth {
            year,
            month,
            reason: "year must be in 1900..=2099",
        });
    }
    Ok((year as i64) * 100 + month as i64)
}

/// Month-scoped advisory locking for the backfill pipeline.
#[async_trait]
pub trait MonthLock: Send + Sync {
    /// Attempt to acquire the lock for (year, month) without blocking.
    /// Returns `false` if another session already holds it.
    async fn acquire(&self, year: i32, month: i32) -> Result<bool>;

    /// Release a previously acquired lock. A no-op (returns `false`) if the
    /// calling session does not hold it.
    async fn release(&self, year: i32, month: i32) -> Result<bool>;

    /// Whether the (year, month) lock is currently held by any session.
    async fn is_locked(&self, year: i32, month: i32) -> Result<bool>;
}

/// Postgres-backed `MonthLock` using session-level `pg_try_advisory_lock`.
/// Callers must hold the connection used to acquire the lock open until
/// `release` is called on that same connection — `with_lock` enforces this
/// by running the protected closure on one checked-out connection.
pub struct PostgresMonthLock {
    pool: PgPool,
}

impl PostgresMonthLock {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run `f` only if the (year, month) lock can be acquired; always
    /// releases it afterward, success or failure. Returns `None` if the
    /// lock was already held elsewhere.
    pub async fn with_lock<F, Fut, T>(&self, year: i32, month: i32, f: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = T> + Send,
    {
        let key = month_lock_key(year, month)?;
        let mut conn = self.pool.acquire().await?;

        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;

        if !acquired {
            return Ok(None);
        }

        let result = f().await;

        let _: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;

        Ok(Some(result))
    }
}

#[async_trait]
impl MonthLock for PostgresMonthLock {
    async fn acquire(&self, year: i32, month: i32) -> Result<bool> {
        let key = month_lock_key(year, month)?;
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(acquired)
    }

    async fn release(&self, year: i32, month: i32) -> Result<bool> {
        let key = month_lock_key(year, month)?;
        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(released)
    }

    async fn is_locked(&self, year: i32, month: i32) -> Result<bool> {
        let key = month_lock_key(year, month)?;
        let held: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM pg_locks WHERE locktype = 'advisory' AND objid = $1::int AND granted)",
        )
        .bind(key as i32)
        .fetch_one(&self.pool)
        .await?;
        Ok(held)
    }
}
