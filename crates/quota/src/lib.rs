//! # Alexandria Quota
//!
//! Daily call-quota management for rate-limited providers (ISBNdb foremost),
//! fail-closed on any KV error, with a soft circuit-breaker style admission
//! check layered on top of the hard daily ceiling (spec §4.4, §5). Grounded
//! on the teacher's `CircuitBreakerManager` state machine
//! (`api::circuit_breaker`) — same closed/open vocabulary, generalized from
//! a per-service failure-rate breaker into a per-provider daily-budget
//! breaker backed by `alexandria-kv` instead of an in-process `RwLock` map.

use std::sync::Arc;

use alexandria_kv::{KvStore, Namespace};
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("kv store error: {0}")]
    Kv(#[from] alexandria_kv::KvError),
}

pub type Result<T> = std::result::Result<T, QuotaError>;

/// Outcome of a quota admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Under the daily limit minus the safety buffer; proceed.
    Allowed,
    /// At or above `daily_limit - safety_buffer`; provider calls are
    /// suspended for the rest of the UTC day (spec §4.4's "circuit-breaker
    /// threshold").
    Suspended,
}

/// Operation-level policy overlay on top of the per-call `should_allow`
/// ceiling (spec §4.4 `ShouldAllowOperation`): some call patterns warrant a
/// stricter check than "is there room for one more call".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// A scheduled job about to place `n` calls with nothing able to
    /// intervene mid-run if quota runs dry partway through, so it needs
    /// double its call count in remaining buffer up front.
    Cron,
    /// A bulk author-enrichment request for `n` authors, capped at 100
    /// regardless of remaining quota so one oversized request can't
    /// monopolize a day's budget.
    BulkAuthor,
}

/// Current state of one provider's daily quota.
#[derive(Debug, Clone)]
pub struct QuotaStatus {
    pub provider: String,
    pub date: String,
    pub calls_made: i64,
    pub daily_limit: u32,
    pub safety_buffer: u32,
    pub admission: Admission,
}

fn today_utc() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn quota_key(provider: &str, date: &str) -> String {
    format!("{provider}:{date}")
}

/// Per-provider daily quota manager. Every check reads the current UTC date
/// so a process that stays up past midnight rolls over to a fresh counter
/// without an explicit reset job (spec §4.4 "EnsureDailyReset").
pub struct QuotaManager<K: KvStore> {
    kv: Arc<K>,
    daily_limit: u32,
    safety_buffer: u32,
}

impl<K: KvStore> QuotaManager<K> {
    pub fn new(kv: Arc<K>, daily_limit: u32, safety_buffer: u32) -> Self {
        Self {
            kv,
            daily_limit,
            safety_buffer,
        }
    }

    /// Admission threshold: the highest call count still allowed to proceed.
    fn ceiling(&self) -> i64 {
        (self.daily_limit.saturating_sub(self.safety_buffer)) as i64
    }

    /// Decide whether `provider` may place one more call today. Fail-closed:
    /// any KV error is treated as `Suspended` rather than propagated as an
    /// unconditional allow, so a Redis outage never lets calls blow through
    /// an external provider's hard daily cap.
    pub async fn should_allow(&self, provider: &str) -> Admission {
        match self.calls_made_today(provider).await {
            Ok(calls) if calls < self.ceiling() => Admission::Allowed,
            Ok(_) => Admission::Suspended,
            Err(_) => Admission::Suspended,
        }
    }

    /// Operation-level admission check (spec §4.4 `ShouldAllowOperation`):
    /// `OperationKind::BulkAuthor` rejects outright once `n > 100`; both
    /// kinds additionally require `buffer_remaining` (calls left before the
    /// per-call ceiling) to cover `n` calls, doubled for `Cron` since a
    /// scheduled run can't pause partway through to re-check quota.
    pub async fn should_allow_operation(&self, provider: &str, kind: OperationKind, n: u32) -> Result<Admission> {
        if matches!(kind, OperationKind::BulkAuthor) && n > 100 {
            return Ok(Admission::Suspended);
        }

        let calls_made = self.calls_made_today(provider).await?;
        let buffer_remaining = (self.ceiling() - calls_made).max(0);
        let required = match kind {
            OperationKind::Cron => 2 * n as i64,
            OperationKind::BulkAuthor => n as i64,
        };

        Ok(if buffer_remaining >= required {
            Admission::Allowed
        } else {
            Admission::Suspended
        })
    }

    async fn calls_made_today(&self, provider: &str) -> Result<i64> {
        let date = today_utc();
        let key = quota_key(provider, &date);
        match self.kv.get(Namespace::QuotaKv, &key).await? {
            Some(raw) => Ok(raw.parse().unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Record one successful call against today's counter, creating it with
    /// a 25-hour TTL (covers clock skew across the UTC day boundary) if this
    /// is the first call of the day.
    pub async fn record_call(&self, provider: &str) -> Result<i64> {
        let date = today_utc();
        let key = quota_key(provider, &date);
        let new_count = self.kv.incr_by(Namespace::QuotaKv, &key, 1).await?;
        if new_count == 1 {
            self.kv
                .expire(Namespace::QuotaKv, &key, std::time::Duration::from_secs(25 * 3600))
                .await?;
        }
        Ok(new_count)
    }

    pub async fn status(&self, provider: &str) -> Result<QuotaStatus> {
        let date = today_utc();
        let calls_made = self.calls_made_today(provider).await?;
        let admission = if calls_made < self.ceiling() {
            Admission::Allowed
        } else {
            Admission::Suspended
        };
        Ok(QuotaStatus {
            provider: provider.to_string(),
            date,
            calls_made,
            daily_limit: self.daily_limit,
            safety_buffer: self.safety_buffer,
            admission,
        })
    }
}

/// Object-safe façade over `QuotaManager<K>` so callers holding a
/// `dyn QuotaGate` don't need to know the concrete `KvStore` type.
#[async_trait]
pub trait QuotaGate: Send + Sync {
    async fn should_allow(&self, provider: &str) -> Admission;
    async fn record_call(&self, provider: &str) -> Result<i64>;

    /// Full status, including the usage percentage consumers need for
    /// soft thresholds below the hard admission ceiling (spec §4.3.3's
    /// 70%/85% author-queue circuit breaker sits below `should_allow`'s
    /// own suspend point, so it needs the raw numbers, not just the
    /// allow/suspend verdict).
    async fn status(&self, provider: &str) -> Result<QuotaStatus>;

    /// Operation-level overlay (spec §4.4 `ShouldAllowOperation`) for
    /// callers that need a stricter admission check than one-call-at-a-time
    /// `should_allow`: cron jobs and bulk author requests.
    async fn should_allow_operation(&self, provider: &str, kind: OperationKind, n: u32) -> Result<Admission>;
}

#[async_trait]
impl<K: KvStore + Send + Sync> QuotaGate for QuotaManager<K> {
    async fn should_allow(&self, provider: &str) -> Admission {
        QuotaManager::should_allow(self, provider).await
    }

    async fn record_call(&self, provider: &str) -> Result<i64> {
        QuotaManager::record_call(self, provider).await
    }

    async fn status(&self, provider: &str) -> Result<QuotaStatus> {
        QuotaManager::status(self, provider).await
    }

    async fn should_allow_operation(&self, provider: &str, kind: OperationKind, n: u32) -> Result<Admission> {
        QuotaManager::should_allow_operation(self, provider, kind, n).await
    }
}

impl QuotaStatus {
    /// Fraction of the daily limit consumed so far, in `[0.0, ~1.0+]`.
    /// Used by the author consumer's circuit breaker (spec §4.3.3) rather
    /// than the hard `admission` verdict, since the breaker's thresholds
    /// sit below the safety-buffer ceiling.
    pub fn usage_fraction(&self) -> f64 {
        if self.daily_limit == 0 {
            return 1.0;
        }
        self.calls_made as f64 / self.daily_limit as f64
    }
}
