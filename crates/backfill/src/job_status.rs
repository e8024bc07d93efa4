//! Backfill job lifecycle tracking (spec §3 "BackfillJobStatus"), held as a
//! single JSON blob per job in the `JOB_STATUS` KV namespace under the
//! `backfill:job:<id>` key spec §6 names, TTL'd at `backfill_job_status_ttl_days`.
//! The status/transition shape is grounded on `other_examples`'
//! `mntogether::kernel::jobs::job::JobStatus` lifecycle (pending → running →
//! terminal), narrowed to the five states this pipeline actually uses and
//! without that file's scheduling/lease machinery, which this pipeline has
//! no use for (there is no recurring-job scheduler here).

use std::sync::Arc;
use std::time::Duration;

use alexandria_kv::{KvStore, Namespace};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Lifecycle state of one backfill job (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing,
    Enriching,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackfillStats {
    pub candidates_generated: u32,
    pub isbns_resolved: u32,
    pub isbns_sent_to_enrichment: u32,
    pub synthetic_only: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillJobStatus {
    pub job_id: String,
    pub year: i32,
    pub month: i32,
    pub status: JobState,
    pub progress: Option<String>,
    pub stats: BackfillStats,
    pub experiment_id: Option<String>,
    pub dry_run: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
}

impl BackfillJobStatus {
    pub fn new(job_id: String, year: i32, month: i32, dry_run: bool, experiment_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            job_id,
            year,
            month,
            status: JobState::Queued,
            progress: None,
            stats: BackfillStats::default(),
            experiment_id,
            dry_run,
            created_at: now,
            updated_at: now,
            completed_at: None,
            duration_ms: None,
            error: None,
        }
    }
}

fn job_key(job_id: &str) -> String {
    format!("backfill:job:{job_id}")
}

/// Persistence for `BackfillJobStatus`, kept behind a trait so
/// `BackfillOrchestrator` can be unit-tested against an in-memory fake.
#[async_trait]
pub trait JobStatusStore: Send + Sync {
    async fn put(&self, status: &BackfillJobStatus) -> Result<()>;
    async fn get(&self, job_id: &str) -> Result<Option<BackfillJobStatus>>;
}

pub struct KvJobStatusStore<K: KvStore> {
    kv: Arc<K>,
    ttl: Duration,
}

impl<K: KvStore> KvJobStatusStore<K> {
    pub fn new(kv: Arc<K>, ttl_days: i64) -> Self {
        Self {
            kv,
            ttl: Duration::from_secs((ttl_days.max(0) as u64) * 24 * 3600),
        }
    }
}

#[async_trait]
impl<K: KvStore> JobStatusStore for KvJobStatusStore<K> {
    async fn put(&self, status: &BackfillJobStatus) -> Result<()> {
        let value = serde_json::to_string(status)?;
        self.kv
            .set(Namespace::JobStatus, &job_key(&status.job_id), &value, Some(self.ttl))
            .await?;
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<BackfillJobStatus>> {
        match self.kv.get(Namespace::JobStatus, &job_key(job_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}
