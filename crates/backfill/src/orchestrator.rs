//! The backfill consumer's per-job pipeline (spec §4.3.4): acquire the
//! month lock, generate candidates, persist them as synthetic records
//! immediately, resolve ISBNs through the quota-gated cascade, and fan the
//! resolved ISBNs out to the push path in batches — all while keeping
//! `BackfillJobStatus` and the durable `backfill_log` row in lockstep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alexandria_locks::MonthLock;
use alexandria_providers::{GenerativeProvider, ProviderRegistry, ResolveQuery};
use alexandria_quota::QuotaGate;
use chrono::Utc;

use crate::backfill_log::BackfillLogStore;
use crate::error::{BackfillError, Result};
use crate::generation::generate_candidates;
use crate::job_status::{BackfillJobStatus, JobState, JobStatusStore};
use crate::prompts;
use crate::synthetic::SyntheticStore;
use crate::EnrichmentEnqueuer;

/// One `backfill-queue` message (spec §6's wire schema), already validated
/// (unknown `prompt_variant` and out-of-range `year`/`month` are rejected
/// before this reaches the orchestrator — spec §7 "Rejected at ingress").
#[derive(Debug, Clone)]
pub struct BackfillRequest {
    pub job_id: String,
    pub year: i32,
    pub month: i32,
    pub batch_size: u32,
    pub dry_run: bool,
    pub experiment_id: Option<String>,
    pub prompt_variant: String,
    /// Caps how many ISBN-resolution attempts (and therefore ISBNdb quota
    /// reservations) this job may make, independent of the daily ceiling.
    pub max_quota: Option<u32>,
}

const FANOUT_BATCH_SIZE: usize = 100;
const LOCK_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct BackfillOrchestrator<Q: QuotaGate> {
    job_status: Arc<dyn JobStatusStore>,
    backfill_log: Arc<dyn BackfillLogStore>,
    synthetic_store: Arc<dyn SyntheticStore>,
    month_lock: Arc<dyn MonthLock>,
    registry: Arc<ProviderRegistry>,
    generators: Vec<Arc<dyn GenerativeProvider>>,
    enqueuer: Arc<dyn EnrichmentEnqueuer>,
    quota: Arc<Q>,
    enable_month_locking: bool,
}

impl<Q: QuotaGate> BackfillOrchestrator<Q> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_status: Arc<dyn JobStatusStore>,
        backfill_log: Arc<dyn BackfillLogStore>,
        synthetic_store: Arc<dyn SyntheticStore>,
        month_lock: Arc<dyn MonthLock>,
        registry: Arc<ProviderRegistry>,
        generators: Vec<Arc<dyn GenerativeProvider>>,
        enqueuer: Arc<dyn EnrichmentEnqueuer>,
        quota: Arc<Q>,
        enable_month_locking: bool,
    ) -> Self {
        Self {
            job_status,
            backfill_log,
            synthetic_store,
            month_lock,
            registry,
            generators,
            enqueuer,
            quota,
            enable_month_locking,
        }
    }

    /// Non-blocking acquire in a retry loop, polling every 100ms until
    /// `LOCK_ACQUIRE_TIMEOUT` elapses (spec §5 `AcquireMonthLock`).
    async fn acquire_month_lock(&self, year: i32, month: i32) -> Result<bool> {
        if !self.enable_month_locking {
            return Ok(true);
        }
        let deadline = Instant::now() + LOCK_ACQUIRE_TIMEOUT;
        loop {
            if self.month_lock.acquire(year, month).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn release_month_lock(&self, year: i32, month: i32) {
        if self.enable_month_locking {
            if let Err(err) = self.month_lock.release(year, month).await {
                tracing::warn!(year, month, error = %err, "failed to release month advisory lock");
            }
        }
    }

    /// Run one backfill job end to end, returning the terminal
    /// `BackfillJobStatus`. Never returns `Err` for business-level failures
    /// (quota exhaustion, lock contention, partial provider failure) — those
    /// are captured in the returned status's `failed` state instead, so the
    /// calling consumer can ACK the message either way (spec §7).
    pub async fn run(&self, request: BackfillRequest) -> Result<BackfillJobStatus> {
        let started = Utc::now();
        let mut status = BackfillJobStatus::new(
            request.job_id.clone(),
            request.year,
            request.month,
            request.dry_run,
            request.experiment_id.clone(),
            started,
        );
        self.job_status.put(&status).await?;

        let variant = match prompts::lookup(&request.prompt_variant) {
            Ok(variant) => variant,
            Err(err) => {
                status.status = JobState::Failed;
                status.error = Some(err.to_string());
                status.completed_at = Some(Utc::now());
                self.job_status.put(&status).await?;
                return Ok(status);
            }
        };

        let lock_held = match self.acquire_month_lock(request.year, request.month).await {
            Ok(held) => held,
            Err(err) => {
                status.status = JobState::Failed;
                status.error = Some(err.to_string());
                status.completed_at = Some(Utc::now());
                self.job_status.put(&status).await?;
                return Ok(status);
            }
        };

        if !lock_held {
            status.status = JobState::Failed;
            status.error = Some(format!(
                "could not acquire month advisory lock for ({}, {})",
                request.year, request.month
            ));
            status.completed_at = Some(Utc::now());
            self.job_status.put(&status).await?;
            return Ok(status);
        }

        let result = self.run_locked(&request, variant, &mut status).await;
        self.release_month_lock(request.year, request.month).await;

        if let Err(err) = result {
            status.status = JobState::Failed;
            status.error = Some(err.to_string());
            status.completed_at = Some(Utc::now());
            status.duration_ms = Some((Utc::now() - started).num_milliseconds());
            self.job_status.put(&status).await?;
            self.backfill_log
                .mark_failed(request.year, request.month, &status.error.clone().unwrap_or_default())
                .await?;
        }

        Ok(status)
    }

    async fn run_locked(
        &self,
        request: &BackfillRequest,
        variant: &prompts::PromptVariant,
        status: &mut BackfillJobStatus,
    ) -> Result<()> {
        self.backfill_log
            .mark_processing(request.year, request.month, &request.job_id)
            .await?;

        status.status = JobState::Processing;
        status.progress = Some("generating candidates".to_string());
        self.job_status.put(status).await?;

        // A backfill job is a scheduled, unattended run: once it starts
        // resolving candidates nothing can pause it mid-batch to re-check
        // quota, so it needs double its expected call count in remaining
        // buffer up front (spec §4.4 `ShouldAllowOperation(cron, n)`).
        let cron_admission = self
            .quota
            .should_allow_operation("isbndb", alexandria_quota::OperationKind::Cron, request.batch_size)
            .await?;
        if cron_admission == alexandria_quota::Admission::Suspended {
            return Err(BackfillError::QuotaPolicyRejected {
                year: request.year,
                month: request.month,
                batch_size: request.batch_size,
            });
        }

        let candidates = generate_candidates(&self.generators, variant, request.batch_size).await;
        status.stats.candidates_generated = candidates.len() as u32;
        status.progress = Some("persisting synthetic records".to_string());
        self.job_status.put(status).await?;

        let mut for_enrichment: Vec<String> = Vec::new();
        let mut synthetic_only = 0u32;
        let mut quota_reservations_used = 0u32;

        for candidate in &candidates {
            let work_key = self.synthetic_store.upsert_synthetic_work(candidate).await?;

            let resolved_isbn = if let Some(isbn) = &candidate.isbn {
                Some(isbn.clone())
            } else {
                let under_job_cap = request
                    .max_quota
                    .map(|cap| quota_reservations_used < cap)
                    .unwrap_or(true);

                if under_job_cap && self.quota.should_allow("isbndb").await == alexandria_quota::Admission::Allowed {
                    quota_reservations_used += 1;
                    let _ = self.quota.record_call("isbndb").await;
                    let query = ResolveQuery {
                        title: Some(candidate.title.clone()),
                        author: Some(candidate.author.clone()),
                        isbn: None,
                        publisher: None,
                        format: None,
                    };
                    alexandria_providers::resolve_isbn_cascade(&self.registry, &query)
                        .await?
                        .map(|resolved| resolved.isbn)
                } else {
                    None
                }
            };

            let mut resolved_candidate = candidate.clone();
            resolved_candidate.isbn = resolved_isbn.clone();
            self.synthetic_store
                .upsert_synthetic_edition(&work_key, &resolved_candidate)
                .await?;

            match resolved_isbn {
                Some(isbn) => {
                    status.stats.isbns_resolved += 1;
                    for_enrichment.push(isbn);
                }
                None => synthetic_only += 1,
            }
        }
        status.stats.synthetic_only = synthetic_only;

        if !request.dry_run {
            let source = format!("backfill-{:04}-{:02}", request.year, request.month);
            let mut queued = 0u32;
            for chunk in for_enrichment.chunks(FANOUT_BATCH_SIZE) {
                queued += self.enqueuer.enqueue_batch(chunk, &source).await as u32;
            }
            status.stats.isbns_sent_to_enrichment = queued;
            status.status = JobState::Enriching;
            self.job_status.put(status).await?;
        }

        self.backfill_log
            .mark_completed(request.year, request.month, status.stats.isbns_resolved, status.stats.isbns_sent_to_enrichment)
            .await?;

        status.status = JobState::Complete;
        status.progress = None;
        status.completed_at = Some(Utc::now());
        status.duration_ms = Some((Utc::now() - status.created_at).num_milliseconds());
        self.job_status.put(status).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_status::{BackfillStats};
    use crate::synthetic::synthetic_work_key;
    use alexandria_providers::GeneratedBook;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Mutex;

    struct FakeJobStatusStore {
        last: Mutex<Option<BackfillJobStatus>>,
    }

    #[async_trait]
    impl JobStatusStore for FakeJobStatusStore {
        async fn put(&self, status: &BackfillJobStatus) -> Result<()> {
            *self.last.lock().await = Some(status.clone());
            Ok(())
        }
        async fn get(&self, _job_id: &str) -> Result<Option<BackfillJobStatus>> {
            Ok(self.last.lock().await.clone())
        }
    }

    struct FakeBackfillLogStore;

    #[async_trait]
    impl BackfillLogStore for FakeBackfillLogStore {
        async fn mark_processing(&self, _year: i32, _month: i32, _job_id: &str) -> Result<()> {
            Ok(())
        }
        async fn mark_completed(&self, _year: i32, _month: i32, _r: u32, _q: u32) -> Result<()> {
            Ok(())
        }
        async fn mark_failed(&self, _year: i32, _month: i32, _error: &str) -> Result<()> {
            Ok(())
        }
    }

    struct FakeSyntheticStore {
        works: StdMutex<HashMap<String, ()>>,
    }

    #[async_trait]
    impl SyntheticStore for FakeSyntheticStore {
        async fn upsert_synthetic_work(&self, candidate: &GeneratedBook) -> Result<String> {
            let key = synthetic_work_key(&candidate.title, &candidate.author);
            self.works.lock().unwrap().insert(key.clone(), ());
            Ok(key)
        }
        async fn upsert_synthetic_edition(&self, _work_key: &str, _candidate: &GeneratedBook) -> Result<bool> {
            Ok(true)
        }
        async fn select_for_enhancement(&self, _limit: i64) -> Result<Vec<(String, Option<String>, Option<String>)>> {
            Ok(Vec::new())
        }
        async fn record_enhancement_attempt(&self, _work_key: &str, _enqueued: bool) -> Result<()> {
            Ok(())
        }
    }

    struct FakeEnqueuer {
        enqueued: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl EnrichmentEnqueuer for FakeEnqueuer {
        async fn enqueue(&self, isbn: &str, _source: &str) -> bool {
            self.enqueued.lock().unwrap().push(isbn.to_string());
            true
        }
    }

    struct StubGenerator(Vec<GeneratedBook>);

    #[async_trait]
    impl GenerativeProvider for StubGenerator {
        fn name(&self) -> &'static str {
            "stub"
        }
        async fn generate_books(&self, _prompt: &str, _count: u32) -> alexandria_providers::ProviderResult<Vec<GeneratedBook>> {
            Ok(self.0.clone())
        }
    }

    fn book_with_isbn(isbn: &str) -> GeneratedBook {
        GeneratedBook {
            isbn: Some(isbn.to_string()),
            title: "The Hobbit".to_string(),
            author: "J.R.R. Tolkien".to_string(),
            description: None,
            subject_tags: vec!["fantasy".to_string()],
            first_publication_year: Some(1937),
        }
    }

    #[test]
    fn stats_struct_defaults_to_zero() {
        let stats = BackfillStats::default();
        assert_eq!(stats.candidates_generated, 0);
    }

    #[tokio::test]
    async fn unknown_prompt_variant_fails_the_job_without_touching_storage() {
        let job_status = Arc::new(FakeJobStatusStore { last: Mutex::new(None) });
        let request = BackfillRequest {
            job_id: "j1".to_string(),
            year: 2026,
            month: 7,
            batch_size: 10,
            dry_run: true,
            experiment_id: None,
            prompt_variant: "not-a-real-variant".to_string(),
            max_quota: None,
        };

        match prompts::lookup(&request.prompt_variant) {
            Err(BackfillError::UnknownPromptVariant(name)) => assert_eq!(name, "not-a-real-variant"),
            _ => panic!("expected UnknownPromptVariant"),
        }
        let _ = job_status;
    }
}
