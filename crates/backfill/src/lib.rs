//! # Alexandria Backfill
//!
//! The pull-path AI-generated candidate pipeline (spec §4.3.4, §4.5, §4.6):
//! AI book-list generation, ISBN resolution via the providers crate's
//! 5-tier cascade, immediate synthetic persistence, batched fan-out to the
//! push path, and the deferred-enhancement pass that promotes synthetic
//! records once resolution later succeeds.

pub mod backfill_log;
pub mod error;
pub mod generation;
pub mod job_status;
pub mod orchestrator;
pub mod prompts;
pub mod synthetic;

use async_trait::async_trait;

pub use backfill_log::{BackfillLogStore, PostgresBackfillLogStore};
pub use error::{BackfillError, Result};
pub use job_status::{BackfillJobStatus, BackfillStats, JobState, JobStatusStore, KvJobStatusStore};
pub use orchestrator::{BackfillOrchestrator, BackfillRequest};
pub use synthetic::{synthetic_work_key, PostgresSyntheticStore, SyntheticStore};

/// The push path's enqueue surface, as seen from the backfill pipeline
/// (spec §4.3.4 step 6, §4.6 deferred enhancement): hand a resolved ISBN to
/// the enrichment queue. Implemented by `alexandria-consumers` over its
/// concrete queue producer; kept as a trait here so this crate never
/// depends on a queue client directly.
#[async_trait]
pub trait EnrichmentEnqueuer: Send + Sync {
    /// Enqueue a single ISBN, returning whether the enqueue succeeded.
    async fn enqueue(&self, isbn: &str, source: &str) -> bool;

    /// Enqueue a batch of ISBNs under one `source` tag, returning how many
    /// succeeded. Default: one `enqueue` call per ISBN; a queue client with
    /// real batch support overrides this for fewer round trips.
    async fn enqueue_batch(&self, isbns: &[String], source: &str) -> usize {
        let mut count = 0;
        for isbn in isbns {
            if self.enqueue(isbn, source).await {
                count += 1;
            }
        }
        count
    }
}
