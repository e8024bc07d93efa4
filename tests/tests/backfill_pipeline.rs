//! `BackfillOrchestrator` (spec §4.3.4, §4.5, §4.6) driven end to end
//! against in-memory fakes: generation → synthetic persistence → ISBN
//! resolution → fan-out to the push path, with the real `QuotaManager`
//! gating resolution attempts.

use std::sync::Arc;

use alexandria_backfill::{BackfillOrchestrator, BackfillRequest, JobState};
use alexandria_providers::{GeneratedBook, ProviderRegistry};
use alexandria_quota::QuotaManager;
use alexandria_tests::fakes::{
    AlwaysFreeMonthLock, FixedGenerator, MemoryKv, RecordingBackfillLogStore, RecordingEnqueuer,
    RecordingJobStatusStore, RecordingSyntheticStore,
};

fn book_with_isbn(title: &str, isbn: &str) -> GeneratedBook {
    GeneratedBook {
        isbn: Some(isbn.to_string()),
        title: title.to_string(),
        author: "Ursula K. Le Guin".to_string(),
        description: Some("A wizard of Earthsea.".to_string()),
        subject_tags: vec!["fantasy".to_string()],
        first_publication_year: Some(1968),
    }
}

fn book_without_isbn(title: &str) -> GeneratedBook {
    GeneratedBook {
        isbn: None,
        title: title.to_string(),
        author: "Ursula K. Le Guin".to_string(),
        description: None,
        subject_tags: vec![],
        first_publication_year: None,
    }
}

fn request(job_id: &str, dry_run: bool) -> BackfillRequest {
    BackfillRequest {
        job_id: job_id.to_string(),
        year: 2026,
        month: 7,
        batch_size: 5,
        dry_run,
        experiment_id: None,
        prompt_variant: "baseline".to_string(),
        max_quota: None,
    }
}

#[tokio::test]
async fn a_candidate_with_an_isbn_already_attached_is_resolved_without_spending_quota() {
    let job_status = Arc::new(RecordingJobStatusStore::default());
    let backfill_log = Arc::new(RecordingBackfillLogStore::default());
    let synthetic_store = Arc::new(RecordingSyntheticStore::default());
    let enqueuer = Arc::new(RecordingEnqueuer::default());
    let quota = Arc::new(QuotaManager::new(Arc::new(MemoryKv::default()), 15_000, 2_000));
    let generator = Arc::new(FixedGenerator {
        books: vec![book_with_isbn("A Wizard of Earthsea", "9780553262506")],
    });
    let registry = Arc::new(ProviderRegistry::new(vec![]));

    let orchestrator = BackfillOrchestrator::new(
        job_status.clone(),
        backfill_log.clone(),
        synthetic_store.clone(),
        Arc::new(AlwaysFreeMonthLock),
        registry,
        vec![generator],
        enqueuer.clone(),
        quota,
        true,
    );

    let status = orchestrator.run(request("job-1", false)).await.unwrap();

    assert_eq!(status.status, JobState::Complete);
    assert_eq!(status.stats.isbns_resolved, 1);
    assert_eq!(status.stats.synthetic_only, 0);
    assert_eq!(enqueuer.enqueued.lock().unwrap().len(), 1);
    assert_eq!(enqueuer.enqueued.lock().unwrap()[0].0, "9780553262506");
}

#[tokio::test]
async fn dry_run_persists_synthetic_records_but_never_enqueues() {
    let job_status = Arc::new(RecordingJobStatusStore::default());
    let backfill_log = Arc::new(RecordingBackfillLogStore::default());
    let synthetic_store = Arc::new(RecordingSyntheticStore::default());
    let enqueuer = Arc::new(RecordingEnqueuer::default());
    let quota = Arc::new(QuotaManager::new(Arc::new(MemoryKv::default()), 15_000, 2_000));
    let generator = Arc::new(FixedGenerator {
        books: vec![book_with_isbn("A Wizard of Earthsea", "9780553262506")],
    });
    let registry = Arc::new(ProviderRegistry::new(vec![]));

    let orchestrator = BackfillOrchestrator::new(
        job_status,
        backfill_log,
        synthetic_store.clone(),
        Arc::new(AlwaysFreeMonthLock),
        registry,
        vec![generator],
        enqueuer.clone(),
        quota,
        true,
    );

    let status = orchestrator.run(request("job-2", true)).await.unwrap();

    assert_eq!(status.status, JobState::Complete);
    assert!(enqueuer.enqueued.lock().unwrap().is_empty());
    assert!(!synthetic_store.works.lock().unwrap().is_empty());
}

#[tokio::test]
async fn a_candidate_with_no_isbn_and_no_resolving_provider_stays_synthetic_only() {
    let job_status = Arc::new(RecordingJobStatusStore::default());
    let backfill_log = Arc::new(RecordingBackfillLogStore::default());
    let synthetic_store = Arc::new(RecordingSyntheticStore::default());
    let enqueuer = Arc::new(RecordingEnqueuer::default());
    let quota = Arc::new(QuotaManager::new(Arc::new(MemoryKv::default()), 15_000, 2_000));
    let generator = Arc::new(FixedGenerator {
        books: vec![book_without_isbn("The Tombs of Atuan")],
    });
    let registry = Arc::new(ProviderRegistry::new(vec![]));

    let orchestrator = BackfillOrchestrator::new(
        job_status,
        backfill_log,
        synthetic_store,
        Arc::new(AlwaysFreeMonthLock),
        registry,
        vec![generator],
        enqueuer.clone(),
        quota,
        true,
    );

    let status = orchestrator.run(request("job-3", false)).await.unwrap();

    assert_eq!(status.stats.synthetic_only, 1);
    assert_eq!(status.stats.isbns_resolved, 0);
    assert!(enqueuer.enqueued.lock().unwrap().is_empty());
}

#[tokio::test]
async fn an_unknown_prompt_variant_fails_the_job_before_touching_generators() {
    let job_status = Arc::new(RecordingJobStatusStore::default());
    let backfill_log = Arc::new(RecordingBackfillLogStore::default());
    let synthetic_store = Arc::new(RecordingSyntheticStore::default());
    let enqueuer = Arc::new(RecordingEnqueuer::default());
    let quota = Arc::new(QuotaManager::new(Arc::new(MemoryKv::default()), 15_000, 2_000));
    let registry = Arc::new(ProviderRegistry::new(vec![]));

    let orchestrator = BackfillOrchestrator::new(
        job_status,
        backfill_log,
        synthetic_store,
        Arc::new(AlwaysFreeMonthLock),
        registry,
        vec![],
        enqueuer,
        quota,
        true,
    );

    let mut bad_request = request("job-4", false);
    bad_request.prompt_variant = "not-a-real-variant".to_string();
    let status = orchestrator.run(bad_request).await.unwrap();

    assert_eq!(status.status, JobState::Failed);
    assert!(status.error.is_some());
}
