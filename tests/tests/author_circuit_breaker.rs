//! Author consumer's soft circuit breaker (spec §4.3.3) driven by a real
//! `QuotaManager<MemoryKv>` instead of a fixed-fraction stub, so the
//! breaker's 70%/85% thresholds are exercised against the same
//! `record_call`/`status` bookkeeping the enrichment consumer uses.

use std::sync::Arc;

use alexandria_consumers::messages::{AuthorMessage, AuthorPriority, AuthorTrigger};
use alexandria_consumers::{AuthorConsumer, Disposition};
use alexandria_merge::AuthorWriter;
use alexandria_quota::QuotaManager;
use alexandria_tests::fakes::{FixedAuthorProvider, MemoryKv, RecordingAuthorWriter};

const DEFER_AT: f64 = 0.85;
const HIGH_PRIORITY_ONLY_AT: f64 = 0.70;

fn message(author_key: &str, priority: AuthorPriority) -> AuthorMessage {
    AuthorMessage {
        message_type: "JIT_ENRICH".to_string(),
        priority,
        author_key: author_key.to_string(),
        wikidata_id: "Q1".to_string(),
        triggered_by: AuthorTrigger::View,
    }
}

async fn quota_at_fraction(fraction: f64) -> Arc<QuotaManager<MemoryKv>> {
    let kv = Arc::new(MemoryKv::default());
    let quota = QuotaManager::new(kv, 15_000, 2_000);
    let calls = (fraction * 15_000.0) as i64;
    for _ in 0..calls {
        quota.record_call("isbndb").await.unwrap();
    }
    Arc::new(quota)
}

#[tokio::test]
async fn below_the_high_priority_threshold_everyone_proceeds() {
    let quota = quota_at_fraction(0.50).await;
    let wikidata = Arc::new(FixedAuthorProvider {
        record: Some(alexandria_providers::ProviderAuthorRecord {
            source: "wikidata".to_string(),
            name: Some("J.K. Rowling".to_string()),
            ..Default::default()
        }),
    });
    let writer = Arc::new(RecordingAuthorWriter::default());
    let writer_dyn: Arc<dyn AuthorWriter> = writer.clone();
    let consumer = AuthorConsumer::new(wikidata, writer_dyn, quota, DEFER_AT, HIGH_PRIORITY_ONLY_AT);

    let results = consumer
        .process_batch(&[message("ak:jk-rowling", AuthorPriority::Low)])
        .await;

    assert_eq!(results[0].1, Disposition::Ack);
    assert!(writer.authors.lock().unwrap().contains_key("ak:jk-rowling"));
}

#[tokio::test]
async fn between_thresholds_only_high_priority_messages_proceed() {
    let quota = quota_at_fraction(0.75).await;
    let wikidata = Arc::new(FixedAuthorProvider {
        record: Some(alexandria_providers::ProviderAuthorRecord {
            source: "wikidata".to_string(),
            name: Some("Name".to_string()),
            ..Default::default()
        }),
    });
    let writer: Arc<dyn AuthorWriter> = Arc::new(RecordingAuthorWriter::default());
    let consumer = AuthorConsumer::new(wikidata, writer, quota, DEFER_AT, HIGH_PRIORITY_ONLY_AT);

    let results = consumer
        .process_batch(&[message("ak:high", AuthorPriority::High), message("ak:low", AuthorPriority::Low)])
        .await;
    let by_key: std::collections::HashMap<_, _> = results.into_iter().collect();

    assert_eq!(by_key.get("ak:high"), Some(&Disposition::Ack));
    assert_eq!(by_key.get("ak:low"), Some(&Disposition::Retry));
}

#[tokio::test]
async fn above_defer_threshold_the_whole_batch_is_retried() {
    let quota = quota_at_fraction(0.90).await;
    let wikidata = Arc::new(FixedAuthorProvider { record: None });
    let writer: Arc<dyn AuthorWriter> = Arc::new(RecordingAuthorWriter::default());
    let consumer = AuthorConsumer::new(wikidata, writer, quota, DEFER_AT, HIGH_PRIORITY_ONLY_AT);

    let results = consumer
        .process_batch(&[message("ak:a", AuthorPriority::High), message("ak:b", AuthorPriority::Low)])
        .await;

    assert!(results.iter().all(|(_, disposition)| *disposition == Disposition::Retry));
}
