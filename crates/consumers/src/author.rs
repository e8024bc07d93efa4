//! Author consumer (spec §4.3.3): just-in-time Wikidata enrichment, gated by
//! a soft circuit breaker on ISBNdb's daily quota usage rather than the
//! quota gate's own hard admission ceiling. Grounded on the teacher's
//! `api::circuit_breaker::CircuitBreakerManager` state thresholds, reused
//! here as percentage bands instead of a failure-rate counter.
//!
//! The `author-queue` message carries a `wikidata_id` but no display name,
//! while `WikidataProvider::fetch_author` only supports a name-keyed SPARQL
//! lookup — there is no QID-keyed entity fetch in this provider. Absent a
//! name field on the wire schema, the consumer derives a search name from
//! the synthetic `ak:<slug>` form of `author_key` (title-cased, hyphens to
//! spaces); an OpenLibrary-sourced `author_key` (`/authors/OL...A`) carries
//! no derivable name and is skipped with a log line rather than guessed at.

use std::collections::HashMap;
use std::sync::Arc;

use alexandria_merge::AuthorWriter;
use alexandria_providers::{AuthorProvider, ProviderAuthorRecord};
use alexandria_quota::{Admission, OperationKind, QuotaGate};

use crate::error::{Disposition, Result};
use crate::messages::{AuthorMessage, AuthorPriority};

pub struct AuthorConsumer<Q: QuotaGate> {
    wikidata: Arc<dyn AuthorProvider>,
    writer: Arc<dyn AuthorWriter>,
    quota: Arc<Q>,
    defer_usage_fraction: f64,
    high_priority_usage_fraction: f64,
}

impl<Q: QuotaGate> AuthorConsumer<Q> {
    pub fn new(
        wikidata: Arc<dyn AuthorProvider>,
        writer: Arc<dyn AuthorWriter>,
        quota: Arc<Q>,
        defer_usage_fraction: f64,
        high_priority_usage_fraction: f64,
    ) -> Self {
        Self {
            wikidata,
            writer,
            quota,
            defer_usage_fraction,
            high_priority_usage_fraction,
        }
    }

    fn derive_search_name(author_key: &str) -> Option<String> {
        let slug = author_key.strip_prefix("ak:")?;
        let name = slug
            .split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Process one batch of `author-queue` messages: dedup within the
    /// batch (upgrading to the highest priority observed), apply the
    /// bulk-author operation policy and the quota-percentage circuit
    /// breaker, then fetch/merge the survivors.
    pub async fn process_batch(&self, messages: &[AuthorMessage]) -> Vec<(String, Disposition)> {
        let bulk_admission = self
            .quota
            .should_allow_operation("isbndb", OperationKind::BulkAuthor, messages.len() as u32)
            .await
            .unwrap_or(Admission::Suspended);

        if bulk_admission == Admission::Suspended {
            tracing::info!(batch_size = messages.len(), "bulk author operation policy rejected this batch");
            return messages.iter().map(|m| (m.author_key.clone(), Disposition::Retry)).collect();
        }

        let usage = match self.quota.status("isbndb").await {
            Ok(status) => status.usage_fraction(),
            Err(err) => {
                tracing::warn!(error = %err, "quota status lookup failed, deferring all author messages");
                1.0
            }
        };

        if usage >= self.defer_usage_fraction {
            tracing::info!(usage, "author circuit breaker open: deferring entire batch");
            return messages.iter().map(|m| (m.author_key.clone(), Disposition::Retry)).collect();
        }

        let high_priority_only = usage >= self.high_priority_usage_fraction;

        let mut deduped: HashMap<String, AuthorMessage> = HashMap::new();
        for message in messages {
            deduped
                .entry(message.author_key.clone())
                .and_modify(|existing| existing.priority = existing.priority.max(message.priority))
                .or_insert_with(|| message.clone());
        }

        let mut results = Vec::with_capacity(deduped.len());
        for (author_key, message) in deduped {
            if high_priority_only && message.priority != AuthorPriority::High {
                results.push((author_key, Disposition::Retry));
                continue;
            }
            let disposition = self.process_one(&message).await;
            results.push((author_key, disposition));
        }
        results
    }

    async fn process_one(&self, message: &AuthorMessage) -> Disposition {
        match self.try_enrich(message).await {
            Ok(()) => Disposition::Ack,
            Err(err) => {
                tracing::error!(author_key = message.author_key, error = %err, "author enrichment failed, will retry");
                Disposition::Retry
            }
        }
    }

    async fn try_enrich(&self, message: &AuthorMessage) -> Result<()> {
        let Some(name) = Self::derive_search_name(&message.author_key) else {
            tracing::info!(
                author_key = message.author_key,
                "no derivable search name for this author_key, skipping wikidata lookup"
            );
            return Ok(());
        };

        let Some(mut record) = self.wikidata.fetch_author(&name).await? else {
            return Ok(());
        };
        record.author_key = message.author_key.clone();
        if record.wikidata_id.is_none() {
            record.wikidata_id = Some(message.wikidata_id.clone());
        }

        self.writer.upsert_author(&message.author_key, &record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::AuthorTrigger;
    use alexandria_providers::ProviderResult;
    use alexandria_quota::{Admission, QuotaStatus};
    use async_trait::async_trait;

    struct FakeWikidata {
        record: Option<ProviderAuthorRecord>,
    }

    #[async_trait]
    impl AuthorProvider for FakeWikidata {
        fn name(&self) -> &'static str {
            "wikidata"
        }
        async fn fetch_author(&self, _name: &str) -> ProviderResult<Option<ProviderAuthorRecord>> {
            Ok(self.record.clone())
        }
    }

    struct FakeAuthorWriter;

    #[async_trait]
    impl AuthorWriter for FakeAuthorWriter {
        async fn upsert_author(&self, _author_key: &str, _incoming: &ProviderAuthorRecord) -> alexandria_merge::Result<Vec<String>> {
            Ok(vec!["bio".to_string()])
        }
    }

    struct FixedQuota {
        usage_fraction: f64,
    }

    #[async_trait]
    impl QuotaGate for FixedQuota {
        async fn should_allow(&self, _provider: &str) -> Admission {
            Admission::Allowed
        }
        async fn record_call(&self, _provider: &str) -> alexandria_quota::Result<i64> {
            Ok(1)
        }
        async fn status(&self, provider: &str) -> alexandria_quota::Result<QuotaStatus> {
            Ok(QuotaStatus {
                provider: provider.to_string(),
                date: "2026-07-27".to_string(),
                calls_made: (self.usage_fraction * 15_000.0) as i64,
                daily_limit: 15_000,
                safety_buffer: 2_000,
                admission: Admission::Allowed,
            })
        }
        async fn should_allow_operation(
            &self,
            _provider: &str,
            _kind: alexandria_quota::OperationKind,
            _n: u32,
        ) -> alexandria_quota::Result<Admission> {
            Ok(Admission::Allowed)
        }
    }

    fn message(author_key: &str, priority: AuthorPriority) -> AuthorMessage {
        AuthorMessage {
            message_type: "JIT_ENRICH".to_string(),
            priority,
            author_key: author_key.to_string(),
            wikidata_id: "Q1".to_string(),
            triggered_by: AuthorTrigger::View,
        }
    }

    #[tokio::test]
    async fn derives_a_title_cased_name_from_a_synthetic_author_key() {
        assert_eq!(
            AuthorConsumer::<FixedQuota>::derive_search_name("ak:jrr-tolkien"),
            Some("Jrr Tolkien".to_string())
        );
        assert_eq!(AuthorConsumer::<FixedQuota>::derive_search_name("/authors/OL26320A"), None);
    }

    struct RejectingBulkQuota;

    #[async_trait]
    impl QuotaGate for RejectingBulkQuota {
        async fn should_allow(&self, _provider: &str) -> Admission {
            Admission::Allowed
        }
        async fn record_call(&self, _provider: &str) -> alexandria_quota::Result<i64> {
            Ok(1)
        }
        async fn status(&self, provider: &str) -> alexandria_quota::Result<QuotaStatus> {
            Ok(QuotaStatus {
                provider: provider.to_string(),
                date: "2026-07-27".to_string(),
                calls_made: 0,
                daily_limit: 15_000,
                safety_buffer: 2_000,
                admission: Admission::Allowed,
            })
        }
        async fn should_allow_operation(
            &self,
            _provider: &str,
            _kind: alexandria_quota::OperationKind,
            _n: u32,
        ) -> alexandria_quota::Result<Admission> {
            Ok(Admission::Suspended)
        }
    }

    #[tokio::test]
    async fn bulk_author_policy_rejection_defers_the_whole_batch() {
        let consumer = AuthorConsumer::new(
            Arc::new(FakeWikidata { record: None }),
            Arc::new(FakeAuthorWriter),
            Arc::new(RejectingBulkQuota),
            0.85,
            0.70,
        );
        let results = consumer
            .process_batch(&[message("ak:a", AuthorPriority::High), message("ak:b", AuthorPriority::Low)])
            .await;
        assert!(results.iter().all(|(_, d)| *d == Disposition::Retry));
    }

    #[tokio::test]
    async fn above_defer_threshold_retries_the_whole_batch() {
        let consumer = AuthorConsumer::new(
            Arc::new(FakeWikidata { record: None }),
            Arc::new(FakeAuthorWriter),
            Arc::new(FixedQuota { usage_fraction: 0.90 }),
            0.85,
            0.70,
        );
        let results = consumer.process_batch(&[message("ak:a", AuthorPriority::High)]).await;
        assert_eq!(results[0].1, Disposition::Retry);
    }

    #[tokio::test]
    async fn between_thresholds_only_high_priority_proceeds() {
        let consumer = AuthorConsumer::new(
            Arc::new(FakeWikidata {
                record: Some(ProviderAuthorRecord {
                    source: "wikidata".to_string(),
                    author_key: String::new(),
                    name: Some("J.R.R. Tolkien".to_string()),
                    ..Default::default()
                }),
            }),
            Arc::new(FakeAuthorWriter),
            Arc::new(FixedQuota { usage_fraction: 0.75 }),
            0.85,
            0.70,
        );
        let results = consumer
            .process_batch(&[message("ak:high", AuthorPriority::High), message("ak:low", AuthorPriority::Low)])
            .await;
        let mut by_key: HashMap<_, _> = results.into_iter().collect();
        assert_eq!(by_key.remove("ak:high"), Some(Disposition::Ack));
        assert_eq!(by_key.remove("ak:low"), Some(Disposition::Retry));
    }

    #[tokio::test]
    async fn duplicate_author_keys_in_one_batch_upgrade_to_highest_priority() {
        let consumer = AuthorConsumer::new(
            Arc::new(FakeWikidata {
                record: Some(ProviderAuthorRecord {
                    source: "wikidata".to_string(),
                    author_key: String::new(),
                    name: Some("Name".to_string()),
                    ..Default::default()
                }),
            }),
            Arc::new(FakeAuthorWriter),
            Arc::new(FixedQuota { usage_fraction: 0.75 }),
            0.85,
            0.70,
        );
        let results = consumer
            .process_batch(&[message("ak:dup", AuthorPriority::Low), message("ak:dup", AuthorPriority::High)])
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, Disposition::Ack);
    }
}
