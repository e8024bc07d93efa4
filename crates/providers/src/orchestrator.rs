//! The three provider-fan-out strategies from spec §4.1:
//!
//! - `cascading`: call providers in priority order, stop at first success.
//! - `concurrent_aggregate`: call every provider at once, keep the
//!   highest-confidence single result.
//! - `fan_out_merge`: call every provider at once, hand every non-empty
//!   result to the caller so `alexandria-merge` can merge them all rather
//!   than picking one winner.
//!
//! Plus the ISBN-resolution cascade the backfill pipeline drives over the
//! same registry (spec §2 "5-tier cascade"): each registered provider gets
//! one shot at `resolve_isbn` in priority order, first hit wins. Most
//! providers only support ISBN-keyed lookups and fall back to the trait's
//! default `Ok(None)`, so in practice this is ISBNdb's exact/fuzzy match
//! followed by whichever other providers later grow `resolve_isbn` support.

use futures::future::join_all;

use crate::error::{ProviderError, ProviderResult};
use crate::model::{ProviderEditionRecord, ResolveQuery, ResolvedIsbn};
use crate::registry::ProviderRegistry;

/// Try every provider's `resolve_isbn` in registry order, returning the
/// first hit. A `ConfigurationError` (bad credentials) aborts the cascade
/// immediately rather than being treated as a transient miss.
pub async fn resolve_isbn_cascade(
    registry: &ProviderRegistry,
    query: &ResolveQuery,
) -> ProviderResult<Option<ResolvedIsbn>> {
    for provider in registry.providers() {
        match provider.resolve_isbn(query).await {
            Ok(Some(resolved)) => return Ok(Some(resolved)),
            Ok(None) => continue,
            Err(err @ ProviderError::ConfigurationError { .. }) => {
                tracing::error!(provider = provider.name(), error = %err, "provider misconfigured, aborting cascade");
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(provider = provider.name(), error = %err, "resolve_isbn failed, cascading to next");
                continue;
            }
        }
    }
    Ok(None)
}

/// Try providers in registry order, returning the first success. A
/// `ConfigurationError` aborts the cascade immediately.
pub async fn cascading_fetch(
    registry: &ProviderRegistry,
    isbn: &str,
) -> ProviderResult<Option<ProviderEditionRecord>> {
    for provider in registry.providers() {
        match provider.fetch_metadata(isbn).await {
            Ok(Some(record)) => return Ok(Some(record)),
            Ok(None) => continue,
            Err(err @ ProviderError::ConfigurationError { .. }) => {
                tracing::error!(provider = provider.name(), error = %err, "provider misconfigured, aborting cascade");
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(provider = provider.name(), error = %err, "provider call failed, cascading to next");
                continue;
            }
        }
    }
    Ok(None)
}

/// Call every provider concurrently; among the ones that returned data,
/// keep the one with the richest record (most non-null fields) as a
/// proxy for confidence when no explicit score is available.
pub async fn concurrent_aggregate_fetch(
    registry: &ProviderRegistry,
    isbn: &str,
) -> ProviderResult<Option<ProviderEditionRecord>> {
    let results = fan_out_fetch(registry, isbn).await?;
    Ok(results.into_iter().max_by_key(filled_field_count))
}

/// Call every provider concurrently and return every non-empty result for
/// the caller to merge field-by-field. If any provider reports a
/// `ConfigurationError`, the whole fan-out fails rather than silently
/// dropping that provider's contribution.
pub async fn fan_out_fetch(
    registry: &ProviderRegistry,
    isbn: &str,
) -> ProviderResult<Vec<ProviderEditionRecord>> {
    let futures = registry
        .providers()
        .iter()
        .map(|provider| {
            let isbn = isbn.to_string();
            async move {
                match provider.fetch_metadata(&isbn).await {
                    Ok(record) => Ok(record),
                    Err(err @ ProviderError::ConfigurationError { .. }) => {
                        tracing::error!(provider = provider.name(), error = %err, "provider misconfigured, aborting fan-out");
                        Err(err)
                    }
                    Err(err) => {
                        tracing::warn!(provider = provider.name(), error = %err, "provider call failed");
                        Ok(None)
                    }
                }
            }
        })
        .collect::<Vec<_>>();

    let results: Vec<ProviderResult<Option<ProviderEditionRecord>>> = join_all(futures).await;
    let mut records = Vec::with_capacity(results.len());
    for result in results {
        if let Some(record) = result? {
            records.push(record);
        }
    }
    Ok(records)
}

fn filled_field_count(record: &ProviderEditionRecord) -> usize {
    let mut count = 0;
    if record.title.is_some() {
        count += 1;
    }
    if record.subtitle.is_some() {
        count += 1;
    }
    if record.publisher.is_some() {
        count += 1;
    }
    if record.publication_date.is_some() {
        count += 1;
    }
    if record.page_count.is_some() {
        count += 1;
    }
    if record.cover.best().is_some() {
        count += 1;
    }
    count += record.subject_tags.len();
    count += record.authors.len();
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderResult;
    use crate::traits::MetadataProvider;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubProvider {
        name: &'static str,
        record: Option<ProviderEditionRecord>,
    }

    #[async_trait]
    impl MetadataProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_metadata(&self, _isbn: &str) -> ProviderResult<Option<ProviderEditionRecord>> {
            Ok(self.record.clone())
        }
    }

    fn thin_record(source: &str) -> ProviderEditionRecord {
        ProviderEditionRecord {
            source: source.to_string(),
            isbn: "9780618260300".to_string(),
            title: Some("The Hobbit".to_string()),
            ..Default::default()
        }
    }

    fn rich_record(source: &str) -> ProviderEditionRecord {
        ProviderEditionRecord {
            source: source.to_string(),
            isbn: "9780618260300".to_string(),
            title: Some("The Hobbit".to_string()),
            subtitle: Some("or There and Back Again".to_string()),
            publisher: Some("Houghton Mifflin".to_string()),
            subject_tags: vec!["fantasy".to_string()],
            authors: vec!["J.R.R. Tolkien".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn cascading_stops_at_first_success() {
        let registry = ProviderRegistry::new(vec![
            Arc::new(StubProvider {
                name: "isbndb",
                record: Some(thin_record("isbndb")),
            }),
            Arc::new(StubProvider {
                name: "openlibrary",
                record: Some(rich_record("openlibrary")),
            }),
        ]);
        let result = cascading_fetch(&registry, "9780618260300").await.unwrap().unwrap();
        assert_eq!(result.source, "isbndb");
    }

    #[tokio::test]
    async fn concurrent_aggregate_keeps_richest_record() {
        let registry = ProviderRegistry::new(vec![
            Arc::new(StubProvider {
                name: "isbndb",
                record: Some(thin_record("isbndb")),
            }),
            Arc::new(StubProvider {
                name: "openlibrary",
                record: Some(rich_record("openlibrary")),
            }),
        ]);
        let result = concurrent_aggregate_fetch(&registry, "9780618260300")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.source, "openlibrary");
    }

    struct ResolvingStub {
        name: &'static str,
        resolved: Option<ResolvedIsbn>,
    }

    #[async_trait]
    impl MetadataProvider for ResolvingStub {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn resolve_isbn(&self, _query: &ResolveQuery) -> ProviderResult<Option<ResolvedIsbn>> {
            Ok(self.resolved.clone())
        }
    }

    #[tokio::test]
    async fn resolve_isbn_cascade_stops_at_first_hit() {
        use crate::model::ResolutionMethod;

        let registry = ProviderRegistry::new(vec![
            Arc::new(ResolvingStub {
                name: "isbndb",
                resolved: None,
            }),
            Arc::new(ResolvingStub {
                name: "openlibrary",
                resolved: Some(ResolvedIsbn {
                    isbn: "9780618260300".to_string(),
                    confidence: 80,
                    method: ResolutionMethod::TitleAuthorFuzzy,
                }),
            }),
        ]);
        let query = ResolveQuery {
            title: Some("The Hobbit".to_string()),
            ..Default::default()
        };
        let result = resolve_isbn_cascade(&registry, &query).await.unwrap().unwrap();
        assert_eq!(result.isbn, "9780618260300");
    }

    struct FailingProvider {
        name: &'static str,
        error: fn() -> ProviderError,
    }

    #[async_trait]
    impl MetadataProvider for FailingProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_metadata(&self, _isbn: &str) -> ProviderResult<Option<ProviderEditionRecord>> {
            Err((self.error)())
        }
    }

    #[tokio::test]
    async fn cascading_fetch_aborts_on_configuration_error_instead_of_continuing() {
        let registry = ProviderRegistry::new(vec![
            Arc::new(FailingProvider {
                name: "isbndb",
                error: || ProviderError::ConfigurationError { provider: "isbndb" },
            }),
            Arc::new(StubProvider {
                name: "openlibrary",
                record: Some(rich_record("openlibrary")),
            }),
        ]);
        let result = cascading_fetch(&registry, "9780618260300").await;
        assert!(matches!(result, Err(ProviderError::ConfigurationError { provider: "isbndb" })));
    }

    #[tokio::test]
    async fn fan_out_fetch_aborts_on_configuration_error() {
        let registry = ProviderRegistry::new(vec![
            Arc::new(StubProvider {
                name: "isbndb",
                record: Some(thin_record("isbndb")),
            }),
            Arc::new(FailingProvider {
                name: "openlibrary",
                error: || ProviderError::ConfigurationError { provider: "openlibrary" },
            }),
        ]);
        let result = fan_out_fetch(&registry, "9780618260300").await;
        assert!(matches!(result, Err(ProviderError::ConfigurationError { provider: "openlibrary" })));
    }

    #[tokio::test]
    async fn fan_out_returns_every_non_empty_result() {
        let registry = ProviderRegistry::new(vec![
            Arc::new(StubProvider {
                name: "isbndb",
                record: Some(thin_record("isbndb")),
            }),
            Arc::new(StubProvider {
                name: "nothing",
                record: None,
            }),
            Arc::new(StubProvider {
                name: "openlibrary",
                record: Some(rich_record("openlibrary")),
            }),
        ]);
        let results = fan_out_fetch(&registry, "9780618260300").await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
