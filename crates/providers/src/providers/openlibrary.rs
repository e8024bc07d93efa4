//! OpenLibrary: free, unauthenticated, no published daily cap — the
//! fallback provider for editions ISBNdb doesn't recognize, and the source
//! for edition-variant discovery (spec §4.1 "FetchEditionVariants").

use alexandria_core::entities::ImageSet;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{ProviderError, ProviderResult};
use crate::model::ProviderEditionRecord;
use crate::rate_limit::ProviderRateLimiter;
use crate::traits::MetadataProvider;
use std::sync::Arc;
use std::time::Duration;

const NAME: &str = "openlibrary";

pub struct OpenLibraryProvider {
    client: Client,
    rate_limiter: Arc<ProviderRateLimiter>,
    resolver_timeout: Duration,
    variant_timeout: Duration,
}

impl OpenLibraryProvider {
    pub fn new(
        client: Client,
        rate_limiter: Arc<ProviderRateLimiter>,
        resolver_timeout: Duration,
        variant_timeout: Duration,
    ) -> Self {
        Self {
            client,
            rate_limiter,
            resolver_timeout,
            variant_timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EditionApiEntry {
    title: Option<String>,
    subtitle: Option<String>,
    publishers: Option<Vec<String>>,
    publish_date: Option<String>,
    number_of_pages: Option<i32>,
    physical_format: Option<String>,
    languages: Option<Vec<LanguageRef>>,
    key: Option<String>,
    works: Option<Vec<WorkRef>>,
    isbn_13: Option<Vec<String>>,
    isbn_10: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct LanguageRef {
    key: String,
}

#[derive(Debug, Deserialize)]
struct WorkRef {
    key: String,
}

#[async_trait]
impl MetadataProvider for OpenLibraryProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_metadata(&self, isbn: &str) -> ProviderResult<Option<ProviderEditionRecord>> {
        self.rate_limiter.acquire().await;
        let url = format!(
            "https://openlibrary.org/api/books?bibkeys=ISBN:{isbn}&format=json&jscmd=data"
        );
        let body: HashMap<String, serde_json::Value> = self
            .client
            .get(&url)
            .timeout(self.resolver_timeout)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?
            .error_for_status()
            .map_err(|source| ProviderError::from_reqwest(NAME, source))?
            .json()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?;

        let Some(entry) = body.get(&format!("ISBN:{isbn}")) else {
            return Ok(None);
        };

        let title = entry.get("title").and_then(|v| v.as_str()).map(str::to_string);
        let publishers = entry
            .get("publishers")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|p| p.get("name").and_then(|n| n.as_str()))
                    .next()
                    .map(str::to_string)
            })
            .flatten();
        let cover = entry
            .get("cover")
            .and_then(|v| v.as_object())
            .map(|cover| ImageSet {
                original: cover.get("large").and_then(|v| v.as_str()).map(str::to_string),
                large: cover.get("large").and_then(|v| v.as_str()).map(str::to_string),
                medium: cover.get("medium").and_then(|v| v.as_str()).map(str::to_string),
                small: cover.get("small").and_then(|v| v.as_str()).map(str::to_string),
            })
            .unwrap_or_default();
        let subject_tags = entry
            .get("subjects")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.get("name").and_then(|n| n.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let authors = entry
            .get("authors")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(ProviderEditionRecord {
            source: NAME.to_string(),
            isbn: isbn.to_string(),
            title,
            subtitle: None,
            publisher: publishers,
            publication_date: None,
            page_count: None,
            format: None,
            language: None,
            cover,
            subject_tags,
            dewey: Vec::new(),
            authors,
            alternate_isbns: Vec::new(),
            openlibrary_edition_id: entry.get("key").and_then(|v| v.as_str()).map(str::to_string),
            amazon_asin: None,
            google_books_volume_id: None,
            goodreads_edition_id: None,
        }))
    }

    async fn fetch_cover(&self, isbn: &str) -> ProviderResult<Option<ImageSet>> {
        Ok(Some(ImageSet {
            original: Some(format!("https://covers.openlibrary.org/b/isbn/{isbn}-L.jpg")),
            large: Some(format!("https://covers.openlibrary.org/b/isbn/{isbn}-L.jpg")),
            medium: Some(format!("https://covers.openlibrary.org/b/isbn/{isbn}-M.jpg")),
            small: Some(format!("https://covers.openlibrary.org/b/isbn/{isbn}-S.jpg")),
        }))
    }

    async fn fetch_edition_variants(&self, work_key: &str) -> ProviderResult<Vec<ProviderEditionRecord>> {
        self.rate_limiter.acquire().await;
        let url = format!("https://openlibrary.org{work_key}/editions.json");
        let body: serde_json::Value = self
            .client
            .get(&url)
            .timeout(self.variant_timeout)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?
            .error_for_status()
            .map_err(|source| ProviderError::from_reqwest(NAME, source))?
            .json()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?;

        let entries: Vec<EditionApiEntry> = serde_json::from_value(
            body.get("entries").cloned().unwrap_or(serde_json::Value::Array(vec![])),
        )
        .map_err(|err| ProviderError::BadResponse {
            provider: NAME,
            reason: err.to_string(),
        })?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.title.is_some())
            .map(|entry| {
                let isbn = entry
                    .isbn_13
                    .as_ref()
                    .and_then(|v| v.first())
                    .or_else(|| entry.isbn_10.as_ref().and_then(|v| v.first()))
                    .cloned()
                    .unwrap_or_default();
                ProviderEditionRecord {
                    source: NAME.to_string(),
                    isbn,
                    title: entry.title,
                    subtitle: entry.subtitle,
                    publisher: entry.publishers.and_then(|p| p.into_iter().next()),
                    publication_date: entry.publish_date,
                    page_count: entry.number_of_pages,
                    format: entry.physical_format,
                    language: entry.languages.and_then(|l| l.into_iter().next()).map(|l| l.key),
                    openlibrary_edition_id: entry.key,
                    ..Default::default()
                }
            })
            .collect())
    }
}
