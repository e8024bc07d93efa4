//! ISBNdb: the primary, rate-limited, quota-metered provider (spec §4.4).
//! Every call here should go through `alexandria-quota` first — this module
//! assumes the caller already checked `QuotaGate::should_allow` and calls
//! `record_call` itself; keeping the quota check out of the HTTP client
//! keeps this provider testable against a fake quota gate without a live
//! Redis.

use std::sync::Arc;
use std::time::Duration;

use alexandria_core::entities::ImageSet;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};
use crate::model::{ProviderEditionRecord, ResolveQuery, ResolvedIsbn};
use crate::rate_limit::ProviderRateLimiter;
use crate::resolver::{best_fuzzy_match, Candidate};
use crate::traits::MetadataProvider;

const NAME: &str = "isbndb";

pub struct IsbndbProvider {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: Arc<ProviderRateLimiter>,
    timeout: Duration,
}

impl IsbndbProvider {
    pub fn new(client: Client, api_key: String, rate_limiter: Arc<ProviderRateLimiter>, timeout: Duration) -> Self {
        Self {
            client,
            api_key,
            base_url: "https://api2.isbndb.com".to_string(),
            rate_limiter,
            timeout,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> ProviderResult<T> {
        self.rate_limiter.acquire().await;
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?;

        response
            .error_for_status()
            .map_err(|source| ProviderError::from_reqwest(NAME, source))?
            .json::<T>()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })
    }
}

#[derive(Debug, Deserialize)]
struct IsbndbBookResponse {
    book: IsbndbBook,
}

#[derive(Debug, Deserialize)]
struct IsbndbBooksResponse {
    data: Vec<IsbndbBook>,
}

#[derive(Debug, Deserialize)]
struct IsbndbSearchResponse {
    books: Vec<IsbndbBook>,
}

#[derive(Debug, Deserialize)]
struct IsbndbBook {
    isbn13: Option<String>,
    isbn: Option<String>,
    title: Option<String>,
    title_long: Option<String>,
    publisher: Option<String>,
    date_published: Option<String>,
    pages: Option<i32>,
    binding: Option<String>,
    language: Option<String>,
    image: Option<String>,
    subjects: Option<Vec<String>>,
    authors: Option<Vec<String>>,
    dewey_decimal: Option<String>,
}

impl From<IsbndbBook> for ProviderEditionRecord {
    fn from(book: IsbndbBook) -> Self {
        let isbn = book
            .isbn13
            .clone()
            .or(book.isbn.clone())
            .unwrap_or_default();

        ProviderEditionRecord {
            source: NAME.to_string(),
            isbn,
            title: book.title,
            subtitle: book.title_long,
            publisher: book.publisher,
            publication_date: book.date_published,
            page_count: book.pages,
            format: book.binding,
            language: book.language,
            cover: ImageSet {
                original: book.image,
                large: None,
                medium: None,
                small: None,
            },
            subject_tags: book.subjects.unwrap_or_default(),
            dewey: book.dewey_decimal.into_iter().collect(),
            authors: book.authors.unwrap_or_default(),
            alternate_isbns: Vec::new(),
            openlibrary_edition_id: None,
            amazon_asin: None,
            google_books_volume_id: None,
            goodreads_edition_id: None,
        }
    }
}

#[async_trait]
impl MetadataProvider for IsbndbProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn resolve_isbn(&self, query: &ResolveQuery) -> ProviderResult<Option<ResolvedIsbn>> {
        if let Some(isbn) = &query.isbn {
            return Ok(Some(ResolvedIsbn {
                isbn: isbn.clone(),
                confidence: 100,
                method: crate::model::ResolutionMethod::IsbnExact,
            }));
        }

        let Some(title) = &query.title else {
            return Ok(None);
        };

        let response: IsbndbSearchResponse = self
            .get_json(&format!("/books/{}", urlencoding_light(title)))
            .await?;

        let candidates: Vec<Candidate> = response
            .books
            .iter()
            .filter_map(|book| {
                let isbn = book.isbn13.as_deref().or(book.isbn.as_deref())?;
                let title = book.title.as_deref()?;
                Some(Candidate {
                    isbn,
                    title,
                    author: book.authors.as_ref().and_then(|a| a.first()).map(String::as_str),
                    publisher: book.publisher.as_deref(),
                    format: book.binding.as_deref(),
                })
            })
            .collect();

        Ok(best_fuzzy_match(
            title,
            query.author.as_deref(),
            query.publisher.as_deref(),
            query.format.as_deref(),
            &candidates,
        ))
    }

    async fn fetch_metadata(&self, isbn: &str) -> ProviderResult<Option<ProviderEditionRecord>> {
        let response: IsbndbBookResponse = match self.get_json(&format!("/book/{isbn}")).await {
            Ok(response) => response,
            Err(ProviderError::Http { source, .. }) if source.status().map(|s| s.as_u16()) == Some(404) => {
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        Ok(Some(response.book.into()))
    }

    async fn batch_fetch_metadata(&self, isbns: &[String]) -> ProviderResult<Vec<ProviderEditionRecord>> {
        self.rate_limiter.acquire().await;
        let response = self
            .client
            .post(format!("{}/books", self.base_url))
            .header("Authorization", &self.api_key)
            .form(&[("isbns", isbns.join(","))])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?
            .error_for_status()
            .map_err(|source| ProviderError::from_reqwest(NAME, source))?
            .json::<IsbndbBooksResponse>()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?;

        Ok(response.data.into_iter().map(Into::into).collect())
    }
}

/// Minimal space-to-plus encoding; ISBNdb's search path doesn't need full
/// percent-encoding for ordinary book titles.
fn urlencoding_light(input: &str) -> String {
    input.replace(' ', "+")
}
