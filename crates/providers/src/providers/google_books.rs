//! Google Books: secondary metadata source, strong on `subtitle`/`description`
//! coverage and has its own cover image CDN.

use std::sync::Arc;
use std::time::Duration;

use alexandria_core::entities::ImageSet;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};
use crate::model::ProviderEditionRecord;
use crate::rate_limit::ProviderRateLimiter;
use crate::traits::MetadataProvider;

const NAME: &str = "google_books";

pub struct GoogleBooksProvider {
    client: Client,
    api_key: Option<String>,
    rate_limiter: Arc<ProviderRateLimiter>,
    timeout: Duration,
}

impl GoogleBooksProvider {
    pub fn new(
        client: Client,
        api_key: Option<String>,
        rate_limiter: Arc<ProviderRateLimiter>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_key,
            rate_limiter,
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    items: Option<Vec<VolumeItem>>,
}

#[derive(Debug, Deserialize)]
struct VolumeItem {
    id: String,
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize, Default)]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    publisher: Option<String>,
    #[serde(rename = "publishedDate")]
    published_date: Option<String>,
    #[serde(rename = "pageCount")]
    page_count: Option<i32>,
    language: Option<String>,
    authors: Option<Vec<String>>,
    categories: Option<Vec<String>>,
    #[serde(rename = "imageLinks")]
    image_links: Option<ImageLinks>,
}

#[derive(Debug, Deserialize, Default)]
struct ImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
    medium: Option<String>,
    large: Option<String>,
}

#[async_trait]
impl MetadataProvider for GoogleBooksProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_metadata(&self, isbn: &str) -> ProviderResult<Option<ProviderEditionRecord>> {
        self.rate_limiter.acquire().await;
        let mut request = self
            .client
            .get("https://www.googleapis.com/books/v1/volumes")
            .query(&[("q", format!("isbn:{isbn}"))]);
        if let Some(api_key) = &self.api_key {
            request = request.query(&[("key", api_key)]);
        }

        let response: VolumesResponse = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?
            .error_for_status()
            .map_err(|source| ProviderError::from_reqwest(NAME, source))?
            .json()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?;

        let Some(item) = response.items.and_then(|items| items.into_iter().next()) else {
            return Ok(None);
        };
        let info = item.volume_info;
        let links = info.image_links.unwrap_or_default();

        Ok(Some(ProviderEditionRecord {
            source: NAME.to_string(),
            isbn: isbn.to_string(),
            title: info.title,
            subtitle: info.subtitle,
            publisher: info.publisher,
            publication_date: info.published_date,
            page_count: info.page_count,
            format: None,
            language: info.language,
            cover: ImageSet {
                original: links.large.clone(),
                large: links.large,
                medium: links.medium.or(links.thumbnail),
                small: links.small_thumbnail,
            },
            subject_tags: info.categories.unwrap_or_default(),
            dewey: Vec::new(),
            authors: info.authors.unwrap_or_default(),
            alternate_isbns: Vec::new(),
            openlibrary_edition_id: None,
            amazon_asin: None,
            google_books_volume_id: Some(item.id),
            goodreads_edition_id: None,
        }))
    }
}
