//! Archive.org: cover-image fallback of last resort, used when neither
//! ISBNdb, OpenLibrary, nor Google Books returned a usable cover URL.

use std::sync::Arc;
use std::time::Duration;

use alexandria_core::entities::ImageSet;
use async_trait::async_trait;
use reqwest::Client;

use crate::error::{ProviderError, ProviderResult};
use crate::rate_limit::ProviderRateLimiter;
use crate::traits::MetadataProvider;

const NAME: &str = "archive_org";

pub struct ArchiveOrgProvider {
    client: Client,
    rate_limiter: Arc<ProviderRateLimiter>,
    timeout: Duration,
}

impl ArchiveOrgProvider {
    pub fn new(client: Client, rate_limiter: Arc<ProviderRateLimiter>, timeout: Duration) -> Self {
        Self { client, rate_limiter, timeout }
    }
}

#[async_trait]
impl MetadataProvider for ArchiveOrgProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_cover(&self, isbn: &str) -> ProviderResult<Option<ImageSet>> {
        self.rate_limiter.acquire().await;
        let url = format!("https://archive.org/services/img/isbn:{isbn}");
        let response = self
            .client
            .head(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?;

        if !response.status().is_success() {
            return Ok(None);
        }

        Ok(Some(ImageSet {
            original: Some(url.clone()),
            large: Some(url),
            medium: None,
            small: None,
        }))
    }
}
