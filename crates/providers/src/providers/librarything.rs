//! LibraryThing: thin work-level edition-variant source. LibraryThing's API
//! requires a partner key most deployments won't have, so this provider
//! degrades to an empty variant list rather than failing the whole fan-out
//! (spec §4.1 default-empty contract).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::ProviderResult;
use crate::model::ProviderEditionRecord;
use crate::rate_limit::ProviderRateLimiter;
use crate::traits::MetadataProvider;

const NAME: &str = "librarything";

pub struct LibraryThingProvider {
    #[allow(dead_code)]
    client: Client,
    #[allow(dead_code)]
    rate_limiter: Arc<ProviderRateLimiter>,
    api_key: Option<String>,
}

impl LibraryThingProvider {
    pub fn new(client: Client, rate_limiter: Arc<ProviderRateLimiter>, api_key: Option<String>) -> Self {
        Self {
            client,
            rate_limiter,
            api_key,
        }
    }
}

#[async_trait]
impl MetadataProvider for LibraryThingProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_edition_variants(&self, _work_key: &str) -> ProviderResult<Vec<ProviderEditionRecord>> {
        if self.api_key.is_none() {
            tracing::debug!("librarything partner key not configured, skipping");
            return Ok(Vec::new());
        }
        // TODO: wire up LibraryThing's ThingISBN endpoint once a partner key
        // is provisioned; no public unauthenticated edition-variant API exists.
        Ok(Vec::new())
    }
}
