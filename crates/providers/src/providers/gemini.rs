//! Gemini: one of the two generative backfill providers (spec §4.6). Fed a
//! prompt-variant string from `alexandria-backfill`'s registry and asked for
//! `count` synthetic book records as JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};
use crate::model::GeneratedBook;
use crate::traits::GenerativeProvider;

const NAME: &str = "gemini";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(client: Client, api_key: String, timeout: Duration) -> Self {
        Self {
            client,
            api_key,
            model: "gemini-1.5-flash".to_string(),
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn generate_books(&self, prompt: &str, count: u32) -> ProviderResult<Vec<GeneratedBook>> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let full_prompt = format!(
            "{prompt}\n\nReturn exactly {count} books as a JSON array, each with fields: \
             isbn (string or null), title, author, description, subject_tags (array of strings), \
             first_publication_year (integer or null). Return only the JSON array, no prose."
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": full_prompt }] }]
        });

        let response: GenerateContentResponse = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?
            .error_for_status()
            .map_err(|source| ProviderError::from_reqwest(NAME, source))?
            .json()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ProviderError::BadResponse {
                provider: NAME,
                reason: "no candidates returned".to_string(),
            })?;

        let cleaned = text.trim().trim_start_matches("```json").trim_end_matches("```");
        serde_json::from_str::<Vec<GeneratedBook>>(cleaned).map_err(|err| ProviderError::BadResponse {
            provider: NAME,
            reason: err.to_string(),
        })
    }
}
