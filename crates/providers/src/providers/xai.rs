//! xAI (Grok): second generative backfill provider, called concurrently
//! with Gemini and aggregated by `alexandria-backfill` (spec §4.6) so one
//! vendor outage never stalls backfill generation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};
use crate::model::GeneratedBook;
use crate::traits::GenerativeProvider;

const NAME: &str = "xai";

pub struct XaiProvider {
    client: Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl XaiProvider {
    pub fn new(client: Client, api_key: String, timeout: Duration) -> Self {
        Self {
            client,
            api_key,
            model: "grok-2-latest".to_string(),
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

#[async_trait]
impl GenerativeProvider for XaiProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn generate_books(&self, prompt: &str, count: u32) -> ProviderResult<Vec<GeneratedBook>> {
        let full_prompt = format!(
            "{prompt}\n\nReturn exactly {count} books as a JSON array, each with fields: \
             isbn (string or null), title, author, description, subject_tags (array of strings), \
             first_publication_year (integer or null). Return only the JSON array, no prose."
        );

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": full_prompt }],
        });

        let response: ChatCompletionResponse = self
            .client
            .post("https://api.x.ai/v1/chat/completions")
            .bearer_auth(&self.api_key)
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

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::BadResponse {
                provider: NAME,
                reason: "no choices returned".to_string(),
            })?;

        let cleaned = content.trim().trim_start_matches("```json").trim_end_matches("```");
        serde_json::from_str::<Vec<GeneratedBook>>(cleaned).map_err(|err| ProviderError::BadResponse {
            provider: NAME,
            reason: err.to_string(),
        })
    }
}
