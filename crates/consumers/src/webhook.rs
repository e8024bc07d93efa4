//! Outbound webhook on newly-created editions (spec §6, §9 "fire-and-forget
//! webhook / best-effort analytics"): failure is captured but never
//! propagated, and never blocks the consumer's own message-processing
//! budget. Grounded on the teacher's `reqwest` JSON-POST client pattern
//! (`discovery::intent::IntentParser`), stripped down from a request/response
//! round trip to a pure notify-and-forget.

use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
struct WebhookPayload<'a> {
    isbn: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    quality_improvement: i32,
}

pub struct WebhookNotifier {
    client: Client,
    url: Option<String>,
    secret: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: Option<String>, secret: String) -> Self {
        Self { client, url, secret }
    }

    /// Fire the webhook for a newly-created edition. Spawns the HTTP call
    /// onto its own task so a slow or unreachable receiver never delays the
    /// caller's own message loop; any failure is logged, never returned.
    pub fn notify_edition_created(&self, isbn: String, quality_improvement: i32) {
        let Some(url) = self.url.clone() else {
            return;
        };
        let client = self.client.clone();
        let secret = self.secret.clone();

        tokio::spawn(async move {
            let payload = WebhookPayload {
                isbn: &isbn,
                kind: "edition",
                quality_improvement,
            };
            let result = client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("x-alexandria-webhook-secret", secret)
                .json(&payload)
                .send()
                .await;

            if let Err(err) = result {
                tracing::warn!(isbn, error = %err, "edition-created webhook delivery failed");
            }
        });
    }
}
