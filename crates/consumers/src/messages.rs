//! Ingress wire schemas (spec §6, §9 "dynamic-typed loose message bodies").
//! Specified here as proper sum/product types rather than the loosely-typed
//! JSON the queue substrate actually carries: validate once at the edge,
//! reject anything malformed to the poison path, and give the rest of the
//! consumer layer a type it can match on instead of an untyped blob.

use serde::{Deserialize, Serialize};

use crate::error::ConsumerError;

fn default_priority() -> String {
    "normal".to_string()
}

/// `enrichment-queue` message body (spec §6). A message must carry at least
/// one of `isbn`/`isbns`; anything else is a poison message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichmentMessageBody {
    pub isbn: Option<String>,
    pub isbns: Option<Vec<String>>,
    #[serde(default = "default_priority")]
    pub priority: String,
    pub source: Option<String>,
    pub job_id: Option<String>,
}

/// The validated, normalized form `EnrichmentConsumer` actually works with —
/// always a non-empty ISBN list regardless of whether the wire body used
/// `isbn` or `isbns` (spec §9's `SingleISBN | BatchISBNs` tagged sum type).
#[derive(Debug, Clone)]
pub struct EnrichmentMessage {
    pub isbns: Vec<String>,
    pub priority: String,
    pub source: Option<String>,
    pub job_id: Option<String>,
}

impl EnrichmentMessage {
    pub fn parse(raw: &[u8]) -> Result<Self, ConsumerError> {
        let body: EnrichmentMessageBody =
            serde_json::from_slice(raw).map_err(|err| ConsumerError::Poison(err.to_string()))?;

        let mut isbns = body.isbns.unwrap_or_default();
        if let Some(isbn) = body.isbn {
            isbns.push(isbn);
        }
        if isbns.is_empty() {
            return Err(ConsumerError::Poison(
                "enrichment message carries neither isbn nor isbns".to_string(),
            ));
        }

        Ok(Self {
            isbns,
            priority: body.priority,
            source: body.source,
            job_id: body.job_id,
        })
    }
}

/// `cover-queue` message body (spec §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoverMessage {
    pub isbn: String,
    pub work_key: Option<String>,
    pub provider_url: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: String,
    pub source: Option<String>,
    pub queued_at: Option<String>,
}

impl CoverMessage {
    pub fn parse(raw: &[u8]) -> Result<Self, ConsumerError> {
        let message: Self = serde_json::from_slice(raw).map_err(|err| ConsumerError::Poison(err.to_string()))?;
        if message.isbn.trim().is_empty() {
            return Err(ConsumerError::Poison("cover message carries an empty isbn".to_string()));
        }
        Ok(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorPriority {
    Low,
    Medium,
    High,
}

impl AuthorPriority {
    fn rank(self) -> u8 {
        match self {
            AuthorPriority::Low => 0,
            AuthorPriority::Medium => 1,
            AuthorPriority::High => 2,
        }
    }

    pub fn max(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorTrigger {
    View,
    Search,
    Manual,
}

/// `author-queue` message body (spec §6): a just-in-time Wikidata enrichment
/// request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthorMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub priority: AuthorPriority,
    pub author_key: String,
    pub wikidata_id: String,
    pub triggered_by: AuthorTrigger,
}

impl AuthorMessage {
    pub fn parse(raw: &[u8]) -> Result<Self, ConsumerError> {
        let message: Self = serde_json::from_slice(raw).map_err(|err| ConsumerError::Poison(err.to_string()))?;
        if message.message_type != "JIT_ENRICH" {
            return Err(ConsumerError::Poison(format!(
                "unknown author message type: {}",
                message.message_type
            )));
        }
        Ok(message)
    }
}

/// `backfill-queue` message body (spec §6). `year`/`month`/`prompt_variant`
/// validity is checked downstream by `alexandria-backfill` (month-lock key
/// validation, prompt lookup) so a message that's merely syntactically well
/// formed still reaches the orchestrator, which is the single place those
/// rules live.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackfillMessage {
    pub job_id: String,
    pub year: i32,
    pub month: i32,
    pub batch_size: u32,
    #[serde(default)]
    pub dry_run: bool,
    pub experiment_id: Option<String>,
    pub prompt_variant: Option<String>,
    pub model_override: Option<String>,
    pub max_quota: Option<u32>,
}

impl BackfillMessage {
    pub fn parse(raw: &[u8]) -> Result<Self, ConsumerError> {
        serde_json::from_slice(raw).map_err(|err| ConsumerError::Poison(err.to_string()))
    }
}
