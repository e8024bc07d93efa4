//! Error taxonomy for the consumer layer (spec §7): what gets ACKed without
//! retry (`Poison`, `Validation`) versus what goes back on the queue
//! (`Transient`). `StorageError`s inside the message loop map to `Retry`;
//! best-effort side paths (analytics, webhook, cover-URL rewrite) log and
//! continue instead of surfacing an error at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Malformed JSON, unknown prompt variant, out-of-range year/month,
    /// missing both `isbn` and `isbns` — rejected at ingress, ACKed without
    /// retry (spec §7 "PoisonMessage"/"ValidationError").
    #[error("poison message: {0}")]
    Poison(String),

    /// Database/KV failure inside the message loop: mark for retry, the
    /// queue substrate provides capped redelivery.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("kv store error: {0}")]
    Kv(#[from] alexandria_kv::KvError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("merge error: {0}")]
    Merge(#[from] alexandria_merge::MergeError),

    #[error("provider error: {0}")]
    Provider(#[from] alexandria_providers::ProviderError),

    #[error("backfill error: {0}")]
    Backfill(#[from] alexandria_backfill::BackfillError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

pub type Result<T> = std::result::Result<T, ConsumerError>;

/// How a single message should be finalized against the queue substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed (successfully, or a business-level "not found" /
    /// quota-exhausted outcome) — ACK, do not redeliver.
    Ack,
    /// Transient failure (storage error, provider timeout) — leave
    /// uncommitted so the queue substrate redelivers.
    Retry,
}
