//! Engine-wide configuration (spec §6 external interfaces, §9 open question
//! on `related_isbns` precedence). Loaded the way the teacher's services read
//! their own env-backed settings (`std::env::var` for required secrets in
//! `main.rs`), generalized here into a single `config`-crate layered source
//! so every binary in the workspace shares one schema.

use std::time::Duration;

use serde::Deserialize;

/// Engine-wide configuration, loaded from environment variables (optionally
/// preceded by a `.env` file) with an `ALEXANDRIA_` prefix, e.g.
/// `ALEXANDRIA_ISBNDB_DAILY_LIMIT=2500`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database_url: String,
    pub redis_url: String,
    pub kafka_brokers: String,

    /// ISBNdb's published daily call ceiling for the active plan.
    pub isbndb_daily_limit: u32,
    /// Calls held back below `isbndb_daily_limit` so a burst near midnight
    /// UTC never trips the provider's own hard cutoff.
    pub isbndb_safety_buffer: u32,

    /// Per-request timeout for ISBN-resolution calls (ISBNdb, OpenLibrary,
    /// Google Books, Archive.org) (spec §10).
    #[serde(with = "duration_millis")]
    pub resolver_timeout: Duration,
    /// Per-request timeout for cover-fetch calls (spec §10).
    #[serde(with = "duration_millis")]
    pub cover_timeout: Duration,
    /// Per-request timeout for generative backfill calls (Gemini/xAI), far
    /// longer than the others because these are synthesis calls, not
    /// metadata lookups (spec §10).
    #[serde(with = "duration_millis")]
    pub generator_timeout: Duration,
    /// Per-request timeout for edition-variant lookups (OpenLibrary,
    /// LibraryThing) (spec §10).
    #[serde(with = "duration_millis")]
    pub variant_timeout: Duration,
    /// Max concurrent in-flight requests to a single provider in the
    /// concurrent-aggregate and fan-out-merge orchestration strategies.
    pub provider_max_concurrency: u32,

    /// Consumer batch size before an ack is sent back to the queue.
    pub consumer_batch_size: u32,
    /// Max delivery attempts before a message is routed to the poison queue.
    pub consumer_max_retries: u32,

    /// Whether the backfill pipeline may call out to Gemini/xAI to
    /// synthesize a record for an ISBN no provider recognizes.
    pub enable_ai_backfill: bool,
    /// Whether a month-advisory-lock guards backfill generation for a given
    /// (year, month) pair against duplicate concurrent runs.
    pub enable_month_locking: bool,

    /// Open question (spec §9): when an edition's `related_isbns` map
    /// already has an entry for a given ISBN, does the existing mapping win
    /// over a freshly observed one from a lower-priority provider?
    /// `true` preserves first-established relationships (DESIGN.md decision).
    pub related_isbns_existing_wins: bool,

    /// TTL for backfill job status rows kept in the KV store (spec §4.8).
    pub backfill_job_status_ttl_days: i64,

    /// Feature flag gating the enrichment consumer's Google Books
    /// supplementary-categories fetch (spec §6 `ENABLE_GOOGLE_BOOKS_ENRICHMENT`).
    pub enable_google_books_enrichment: bool,
    /// Wall-clock budget for a single message's supplementary-evidence fetch
    /// (spec §4.3.1, §5): once exceeded, primary enrichment still completes
    /// but remaining supplementary steps are skipped.
    #[serde(with = "duration_millis")]
    pub supplementary_fetch_budget: Duration,

    /// Outbound webhook target for newly-created editions (spec §6). `None`
    /// disables the webhook entirely.
    pub webhook_url: Option<String>,
    /// Shared secret sent as `x-alexandria-webhook-secret` on every webhook
    /// POST.
    pub webhook_secret: String,

    /// Author-queue circuit breaker (spec §4.3.3, §6): at or above this
    /// fraction of daily ISBNdb quota, all author enrichment is deferred.
    pub author_defer_usage_fraction: f64,
    /// At or above this fraction (but below `author_defer_usage_fraction`),
    /// only `priority=high` author messages proceed.
    pub author_high_priority_usage_fraction: f64,

    /// Object storage bucket/prefix covers are uploaded to
    /// (`isbn/{isbn}/original.{ext}`, spec §4.3.2).
    pub cover_storage_base_url: String,
    /// CDN base URL written back onto the edition row once a cover upload
    /// completes.
    pub cover_cdn_base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/alexandria".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            kafka_brokers: "localhost:9092".to_string(),
            isbndb_daily_limit: 2_500,
            isbndb_safety_buffer: 100,
            resolver_timeout: Duration::from_secs(15),
            cover_timeout: Duration::from_secs(10),
            generator_timeout: Duration::from_secs(60),
            variant_timeout: Duration::from_secs(5),
            provider_max_concurrency: 8,
            consumer_batch_size: 50,
            consumer_max_retries: 3,
            enable_ai_backfill: true,
            enable_month_locking: true,
            related_isbns_existing_wins: true,
            backfill_job_status_ttl_days: 7,
            enable_google_books_enrichment: true,
            supplementary_fetch_budget: Duration::from_secs(30),
            webhook_url: None,
            webhook_secret: String::new(),
            author_defer_usage_fraction: 0.85,
            author_high_priority_usage_fraction: 0.70,
            cover_storage_base_url: "alexandria-covers".to_string(),
            cover_cdn_base_url: "https://covers.alexandria.example".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from (in increasing priority) built-in defaults,
    /// a `.env` file if present, and `ALEXANDRIA_*` environment variables.
    pub fn load() -> Result<Self, crate::CoreError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let built = config::Config::builder()
            .set_default("database_url", defaults.database_url.clone())?
            .set_default("redis_url", defaults.redis_url.clone())?
            .set_default("kafka_brokers", defaults.kafka_brokers.clone())?
            .set_default("isbndb_daily_limit", defaults.isbndb_daily_limit)?
            .set_default("isbndb_safety_buffer", defaults.isbndb_safety_buffer)?
            .set_default("resolver_timeout", defaults.resolver_timeout.as_millis() as i64)?
            .set_default("cover_timeout", defaults.cover_timeout.as_millis() as i64)?
            .set_default("generator_timeout", defaults.generator_timeout.as_millis() as i64)?
            .set_default("variant_timeout", defaults.variant_timeout.as_millis() as i64)?
            .set_default("provider_max_concurrency", defaults.provider_max_concurrency)?
            .set_default("consumer_batch_size", defaults.consumer_batch_size)?
            .set_default("consumer_max_retries", defaults.consumer_max_retries)?
            .set_default("enable_ai_backfill", defaults.enable_ai_backfill)?
            .set_default("enable_month_locking", defaults.enable_month_locking)?
            .set_default(
                "related_isbns_existing_wins",
                defaults.related_isbns_existing_wins,
            )?
            .set_default(
                "backfill_job_status_ttl_days",
                defaults.backfill_job_status_ttl_days,
            )?
            .set_default(
                "enable_google_books_enrichment",
                defaults.enable_google_books_enrichment,
            )?
            .set_default(
                "supplementary_fetch_budget",
                defaults.supplementary_fetch_budget.as_millis() as i64,
            )?
            .set_default("webhook_secret", defaults.webhook_secret.clone())?
            .set_default("author_defer_usage_fraction", defaults.author_defer_usage_fraction)?
            .set_default(
                "author_high_priority_usage_fraction",
                defaults.author_high_priority_usage_fraction,
            )?
            .set_default("cover_storage_base_url", defaults.cover_storage_base_url.clone())?
            .set_default("cover_cdn_base_url", defaults.cover_cdn_base_url.clone())?
            .add_source(
                config::Environment::with_prefix("ALEXANDRIA")
                    .try_parsing(true)
                    .separator("_"),
            )
            .build()?;

        Ok(built.try_deserialize()?)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = EngineConfig::default();
        assert!(config.isbndb_safety_buffer < config.isbndb_daily_limit);
        assert!(config.resolver_timeout.as_millis() > 0);
        assert!(config.generator_timeout > config.variant_timeout);
    }
}
