//! # Alexandria Consumers
//!
//! The four push/pull-path queue consumers (spec §4.3): enrichment
//! (ISBNdb primary + Google Books supplementary), cover (fetch/store/point
//! at CDN), author (just-in-time Wikidata enrichment), and backfill (wraps
//! `alexandria-backfill`'s orchestrator). Plus the shared ingress wire
//! schemas, error taxonomy, negative cache, webhook notifier, and the
//! Kafka queue substrate they all run on.

pub mod author;
pub mod backfill_consumer;
pub mod cover;
pub mod enrichment;
pub mod error;
pub mod messages;
pub mod negative_cache;
pub mod queue;
pub mod webhook;

pub use author::AuthorConsumer;
pub use backfill_consumer::BackfillConsumer;
pub use cover::{CoverConsumer, CoverProcessor, PassthroughCoverProcessor};
pub use enrichment::{BatchSummary, CoverJob, EnrichmentConsumer};
pub use error::{ConsumerError, Disposition, Result};
pub use negative_cache::NegativeCache;
pub use queue::{KafkaConsumer, KafkaProducer};
pub use webhook::WebhookNotifier;
