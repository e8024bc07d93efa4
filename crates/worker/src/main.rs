//! Alexandria worker: one binary, five subcommands, each driving a queue
//! consumer (or the tiny health server) to completion. Grounded on the
//! teacher's `api::main` bootstrap shape — required-env-var validation,
//! `tracing_subscriber` JSON logging, `tokio::select!` graceful shutdown —
//! generalized from a single HTTP gateway process into a `clap` dispatcher
//! over the four queue consumers plus a standalone health server, since
//! nothing in this workspace plays that role yet.

mod bootstrap;
mod health;
mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use alexandria_backfill::BackfillOrchestrator;
use alexandria_consumers::{AuthorConsumer, BackfillConsumer, CoverConsumer, Disposition, EnrichmentConsumer, KafkaConsumer, KafkaProducer, PassthroughCoverProcessor, WebhookNotifier};
use alexandria_consumers::messages::{AuthorMessage, BackfillMessage, CoverMessage, EnrichmentMessage};
use alexandria_core::EngineConfig;
use bootstrap::Engine;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "alexandria-worker", about = "Alexandria queue consumer worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drain `enrichment-queue` (spec §4.3.1).
    Enrichment,
    /// Drain `cover-queue` (spec §4.3.2).
    Cover,
    /// Drain `author-queue` (spec §4.3.3).
    Author,
    /// Drain `backfill-queue` (spec §4.3.4).
    Backfill,
    /// Run all four consumers concurrently in one process.
    RunAll,
    /// Serve only the health/ready/liveness endpoints.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    alexandria_core::logging::init();

    let cli = Cli::parse();
    let config = EngineConfig::load()?;
    let engine = Arc::new(Engine::connect(config).await?);

    match cli.command {
        Command::Enrichment => run_enrichment(engine).await,
        Command::Cover => run_cover(engine).await,
        Command::Author => run_author(engine).await,
        Command::Backfill => run_backfill(engine).await,
        Command::Health => health::serve(health::HealthState { db: engine.db.clone() }, 8080).await.map_err(Into::into),
        Command::RunAll => {
            let health_handle = {
                let db = engine.db.clone();
                tokio::spawn(async move { health::serve(health::HealthState { db }, 8080).await })
            };
            tokio::try_join!(
                run_enrichment(engine.clone()),
                run_cover(engine.clone()),
                run_author(engine.clone()),
                run_backfill(engine.clone()),
            )?;
            health_handle.abort();
            Ok(())
        }
    }
}

async fn run_enrichment(engine: Arc<Engine>) -> anyhow::Result<()> {
    let producer = Arc::new(KafkaProducer::new(&engine.config.kafka_brokers)?);
    let webhook = Arc::new(WebhookNotifier::new(
        engine.http.clone(),
        engine.config.webhook_url.clone(),
        engine.config.webhook_secret.clone(),
    ));
    let consumer = EnrichmentConsumer::new(
        engine.registry.clone(),
        engine.writer.clone(),
        engine.kv.clone(),
        engine.quota.clone(),
        webhook,
        engine.wikidata.clone(),
        engine.config.enable_google_books_enrichment,
        engine.config.supplementary_fetch_budget,
    );

    let kafka = KafkaConsumer::new(&engine.config.kafka_brokers, "alexandria-enrichment", &["enrichment-queue"])?;
    let shutdown = tokio::spawn(shutdown::wait());

    let run = kafka.run(|payload| {
        let consumer = &consumer;
        let producer = producer.clone();
        async move {
            let message = match EnrichmentMessage::parse(&payload) {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(error = %err, "poison enrichment message, acking without retry");
                    return Disposition::Ack;
                }
            };
            let (summary, disposition) = consumer.process_message(&message).await;
            tracing::info!(
                processed = summary.processed,
                enriched = summary.enriched,
                not_found = summary.not_found,
                failed = summary.failed,
                "enrichment batch processed"
            );
            for job in &summary.cover_jobs {
                if let Err(err) = producer.enqueue_cover(&job.isbn, job.provider_url.as_deref()).await {
                    tracing::error!(isbn = job.isbn, error = %err, "failed to enqueue cover job");
                }
            }
            disposition
        }
    });

    tokio::select! {
        result = run => result.map_err(Into::into),
        _ = shutdown => { tracing::info!("enrichment consumer shutting down"); Ok(()) }
    }
}

async fn run_cover(engine: Arc<Engine>) -> anyhow::Result<()> {
    let s3 = engine.s3_client()?;
    let processor = Arc::new(PassthroughCoverProcessor);
    let consumer = CoverConsumer::new(
        engine.registry.clone(),
        engine.writer.clone(),
        processor,
        engine.http.clone(),
        s3,
        engine.config.cover_storage_base_url.clone(),
        engine.config.cover_cdn_base_url.clone(),
    );

    let kafka = KafkaConsumer::new(&engine.config.kafka_brokers, "alexandria-cover", &["cover-queue"])?;
    let shutdown = tokio::spawn(shutdown::wait());

    let run = kafka.run(|payload| {
        let consumer = &consumer;
        async move {
            let message = match CoverMessage::parse(&payload) {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(error = %err, "poison cover message, acking without retry");
                    return Disposition::Ack;
                }
            };
            consumer.process_message(&message).await
        }
    });

    tokio::select! {
        result = run => result.map_err(Into::into),
        _ = shutdown => { tracing::info!("cover consumer shutting down"); Ok(()) }
    }
}

async fn run_author(engine: Arc<Engine>) -> anyhow::Result<()> {
    let consumer = AuthorConsumer::new(
        engine.wikidata.clone(),
        engine.author_writer.clone(),
        engine.quota.clone(),
        engine.config.author_defer_usage_fraction,
        engine.config.author_high_priority_usage_fraction,
    );

    let kafka = KafkaConsumer::new(&engine.config.kafka_brokers, "alexandria-author", &["author-queue"])?;
    let shutdown = tokio::spawn(shutdown::wait());
    let batch_size = engine.config.consumer_batch_size as usize;

    let run = kafka.run_batched(batch_size, Duration::from_secs(2), |payloads| {
        let consumer = &consumer;
        async move {
            let mut messages = Vec::with_capacity(payloads.len());
            let mut dispositions = vec![Disposition::Ack; payloads.len()];
            let mut index_by_key: std::collections::HashMap<String, Vec<usize>> = std::collections::HashMap::new();

            for (idx, payload) in payloads.iter().enumerate() {
                match AuthorMessage::parse(payload) {
                    Ok(message) => {
                        index_by_key.entry(message.author_key.clone()).or_default().push(idx);
                        messages.push(message);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "poison author message, acking without retry");
                    }
                }
            }

            let results = consumer.process_batch(&messages).await;
            for (author_key, disposition) in results {
                if let Some(indices) = index_by_key.get(&author_key) {
                    for &idx in indices {
                        dispositions[idx] = disposition;
                    }
                }
            }
            dispositions
        }
    });

    tokio::select! {
        result = run => result.map_err(Into::into),
        _ = shutdown => { tracing::info!("author consumer shutting down"); Ok(()) }
    }
}

async fn run_backfill(engine: Arc<Engine>) -> anyhow::Result<()> {
    let producer = Arc::new(KafkaProducer::new(&engine.config.kafka_brokers)?);
    let orchestrator = Arc::new(BackfillOrchestrator::new(
        engine.job_status.clone(),
        engine.backfill_log.clone(),
        engine.synthetic_store.clone(),
        engine.month_lock.clone(),
        engine.registry.clone(),
        engine.generators.clone(),
        producer,
        engine.quota.clone(),
        engine.config.enable_month_locking,
    ));
    let consumer = BackfillConsumer::new(orchestrator);

    let kafka = KafkaConsumer::new(&engine.config.kafka_brokers, "alexandria-backfill", &["backfill-queue"])?;
    let shutdown = tokio::spawn(shutdown::wait());

    let run = kafka.run(|payload| {
        let consumer = &consumer;
        async move {
            let message = match BackfillMessage::parse(&payload) {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(error = %err, "poison backfill message, acking without retry");
                    return Disposition::Ack;
                }
            };
            consumer.process_message(&message).await
        }
    });

    tokio::select! {
        result = run => result.map_err(Into::into),
        _ = shutdown => { tracing::info!("backfill consumer shutting down"); Ok(()) }
    }
}
