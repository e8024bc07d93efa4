//! Shared startup plumbing for every worker subcommand: one place that
//! builds the DB pool, Redis-backed KV store, provider registry, and the
//! writers/stores each consumer needs. Mirrors the teacher's `main.rs`
//! pattern of validating required secrets via `std::env::var` before the
//! process does anything else, generalized across five provider API keys
//! instead of one `JWT_SECRET`.

use std::num::NonZeroU32;
use std::sync::Arc;

use alexandria_backfill::{BackfillLogStore, JobStatusStore, KvJobStatusStore, PostgresBackfillLogStore, PostgresSyntheticStore, SyntheticStore};
use alexandria_core::EngineConfig;
use alexandria_kv::RedisKvStore;
use alexandria_locks::{MonthLock, PostgresMonthLock};
use alexandria_merge::{AuthorWriter, EnrichmentWriter, PostgresAuthorWriter, PostgresEnrichmentWriter};
use alexandria_providers::providers::archive_org::ArchiveOrgProvider;
use alexandria_providers::providers::gemini::GeminiProvider;
use alexandria_providers::providers::google_books::GoogleBooksProvider;
use alexandria_providers::providers::isbndb::IsbndbProvider;
use alexandria_providers::providers::librarything::LibraryThingProvider;
use alexandria_providers::providers::openlibrary::OpenLibraryProvider;
use alexandria_providers::providers::wikidata::WikidataProvider;
use alexandria_providers::providers::xai::XaiProvider;
use alexandria_providers::rate_limit::ProviderRateLimiter;
use alexandria_providers::{AuthorProvider, GenerativeProvider, MetadataProvider, ProviderRegistry};
use alexandria_quota::QuotaManager;
use sqlx::postgres::PgPoolOptions;

fn rps(n: u32) -> Arc<ProviderRateLimiter> {
    Arc::new(ProviderRateLimiter::new(NonZeroU32::new(n).expect("nonzero rate")))
}

pub struct Engine {
    pub config: EngineConfig,
    pub db: sqlx::PgPool,
    pub kv: Arc<RedisKvStore>,
    pub http: reqwest::Client,
    pub registry: Arc<ProviderRegistry>,
    pub wikidata: Arc<dyn AuthorProvider>,
    pub generators: Vec<Arc<dyn GenerativeProvider>>,
    pub quota: Arc<QuotaManager<RedisKvStore>>,
    pub writer: Arc<dyn EnrichmentWriter>,
    pub author_writer: Arc<dyn AuthorWriter>,
    pub month_lock: Arc<dyn MonthLock>,
    pub job_status: Arc<dyn JobStatusStore>,
    pub backfill_log: Arc<dyn BackfillLogStore>,
    pub synthetic_store: Arc<dyn SyntheticStore>,
}

impl Engine {
    pub async fn connect(config: EngineConfig) -> anyhow::Result<Self> {
        let isbndb_api_key =
            std::env::var("ISBNDB_API_KEY").map_err(|_| anyhow::anyhow!("ISBNDB_API_KEY must be set"))?;
        let google_books_api_key = std::env::var("GOOGLE_BOOKS_API_KEY").ok();
        let librarything_api_key = std::env::var("LIBRARYTHING_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        let xai_api_key = std::env::var("XAI_API_KEY").ok();

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        let kv = Arc::new(RedisKvStore::connect(&config.redis_url).await?);

        // No blanket timeout: each provider applies its own per-call timeout
        // (spec §10) since resolver/cover/generator/variant calls have very
        // different latency budgets and a single shared value starved the
        // 60s-budgeted generative calls down to the resolver's ~10s default.
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()?;

        let isbndb = Arc::new(IsbndbProvider::new(http.clone(), isbndb_api_key, rps(5), config.resolver_timeout));
        let google_books = Arc::new(GoogleBooksProvider::new(
            http.clone(),
            google_books_api_key,
            rps(2),
            config.resolver_timeout,
        ));
        let openlibrary = Arc::new(OpenLibraryProvider::new(
            http.clone(),
            rps(1),
            config.resolver_timeout,
            config.variant_timeout,
        ));
        let archive_org = Arc::new(ArchiveOrgProvider::new(http.clone(), rps(1), config.cover_timeout));
        let librarything = Arc::new(LibraryThingProvider::new(http.clone(), rps(1), librarything_api_key));
        let wikidata_provider = Arc::new(WikidataProvider::new(http.clone(), rps(1), config.resolver_timeout));

        // Spec's named 5-tier cascade (isbndb, google-books, open-library,
        // archive-org, wikidata) plus librarything appended so
        // `fetch_edition_variants`'s second source stays reachable through
        // the same registry.
        let providers: Vec<Arc<dyn MetadataProvider>> = vec![
            isbndb,
            google_books,
            openlibrary,
            archive_org,
            wikidata_provider.clone(),
            librarything,
        ];
        let registry = Arc::new(ProviderRegistry::new(providers));

        let wikidata: Arc<dyn AuthorProvider> = wikidata_provider;

        let mut generators: Vec<Arc<dyn GenerativeProvider>> = Vec::new();
        if config.enable_ai_backfill {
            if let Some(key) = gemini_api_key {
                generators.push(Arc::new(GeminiProvider::new(http.clone(), key, config.generator_timeout)));
            }
            if let Some(key) = xai_api_key {
                generators.push(Arc::new(XaiProvider::new(http.clone(), key, config.generator_timeout)));
            }
        }

        let quota = Arc::new(QuotaManager::new(kv.clone(), config.isbndb_daily_limit, config.isbndb_safety_buffer));

        let writer: Arc<dyn EnrichmentWriter> =
            Arc::new(PostgresEnrichmentWriter::new(db.clone(), config.related_isbns_existing_wins));
        let author_writer: Arc<dyn AuthorWriter> = Arc::new(PostgresAuthorWriter::new(db.clone()));
        let month_lock: Arc<dyn MonthLock> = Arc::new(PostgresMonthLock::new(db.clone()));
        let job_status: Arc<dyn JobStatusStore> =
            Arc::new(KvJobStatusStore::new(kv.clone(), config.backfill_job_status_ttl_days));
        let backfill_log: Arc<dyn BackfillLogStore> = Arc::new(PostgresBackfillLogStore::new(db.clone()));
        let synthetic_store: Arc<dyn SyntheticStore> = Arc::new(PostgresSyntheticStore::new(db.clone()));

        Ok(Self {
            config,
            db,
            kv,
            http,
            registry,
            wikidata,
            generators,
            quota,
            writer,
            author_writer,
            month_lock,
            job_status,
            backfill_log,
            synthetic_store,
        })
    }

    pub fn s3_client(&self) -> anyhow::Result<aws_sdk_s3::Client> {
        let access_key = std::env::var("S3_ACCESS_KEY_ID").map_err(|_| anyhow::anyhow!("S3_ACCESS_KEY_ID must be set"))?;
        let secret_key =
            std::env::var("S3_SECRET_ACCESS_KEY").map_err(|_| anyhow::anyhow!("S3_SECRET_ACCESS_KEY must be set"))?;
        let endpoint_url = std::env::var("S3_ENDPOINT_URL").map_err(|_| anyhow::anyhow!("S3_ENDPOINT_URL must be set"))?;
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string());

        let credentials = aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "alexandria-worker");
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region))
            .endpoint_url(endpoint_url)
            .credentials_provider(credentials)
            .build();
        Ok(aws_sdk_s3::Client::from_conf(config))
    }

    pub fn webhook(&self) -> alexandria_consumers::WebhookNotifier {
        alexandria_consumers::WebhookNotifier::new(self.http.clone(), self.config.webhook_url.clone(), self.config.webhook_secret.clone())
    }
}
