//! Enrichment Writer (spec §4.2): the only component allowed to mutate
//! `Edition`/`Work`/`Author` rows. Grounded on
//! `ferrumyx::pg_repository::PgIngestionRepository::upsert_paper` (select
//! existing row, branch new-vs-existing, write an audit row alongside the
//! data write) and `ingestion::repository::{ContentRepository,
//! PostgresContentRepository}` for the trait/impl split.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use alexandria_core::entities::{Author, Edition, EnrichmentLog, EnrichmentOperation, EntityType, Work};
use alexandria_dedup::resolve_author_key;
use alexandria_providers::ProviderEditionRecord;

use crate::error::Result;
use crate::rules::{merge_edition, merge_work};

/// Everything that mutates edition/work/author rows goes through this
/// trait, so `alexandria-consumers` can depend on a `dyn EnrichmentWriter`
/// without committing to Postgres in its own tests.
#[async_trait]
pub trait EnrichmentWriter: Send + Sync {
    /// Merge `incoming` into the edition for `isbn`, creating the row if
    /// absent. Returns the fields that actually changed.
    async fn upsert_edition(&self, isbn: &str, incoming: &ProviderEditionRecord) -> Result<Vec<String>>;

    /// Replace the edition's cover with a canonically re-hosted one (spec
    /// §4.3.2 step c). Unlike `upsert_edition`'s field-level COALESCE, this
    /// is a deliberate overwrite: once the cover consumer has re-hosted a
    /// provider's cover at a stable CDN URL, that URL is strictly better
    /// than whatever raw provider URL `cover.coalesce` would have frozen in
    /// place on the first enrichment pass.
    async fn set_cover(&self, isbn: &str, cdn_url: &str, cover_source: &str) -> Result<()>;

    /// Merge a provider's contribution (title/subtitle/year/genre tags)
    /// into the work for `work_key`, creating the row if absent. Returns
    /// the fields that actually changed.
    #[allow(clippy::too_many_arguments)]
    async fn upsert_work(
        &self,
        work_key: &str,
        source: &str,
        title: Option<&String>,
        subtitle: Option<&String>,
        first_publication_year: Option<i32>,
        subject_tags: &[String],
    ) -> Result<Vec<String>>;

    /// Persist `work_key` onto the edition for `isbn` if it doesn't
    /// already have one, and return whichever key ends up stored — the
    /// one just passed in, or a prior call's key if this edition was
    /// already linked. This is how a randomly-minted synthetic work key
    /// (see `alexandria_dedup::resolve_work_key`) stays stable across
    /// repeated enrichment passes for the same ISBN.
    async fn link_edition_work(&self, isbn: &str, work_key: &str) -> Result<String>;

    /// Ensure an author row exists for each of `author_names` (creating a
    /// minimal stub if none matches by name yet) and link each to
    /// `work_key` in `work_authors_enriched`, preserving `author_names`'
    /// order as `author_order`.
    async fn link_work_authors(&self, work_key: &str, author_names: &[String]) -> Result<()>;
}

pub struct PostgresEnrichmentWriter {
    pool: PgPool,
    related_isbns_existing_wins: bool,
}

impl PostgresEnrichmentWriter {
    pub fn new(pool: PgPool, related_isbns_existing_wins: bool) -> Self {
        Self {
            pool,
            related_isbns_existing_wins,
        }
    }

    async fn load_edition(&self, isbn: &str) -> Result<Option<Edition>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT data FROM enriched_editions WHERE isbn = $1")
                .bind(isbn)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((data,)) => Ok(Some(serde_json::from_value(data)?)),
            None => Ok(None),
        }
    }

    async fn save_edition(&self, edition: &Edition) -> Result<()> {
        let data = serde_json::to_value(edition)?;
        sqlx::query(
            r#"
            INSERT INTO enriched_editions (isbn, data, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (isbn) DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&edition.isbn)
        .bind(&data)
        .bind(edition.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_work(&self, work_key: &str) -> Result<Option<Work>> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM enriched_works WHERE work_key = $1")
            .bind(work_key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((data,)) => Ok(Some(serde_json::from_value(data)?)),
            None => Ok(None),
        }
    }

    async fn save_work(&self, work: &Work) -> Result<()> {
        let data = serde_json::to_value(work)?;
        sqlx::query(
            r#"
            INSERT INTO enriched_works (work_key, data, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (work_key) DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&work.work_key)
        .bind(&data)
        .bind(work.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn log_enrichment(
        &self,
        entity_type: EntityType,
        entity_key: &str,
        provider: &str,
        operation: EnrichmentOperation,
        fields_updated: &[String],
    ) -> Result<()> {
        let log = EnrichmentLog {
            entity_type,
            entity_key: entity_key.to_string(),
            provider: provider.to_string(),
            operation,
            success: true,
            fields_updated: fields_updated.to_vec(),
            error_message: None,
            response_time_ms: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO enrichment_log
                (entity_type, entity_key, provider, operation, success, fields_updated, error_message, response_time_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(serde_json::to_value(&log.entity_type)?)
        .bind(&log.entity_key)
        .bind(&log.provider)
        .bind(serde_json::to_value(&log.operation)?)
        .bind(log.success)
        .bind(serde_json::to_value(&log.fields_updated)?)
        .bind(&log.error_message)
        .bind(log.response_time_ms)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EnrichmentWriter for PostgresEnrichmentWriter {
    async fn upsert_edition(&self, isbn: &str, incoming: &ProviderEditionRecord) -> Result<Vec<String>> {
        let (mut edition, operation) = match self.load_edition(isbn).await? {
            Some(existing) => (existing, EnrichmentOperation::Update),
            None => (Edition::new(isbn.to_string(), Utc::now()), EnrichmentOperation::Create),
        };

        let outcome = merge_edition(&mut edition, incoming, self.related_isbns_existing_wins);
        edition.updated_at = Utc::now();

        self.save_edition(&edition).await?;

        let fields_updated: Vec<String> = outcome.fields_updated.iter().map(|f| f.to_string()).collect();
        self.log_enrichment(EntityType::Edition, isbn, &incoming.source, operation, &fields_updated)
            .await?;

        Ok(fields_updated)
    }

    async fn set_cover(&self, isbn: &str, cdn_url: &str, cover_source: &str) -> Result<()> {
        let (mut edition, operation) = match self.load_edition(isbn).await? {
            Some(existing) => (existing, EnrichmentOperation::Update),
            None => (Edition::new(isbn.to_string(), Utc::now()), EnrichmentOperation::Create),
        };

        edition.cover.original = Some(cdn_url.to_string());
        edition.cover_source = Some(cover_source.to_string());
        edition.updated_at = Utc::now();

        self.save_edition(&edition).await?;
        self.log_enrichment(
            EntityType::Edition,
            isbn,
            cover_source,
            operation,
            &["cover".to_string(), "cover_source".to_string()],
        )
        .await?;
        Ok(())
    }

    async fn upsert_work(
        &self,
        work_key: &str,
        source: &str,
        title: Option<&String>,
        subtitle: Option<&String>,
        first_publication_year: Option<i32>,
        subject_tags: &[String],
    ) -> Result<Vec<String>> {
        let (mut work, operation) = match self.load_work(work_key).await? {
            Some(existing) => (existing, EnrichmentOperation::Update),
            None => (Work::new(work_key.to_string(), Utc::now()), EnrichmentOperation::Create),
        };

        let outcome = merge_work(&mut work, source, title, subtitle, first_publication_year, subject_tags);
        work.updated_at = Utc::now();

        self.save_work(&work).await?;

        let fields_updated: Vec<String> = outcome.fields_updated.iter().map(|f| f.to_string()).collect();
        self.log_enrichment(EntityType::Work, work_key, source, operation, &fields_updated)
            .await?;

        Ok(fields_updated)
    }

    async fn link_edition_work(&self, isbn: &str, work_key: &str) -> Result<String> {
        let (mut edition, operation) = match self.load_edition(isbn).await? {
            Some(existing) => (existing, EnrichmentOperation::Update),
            None => (Edition::new(isbn.to_string(), Utc::now()), EnrichmentOperation::Create),
        };

        if let Some(existing_key) = &edition.work_key {
            return Ok(existing_key.clone());
        }

        edition.work_key = Some(work_key.to_string());
        edition.updated_at = Utc::now();
        self.save_edition(&edition).await?;
        self.log_enrichment(EntityType::Edition, isbn, "dedup", operation, &["work_key".to_string()])
            .await?;

        Ok(work_key.to_string())
    }

    async fn link_work_authors(&self, work_key: &str, author_names: &[String]) -> Result<()> {
        for (order, author_name) in author_names.iter().enumerate() {
            let existing: Option<(String,)> =
                sqlx::query_as("SELECT author_key FROM enriched_authors WHERE data->>'name' = $1")
                    .bind(author_name)
                    .fetch_optional(&self.pool)
                    .await?;

            let author_key = match existing {
                Some((key,)) => key,
                None => {
                    let author_key = resolve_author_key(None);
                    let mut author = Author::new(author_key.clone(), Utc::now());
                    author.name = Some(author_name.clone());
                    let data = serde_json::to_value(&author)?;
                    sqlx::query(
                        r#"
                        INSERT INTO enriched_authors (author_key, data, updated_at)
                        VALUES ($1, $2, $3)
                        ON CONFLICT (author_key) DO NOTHING
                        "#,
                    )
                    .bind(&author_key)
                    .bind(&data)
                    .bind(author.updated_at)
                    .execute(&self.pool)
                    .await?;
                    self.log_enrichment(EntityType::Author, &author_key, "dedup", EnrichmentOperation::Create, &[])
                        .await?;
                    author_key
                }
            };

            sqlx::query(
                r#"
                INSERT INTO work_authors_enriched (work_key, author_key, author_order)
                VALUES ($1, $2, $3)
                ON CONFLICT (work_key, author_key) DO NOTHING
                "#,
            )
            .bind(work_key)
            .bind(&author_key)
            .bind(order as i32)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}
