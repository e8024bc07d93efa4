//! Synthetic-record persistence and deferred enhancement (spec §4.6).
//! Every generated candidate is written immediately as a minimal
//! `synthetic=true` work (plus a minimal author and edition, when enough
//! is known) so AI output is never lost even if ISBN resolution later
//! fails or the process crashes mid-job. A separate pass later promotes
//! synthetic works toward full enrichment once ISBN resolution succeeds.
//!
//! Grounded on `ferrumyx::pg_repository::PgIngestionRepository`'s
//! select-then-branch raw-SQL-via-sqlx idiom (same one `alexandria-merge`'s
//! writer uses for editions), extended here to the `works`/`authors`/
//! `work_authors_enriched` tables spec §6 names.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use alexandria_core::entities::{Author, Edition, Work};
use alexandria_dedup::resolve_author_key;
use alexandria_providers::{GeneratedBook, ProviderRegistry, ResolveQuery};

use crate::error::Result;

/// Slugify per spec §4.6: lowercase, strip non-word characters, spaces to
/// hyphens, truncated (titles to 50 chars, authors to 30) so the resulting
/// key stays bounded regardless of how verbose the AI's output is.
fn slug(input: &str, max_len: usize) -> String {
    let lowered = input.to_lowercase();
    let filtered: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let hyphenated = filtered.split_whitespace().collect::<Vec<_>>().join("-");
    hyphenated.chars().take(max_len).collect()
}

/// `synthetic:<slug-of-title>:<slug-of-author>` (spec §4.6).
pub fn synthetic_work_key(title: &str, author: &str) -> String {
    format!("synthetic:{}:{}", slug(title, 50), slug(author, 30))
}

/// Everything the synthetic-persistence and deferred-enhancement stages
/// need from storage, kept as a trait so `BackfillOrchestrator` can be
/// exercised without a live Postgres.
#[async_trait]
pub trait SyntheticStore: Send + Sync {
    /// Upsert a minimal synthetic work (+ author + work/author link) for
    /// `candidate`. Never overwrites a pre-existing non-synthetic work at
    /// the same key (spec §4.6: "do not overwrite existing data sourced
    /// from a more authoritative provider"). Returns the work_key.
    async fn upsert_synthetic_work(&self, candidate: &GeneratedBook) -> Result<String>;

    /// Upsert a minimal synthetic edition for `candidate.isbn`, iff one
    /// doesn't already exist. A no-op when `candidate.isbn` is `None` or an
    /// edition row for it is already present.
    async fn upsert_synthetic_edition(&self, work_key: &str, candidate: &GeneratedBook) -> Result<bool>;

    /// Select up to `limit` synthetic works due for the deferred
    /// enhancement pass (spec §4.6): `completeness_score < 50` and
    /// `last_isbndb_sync` null or stale, locked with `FOR UPDATE SKIP
    /// LOCKED` so concurrent workers never race on the same row. Returns
    /// (work_key, title, linked author name if any).
    async fn select_for_enhancement(&self, limit: i64) -> Result<Vec<(String, Option<String>, Option<String>)>>;

    /// Record the outcome of one deferred-enhancement attempt: bump
    /// `completeness_score` (80 on a successful enqueue, 40 otherwise) and
    /// stamp `last_isbndb_sync = now()` regardless of outcome.
    async fn record_enhancement_attempt(&self, work_key: &str, enqueued: bool) -> Result<()>;
}

pub struct PostgresSyntheticStore {
    pool: PgPool,
}

impl PostgresSyntheticStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
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

    async fn load_edition(&self, isbn: &str) -> Result<Option<Edition>> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM enriched_editions WHERE isbn = $1")
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

    async fn upsert_author_and_link(&self, work_key: &str, author_name: &str) -> Result<()> {
        // `resolve_author_key` mints a random key when no external id is
        // known, so dedup against a repeat call for the same name has to
        // go through the DB by name rather than by recomputing the key.
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
                author.name = Some(author_name.to_string());
                author.primary_provider = Some("gemini-backfill".to_string());
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
                author_key
            }
        };

        sqlx::query(
            r#"
            INSERT INTO work_authors_enriched (work_key, author_key, author_order)
            VALUES ($1, $2, 0)
            ON CONFLICT (work_key, author_key) DO NOTHING
            "#,
        )
        .bind(work_key)
        .bind(&author_key)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SyntheticStore for PostgresSyntheticStore {
    async fn upsert_synthetic_work(&self, candidate: &GeneratedBook) -> Result<String> {
        let work_key = synthetic_work_key(&candidate.title, &candidate.author);
        let now = Utc::now();

        match self.load_work(&work_key).await? {
            Some(existing) if !existing.synthetic => {
                // A non-synthetic (authoritative) work already occupies this
                // key; leave it untouched (spec §4.6).
            }
            Some(mut existing) => {
                if existing.title.is_none() {
                    existing.title = Some(candidate.title.clone());
                }
                if existing.description.is_none() {
                    existing.description = candidate.description.clone();
                }
                if existing.first_publication_year.is_none() {
                    existing.first_publication_year = candidate.first_publication_year;
                }
                existing.subject_tags = alexandria_core::entities::union_subject_tags(
                    &existing.subject_tags,
                    &candidate.subject_tags,
                );
                alexandria_core::entities::append_contributor(&mut existing.contributors, "gemini-backfill");
                existing.updated_at = now;
                self.save_work(&existing).await?;
            }
            None => {
                let mut work = Work::new(work_key.clone(), now);
                work.title = Some(candidate.title.clone());
                work.description = candidate.description.clone();
                work.first_publication_year = candidate.first_publication_year;
                work.subject_tags = candidate.subject_tags.iter().map(|t| alexandria_core::entities::normalize_subject_tag(t)).collect();
                work.primary_provider = Some("gemini-backfill".to_string());
                work.contributors.push("gemini-backfill".to_string());
                work.completeness_score = 30;
                work.synthetic = true;
                self.save_work(&work).await?;
            }
        }

        self.upsert_author_and_link(&work_key, &candidate.author).await?;
        Ok(work_key)
    }

    async fn upsert_synthetic_edition(&self, work_key: &str, candidate: &GeneratedBook) -> Result<bool> {
        let Some(isbn) = &candidate.isbn else {
            return Ok(false);
        };

        if self.load_edition(isbn).await?.is_some() {
            // An edition already exists for this ISBN, whether synthetic or
            // authoritative; never overwrite it from here (spec §4.6).
            return Ok(false);
        }

        let now = Utc::now();
        let mut edition = Edition::new(isbn.clone(), now);
        edition.title = Some(candidate.title.clone());
        edition.work_key = Some(work_key.to_string());
        edition.work_match_confidence = Some(50);
        edition.work_match_source = Some("gemini-synthetic".to_string());
        edition.primary_provider = Some("gemini-backfill".to_string());
        edition.contributors.push("gemini-backfill".to_string());
        edition.completeness_score = 30;
        self.save_edition(&edition).await?;
        Ok(true)
    }

    async fn select_for_enhancement(&self, limit: i64) -> Result<Vec<(String, Option<String>, Option<String>)>> {
        let rows: Vec<(String, serde_json::Value, Option<String>)> = sqlx::query_as(
            r#"
            SELECT w.work_key, w.data, a.data->>'name' AS author_name
            FROM enriched_works w
            LEFT JOIN work_authors_enriched wa ON wa.work_key = w.work_key AND wa.author_order = 0
            LEFT JOIN enriched_authors a ON a.author_key = wa.author_key
            WHERE (w.data->>'synthetic')::boolean = true
              AND COALESCE((w.data->>'completeness_score')::int, 0) < 50
              AND (
                w.data->>'last_isbndb_sync' IS NULL
                OR (w.data->>'last_isbndb_sync')::timestamptz < NOW() - INTERVAL '7 days'
              )
            ORDER BY w.updated_at ASC
            LIMIT $1
            FOR UPDATE OF w SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for (work_key, data, author_name) in rows {
            let work: Work = serde_json::from_value(data)?;
            out.push((work_key, work.title, author_name));
        }
        Ok(out)
    }

    async fn record_enhancement_attempt(&self, work_key: &str, enqueued: bool) -> Result<()> {
        let score: i32 = if enqueued { 80 } else { 40 };
        sqlx::query(
            r#"
            UPDATE enriched_works
            SET data = jsonb_set(
                    jsonb_set(data, '{completeness_score}', to_jsonb($2::int)),
                    '{last_isbndb_sync}', to_jsonb(NOW())
                ),
                updated_at = NOW()
            WHERE work_key = $1
            "#,
        )
        .bind(work_key)
        .bind(score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// The ISBN-resolution + enqueue pass that runs over rows
/// `select_for_enhancement` returns. Kept as a free function rather than a
/// `SyntheticStore` method so it can take `&ProviderRegistry` and an
/// enqueue sink without forcing generics onto the (dyn-dispatched) trait.
pub async fn run_deferred_enhancement(
    store: &dyn SyntheticStore,
    registry: &ProviderRegistry,
    enqueuer: &dyn super::EnrichmentEnqueuer,
    limit: i64,
) -> Result<u32> {
    let candidates = store.select_for_enhancement(limit).await?;
    let mut enhanced = 0;

    for (work_key, title, author_name) in candidates {
        let Some(title) = title else {
            store.record_enhancement_attempt(&work_key, false).await?;
            continue;
        };

        let query = ResolveQuery {
            title: Some(title),
            author: author_name,
            isbn: None,
            publisher: None,
            format: None,
        };

        let resolved = alexandria_providers::resolve_isbn_cascade(registry, &query).await?;
        match resolved {
            Some(resolved) => {
                let enqueued = enqueuer.enqueue(&resolved.isbn, "backfill-enhancement").await;
                store.record_enhancement_attempt(&work_key, enqueued).await?;
                if enqueued {
                    enhanced += 1;
                }
            }
            None => {
                store.record_enhancement_attempt(&work_key, false).await?;
            }
        }
    }

    Ok(enhanced)
}
