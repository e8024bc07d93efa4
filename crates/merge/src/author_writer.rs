//! Author-record writer (spec §4.3.3): `COALESCE(new, existing)` per field,
//! the same monotone shape as `rules::merge_edition` but simpler — Wikidata
//! is the sole contributor to these fields, so there is no multi-provider
//! union/append logic to apply, only "don't overwrite what we already
//! trust." Split out from `writer.rs` because it mutates a distinct table
//! (`enriched_authors`) with its own audit entity type.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use alexandria_core::entities::{Author, EnrichmentLog, EnrichmentOperation, EntityType};
use alexandria_providers::ProviderAuthorRecord;

use crate::error::Result;

#[async_trait]
pub trait AuthorWriter: Send + Sync {
    /// Merge `incoming` into the author for `author_key`, creating the row
    /// if absent, and stamp `wikidata_enriched_at=now()`. Returns the
    /// fields that actually changed.
    async fn upsert_author(&self, author_key: &str, incoming: &ProviderAuthorRecord) -> Result<Vec<String>>;
}

pub struct PostgresAuthorWriter {
    pool: PgPool,
}

impl PostgresAuthorWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_author(&self, author_key: &str) -> Result<Option<Author>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT data FROM enriched_authors WHERE author_key = $1")
                .bind(author_key)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((data,)) => Ok(Some(serde_json::from_value(data)?)),
            None => Ok(None),
        }
    }

    async fn save_author(&self, author: &Author) -> Result<()> {
        let data = serde_json::to_value(author)?;
        sqlx::query(
            r#"
            INSERT INTO enriched_authors (author_key, data, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (author_key) DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&author.author_key)
        .bind(&data)
        .bind(author.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn log_enrichment(&self, author_key: &str, fields_updated: &[String], operation: EnrichmentOperation) -> Result<()> {
        let log = EnrichmentLog {
            entity_type: EntityType::Author,
            entity_key: author_key.to_string(),
            provider: "wikidata".to_string(),
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

fn coalesce<T: Clone>(existing: &mut Option<T>, incoming: Option<&T>, field: &'static str, changed: &mut Vec<&'static str>) {
    if existing.is_none() {
        if let Some(value) = incoming {
            *existing = Some(value.clone());
            changed.push(field);
        }
    }
}

#[async_trait]
impl AuthorWriter for PostgresAuthorWriter {
    async fn upsert_author(&self, author_key: &str, incoming: &ProviderAuthorRecord) -> Result<Vec<String>> {
        let (mut author, operation) = match self.load_author(author_key).await? {
            Some(existing) => (existing, EnrichmentOperation::Update),
            None => (Author::new(author_key.to_string(), Utc::now()), EnrichmentOperation::Create),
        };

        let mut fields_updated = Vec::new();
        coalesce(&mut author.name, incoming.name.as_ref(), "name", &mut fields_updated);
        coalesce(&mut author.gender, incoming.gender.as_ref(), "gender", &mut fields_updated);
        coalesce(&mut author.gender_qid, incoming.gender_qid.as_ref(), "gender_qid", &mut fields_updated);
        coalesce(&mut author.nationality, incoming.nationality.as_ref(), "nationality", &mut fields_updated);
        coalesce(
            &mut author.nationality_qid,
            incoming.nationality_qid.as_ref(),
            "nationality_qid",
            &mut fields_updated,
        );
        coalesce(&mut author.birth_year, incoming.birth_year.as_ref(), "birth_year", &mut fields_updated);
        coalesce(&mut author.death_year, incoming.death_year.as_ref(), "death_year", &mut fields_updated);
        coalesce(&mut author.birth_place, incoming.birth_place.as_ref(), "birth_place", &mut fields_updated);
        coalesce(&mut author.birth_country, incoming.birth_country.as_ref(), "birth_country", &mut fields_updated);
        coalesce(&mut author.bio, incoming.bio.as_ref(), "bio", &mut fields_updated);
        coalesce(&mut author.photo_url, incoming.photo_url.as_ref(), "photo_url", &mut fields_updated);
        coalesce(&mut author.wikidata_id, incoming.wikidata_id.as_ref(), "wikidata_id", &mut fields_updated);

        if author.bio_source.is_none() && incoming.bio.is_some() {
            author.bio_source = Some(incoming.source.clone());
        }
        if author.enrichment_source.is_none() {
            author.enrichment_source = Some(incoming.source.clone());
        }
        author.wikidata_enriched_at = Some(Utc::now());
        author.updated_at = Utc::now();

        self.save_author(&author).await?;
        self.log_enrichment(author_key, &fields_updated, operation).await?;

        Ok(fields_updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesce_keeps_existing_value() {
        let mut existing = Some("female".to_string());
        let incoming = Some("male".to_string());
        let mut changed = Vec::new();
        coalesce(&mut existing, incoming.as_ref(), "gender", &mut changed);
        assert_eq!(existing, Some("female".to_string()));
        assert!(changed.is_empty());
    }

    #[test]
    fn coalesce_fills_previously_empty_value() {
        let mut existing: Option<String> = None;
        let incoming = Some("female".to_string());
        let mut changed = Vec::new();
        coalesce(&mut existing, incoming.as_ref(), "gender", &mut changed);
        assert_eq!(existing, Some("female".to_string()));
        assert_eq!(changed, vec!["gender"]);
    }
}
