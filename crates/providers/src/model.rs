//! Provider-shaped data: partial records a single provider can contribute,
//! merged into canonical `alexandria_core::entities` rows by `alexandria-merge`.

use alexandria_core::entities::ImageSet;
use serde::{Deserialize, Serialize};

/// A book lookup request: whatever the caller already knows (spec §4.1
/// "ResolveISBN" inputs — title/author pair, or an ISBN the caller wants
/// cross-checked).
#[derive(Debug, Clone, Default)]
pub struct ResolveQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub format: Option<String>,
}

/// How a provider matched an ISBN to the query (mirrors the teacher's
/// `entity_resolution::MatchMethod` vocabulary, narrowed to what ISBN
/// resolution actually needs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    IsbnExact,
    TitleAuthorFuzzy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedIsbn {
    pub isbn: String,
    pub confidence: u8,
    pub method: ResolutionMethod,
}

/// Everything a single provider can tell us about one edition. All fields
/// optional: a provider only fills what its API actually returns, and
/// `alexandria-merge` applies the field-level merge rules across providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderEditionRecord {
    pub source: String,
    pub isbn: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub page_count: Option<i32>,
    pub format: Option<String>,
    pub language: Option<String>,
    pub cover: ImageSet,
    pub subject_tags: Vec<String>,
    pub dewey: Vec<String>,
    pub authors: Vec<String>,
    pub alternate_isbns: Vec<String>,
    pub openlibrary_edition_id: Option<String>,
    pub amazon_asin: Option<String>,
    pub google_books_volume_id: Option<String>,
    pub goodreads_edition_id: Option<String>,
}

/// Everything a single provider can tell us about one author, used by the
/// Wikidata enrichment pass (spec §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderAuthorRecord {
    pub source: String,
    pub author_key: String,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub gender_qid: Option<String>,
    pub nationality: Option<String>,
    pub nationality_qid: Option<String>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub birth_place: Option<String>,
    pub birth_country: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub wikidata_id: Option<String>,
    /// Genres attributed to this author's work (Wikidata property P136),
    /// merged into the linked work's `subject_tags` rather than stored as
    /// a separate column.
    pub genre_tags: Vec<String>,
}

/// A generated (not provider-sourced) book record, used by the backfill
/// pipeline's Gemini/xAI generative providers (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedBook {
    pub isbn: Option<String>,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub subject_tags: Vec<String>,
    pub first_publication_year: Option<i32>,
}
