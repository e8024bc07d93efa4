//! Domain entities (spec §3): Edition, Work, Author, WorkAuthor,
//! ExternalIdMapping, EnrichmentLog. These are data-only — the monotone
//! merge rules that mutate them live in `alexandria-merge`; the structs here
//! only carry the invariants that are intrinsic to the data itself (distinct
//! ordered contributors, normalized subject tags).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of entity a row/log/mapping refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Work,
    Edition,
    Author,
}

/// The four cover-image resolutions tracked per edition/work, preferring
/// `original > large > medium > small` wherever a single URL is needed
/// (spec §4.2 cover fan-out).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSet {
    pub original: Option<String>,
    pub large: Option<String>,
    pub medium: Option<String>,
    pub small: Option<String>,
}

impl ImageSet {
    /// The best available cover URL, preferring highest resolution first.
    pub fn best(&self) -> Option<&str> {
        self.original
            .as_deref()
            .or(self.large.as_deref())
            .or(self.medium.as_deref())
            .or(self.small.as_deref())
    }

    /// COALESCE per slot: existing non-null values are kept, only null slots
    /// are filled from `incoming` (spec §4.2 "Cover URL slots").
    pub fn coalesce(&mut self, incoming: &ImageSet) {
        self.original = self.original.take().or_else(|| incoming.original.clone());
        self.large = self.large.take().or_else(|| incoming.large.clone());
        self.medium = self.medium.take().or_else(|| incoming.medium.clone());
        self.small = self.small.take().or_else(|| incoming.small.clone());
    }
}

/// Normalize a subject tag: lowercase, trimmed (spec §3 invariant 5).
pub fn normalize_subject_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Union two subject-tag sets under normalization; commutative, associative,
/// idempotent (spec §8).
pub fn union_subject_tags(
    existing: &BTreeSet<String>,
    incoming: impl IntoIterator<Item = impl AsRef<str>>,
) -> BTreeSet<String> {
    let mut out = existing.clone();
    for tag in incoming {
        out.insert(normalize_subject_tag(tag.as_ref()));
    }
    out
}

/// Append `provider` to `contributors` iff not already present, preserving
/// first-seen order (spec §3 invariant 2, §8 property 2).
pub fn append_contributor(contributors: &mut Vec<String>, provider: &str) {
    if !contributors.iter().any(|p| p == provider) {
        contributors.push(provider.to_string());
    }
}

/// A specific printing identified by a canonical ISBN-13 (spec §3 "Edition").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edition {
    pub isbn: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub page_count: Option<i32>,
    pub format: Option<String>,
    pub language: Option<String>,
    pub cover: ImageSet,
    pub cover_source: Option<String>,
    pub alternate_isbns: BTreeSet<String>,
    pub related_isbns: BTreeMap<String, String>,
    pub subject_tags: BTreeSet<String>,
    pub dewey: BTreeSet<String>,
    pub openlibrary_edition_id: Option<String>,
    pub amazon_asins: BTreeSet<String>,
    pub google_books_volume_ids: BTreeSet<String>,
    pub goodreads_edition_ids: BTreeSet<String>,
    pub work_key: Option<String>,
    pub work_match_confidence: Option<u8>,
    pub work_match_source: Option<String>,
    pub primary_provider: Option<String>,
    pub contributors: Vec<String>,
    pub quality_score: u8,
    pub completeness_score: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_isbndb_sync: Option<DateTime<Utc>>,
}

impl Edition {
    /// A brand-new, empty edition for `isbn`, stamped with `now` for both
    /// timestamps. Used as the seed an upsert merges into when no row exists
    /// yet.
    pub fn new(isbn: String, now: DateTime<Utc>) -> Self {
        Self {
            isbn,
            title: None,
            subtitle: None,
            publisher: None,
            publication_date: None,
            page_count: None,
            format: None,
            language: None,
            cover: ImageSet::default(),
            cover_source: None,
            alternate_isbns: BTreeSet::new(),
            related_isbns: BTreeMap::new(),
            subject_tags: BTreeSet::new(),
            dewey: BTreeSet::new(),
            openlibrary_edition_id: None,
            amazon_asins: BTreeSet::new(),
            google_books_volume_ids: BTreeSet::new(),
            goodreads_edition_ids: BTreeSet::new(),
            work_key: None,
            work_match_confidence: None,
            work_match_source: None,
            primary_provider: None,
            contributors: Vec::new(),
            quality_score: 0,
            completeness_score: 0,
            created_at: now,
            updated_at: now,
            last_isbndb_sync: None,
        }
    }
}

/// Title-level abstract entity grouping editions (spec §3 "Work").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    pub work_key: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub original_language: Option<String>,
    pub first_publication_year: Option<i32>,
    pub subject_tags: BTreeSet<String>,
    pub cover: ImageSet,
    pub openlibrary_work_id: Option<String>,
    pub goodreads_work_ids: BTreeSet<String>,
    pub wikidata_id: Option<String>,
    pub primary_provider: Option<String>,
    pub contributors: Vec<String>,
    pub quality_score: u8,
    pub completeness_score: u8,
    pub synthetic: bool,
    /// Last time the deferred-enhancement pass attempted ISBN resolution
    /// for this (synthetic) work (spec §4.6). `None` for non-synthetic
    /// works, which never go through that pass.
    pub last_isbndb_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Work {
    pub fn new(work_key: String, now: DateTime<Utc>) -> Self {
        Self {
            work_key,
            title: None,
            subtitle: None,
            description: None,
            original_language: None,
            first_publication_year: None,
            subject_tags: BTreeSet::new(),
            cover: ImageSet::default(),
            openlibrary_work_id: None,
            goodreads_work_ids: BTreeSet::new(),
            wikidata_id: None,
            primary_provider: None,
            contributors: Vec::new(),
            quality_score: 0,
            completeness_score: 0,
            synthetic: false,
            last_isbndb_sync: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A person/entity authoring works (spec §3 "Author").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub author_key: String,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub gender_qid: Option<String>,
    pub nationality: Option<String>,
    pub nationality_qid: Option<String>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub birth_place: Option<String>,
    pub birth_place_qid: Option<String>,
    pub birth_country: Option<String>,
    pub birth_country_qid: Option<String>,
    pub death_place: Option<String>,
    pub death_place_qid: Option<String>,
    pub bio: Option<String>,
    pub bio_source: Option<String>,
    pub photo_url: Option<String>,
    pub openlibrary_author_id: Option<String>,
    pub goodreads_author_ids: BTreeSet<String>,
    pub wikidata_id: Option<String>,
    pub primary_provider: Option<String>,
    pub enrichment_source: Option<String>,
    pub wikidata_enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Author {
    pub fn new(author_key: String, now: DateTime<Utc>) -> Self {
        Self {
            author_key,
            name: None,
            gender: None,
            gender_qid: None,
            nationality: None,
            nationality_qid: None,
            birth_year: None,
            death_year: None,
            birth_place: None,
            birth_place_qid: None,
            birth_country: None,
            birth_country_qid: None,
            death_place: None,
            death_place_qid: None,
            bio: None,
            bio_source: None,
            photo_url: None,
            openlibrary_author_id: None,
            goodreads_author_ids: BTreeSet::new(),
            wikidata_id: None,
            primary_provider: None,
            enrichment_source: None,
            wikidata_enriched_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// (work_key, author_key, author_order) link; unique on (work_key, author_key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkAuthor {
    pub work_key: String,
    pub author_key: String,
    pub author_order: i32,
}

/// (entity_type, our_key, provider, provider_id) mapping, unique on that tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalIdMapping {
    pub entity_type: EntityType,
    pub our_key: String,
    pub provider: String,
    pub provider_id: String,
    pub confidence: u8,
    pub mapping_source: String,
    pub mapping_method: String,
}

/// Append-only enrichment audit row (spec §3 "EnrichmentLog").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentOperation {
    Create,
    Update,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentLog {
    pub entity_type: EntityType,
    pub entity_key: String,
    pub provider: String,
    pub operation: EnrichmentOperation,
    pub success: bool,
    pub fields_updated: Vec<String>,
    pub error_message: Option<String>,
    pub response_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_tags_union_is_idempotent_and_normalized() {
        let mut existing = BTreeSet::new();
        existing.insert("Fantasy".to_string());
        let unioned = union_subject_tags(&existing, vec![" Fantasy ", "Adventure"]);
        assert_eq!(unioned.len(), 2);
        assert!(unioned.contains("fantasy"));
        assert!(unioned.contains("adventure"));

        let unioned_again = union_subject_tags(&unioned, Vec::<&str>::new());
        assert_eq!(unioned, unioned_again);
    }

    #[test]
    fn union_is_commutative() {
        let mut a = BTreeSet::new();
        a.insert("sci-fi".to_string());
        let mut b = BTreeSet::new();
        b.insert("drama".to_string());

        let ab = union_subject_tags(&a, b.iter().cloned());
        let ba = union_subject_tags(&b, a.iter().cloned());
        assert_eq!(ab, ba);
    }

    #[test]
    fn contributors_stay_distinct_and_ordered() {
        let mut contributors = Vec::new();
        append_contributor(&mut contributors, "isbndb");
        append_contributor(&mut contributors, "wikidata");
        append_contributor(&mut contributors, "isbndb");
        assert_eq!(contributors, vec!["isbndb".to_string(), "wikidata".to_string()]);
    }

    #[test]
    fn image_set_coalesce_never_overwrites_existing() {
        let mut existing = ImageSet {
            original: Some("https://example.com/o.jpg".to_string()),
            large: None,
            medium: None,
            small: None,
        };
        let incoming = ImageSet {
            original: Some("https://example.com/other.jpg".to_string()),
            large: Some("https://example.com/l.jpg".to_string()),
            medium: None,
            small: None,
        };
        existing.coalesce(&incoming);
        assert_eq!(existing.original.as_deref(), Some("https://example.com/o.jpg"));
        assert_eq!(existing.large.as_deref(), Some("https://example.com/l.jpg"));
    }

    #[test]
    fn image_set_best_prefers_original() {
        let set = ImageSet {
            original: None,
            large: Some("l".to_string()),
            medium: Some("m".to_string()),
            small: None,
        };
        assert_eq!(set.best(), Some("l"));
    }
}
