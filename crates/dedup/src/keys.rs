//! Work/author key resolution (spec §4.7): prefer a stable external
//! identifier (OpenLibrary's `/works/OL..W`, `/authors/OL..A`) when a
//! provider supplied one, and fall back to a synthetic `isbndb-<hex>` key
//! when no external id is available.
//!
//! These fallback keys are randomly suffixed rather than derived from the
//! title/author slug: two lookups for the same book that both miss an
//! external id will mint two different keys here. Callers that need the
//! second lookup to land on the first lookup's key must persist the
//! minted key (e.g. onto `Edition.work_key`) and reuse it rather than
//! calling this function again. Resolving duplicates purely from
//! title/author similarity against already-enriched rows is a known gap;
//! see `DESIGN.md`.

use rand::Rng;

/// Generate a random 8-hex-character suffix for a synthetic key.
fn random_suffix() -> String {
    let bytes: [u8; 4] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Resolve a work key: an OpenLibrary work id if one was supplied, else a
/// synthetic `/works/isbndb-<8hex>` key.
pub fn resolve_work_key(openlibrary_work_id: Option<&str>) -> String {
    match openlibrary_work_id {
        Some(id) => id.to_string(),
        None => format!("/works/isbndb-{}", random_suffix()),
    }
}

/// Resolve an author key: an OpenLibrary author id if one was supplied,
/// else a synthetic `/authors/isbndb-<8hex>` key.
pub fn resolve_author_key(openlibrary_author_id: Option<&str>) -> String {
    match openlibrary_author_id {
        Some(id) => id.to_string(),
        None => format!("/authors/isbndb-{}", random_suffix()),
    }
}
