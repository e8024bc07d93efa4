//! Crate-level smoke tests exercising the public re-exports together,
//! rather than each module's internals in isolation.

use crate::{confidence_level, isbn, ConfidenceLevel, Edition};

#[test]
fn new_edition_starts_with_not_found_confidence() {
    let edition = Edition::new("9780439064873".to_string(), chrono::Utc::now());
    assert_eq!(confidence_level(edition.quality_score), ConfidenceLevel::NotFound);
}

#[test]
fn isbn_normalize_is_exported_at_crate_root() {
    assert!(isbn::is_valid("978-0-439-06487-3"));
}
