//! `alexandria-merge`'s monotone merge applied across two successive
//! provider records, the way the enrichment consumer actually calls it:
//! once for the higher-priority provider's hit, once for a
//! lower-priority/supplementary provider's hit on the same ISBN.

use alexandria_core::entities::Edition;
use alexandria_merge::merge_edition;
use alexandria_providers::ProviderEditionRecord;
use chrono::Utc;

fn isbndb_record(isbn: &str) -> ProviderEditionRecord {
    ProviderEditionRecord {
        source: "isbndb".to_string(),
        isbn: isbn.to_string(),
        title: Some("Harry Potter and the Sorcerer's Stone".to_string()),
        publisher: Some("Scholastic".to_string()),
        subject_tags: vec!["fiction".to_string(), "fantasy".to_string()],
        ..Default::default()
    }
}

fn google_books_record(isbn: &str) -> ProviderEditionRecord {
    ProviderEditionRecord {
        source: "google_books".to_string(),
        isbn: isbn.to_string(),
        title: Some("A Different Title Google Books Disagrees On".to_string()),
        subject_tags: vec!["fantasy".to_string(), "juvenile fiction".to_string()],
        page_count: Some(309),
        ..Default::default()
    }
}

#[test]
fn existing_title_wins_over_a_later_lower_priority_source() {
    let mut edition = Edition::new("9780439064873".to_string(), Utc::now());
    merge_edition(&mut edition, &isbndb_record("9780439064873"), true);
    let outcome = merge_edition(&mut edition, &google_books_record("9780439064873"), true);

    assert_eq!(edition.title.as_deref(), Some("Harry Potter and the Sorcerer's Stone"));
    assert!(!outcome.fields_updated.contains(&"title"));
}

#[test]
fn a_field_only_the_second_source_has_is_still_filled_in() {
    let mut edition = Edition::new("9780439064873".to_string(), Utc::now());
    merge_edition(&mut edition, &isbndb_record("9780439064873"), true);
    let outcome = merge_edition(&mut edition, &google_books_record("9780439064873"), true);

    assert_eq!(edition.page_count, Some(309));
    assert!(outcome.fields_updated.contains(&"page_count"));
}

#[test]
fn subject_tags_union_across_both_sources_without_duplicates() {
    let mut edition = Edition::new("9780439064873".to_string(), Utc::now());
    merge_edition(&mut edition, &isbndb_record("9780439064873"), true);
    merge_edition(&mut edition, &google_books_record("9780439064873"), true);

    assert!(edition.subject_tags.contains(&"fiction".to_string()));
    assert!(edition.subject_tags.contains(&"fantasy".to_string()));
    assert!(edition.subject_tags.contains(&"juvenile fiction".to_string()));
    assert_eq!(edition.subject_tags.iter().filter(|t| *t == "fantasy").count(), 1);
}

#[test]
fn merging_the_same_record_twice_is_a_no_op_the_second_time() {
    let mut edition = Edition::new("9780439064873".to_string(), Utc::now());
    merge_edition(&mut edition, &isbndb_record("9780439064873"), true);
    let outcome = merge_edition(&mut edition, &isbndb_record("9780439064873"), true);

    assert!(outcome.fields_updated.is_empty());
}
