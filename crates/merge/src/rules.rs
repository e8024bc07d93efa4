//! Field-level monotone merge rules (spec §4.2). Every rule only ever makes
//! `existing` richer or leaves it unchanged — none of them can erase data a
//! prior provider already contributed, which is the invariant the whole
//! enrichment pipeline depends on (spec §3 invariants 3-6, §8 property 1).

use alexandria_core::entities::{append_contributor, union_subject_tags, Edition, Work};
use alexandria_providers::ProviderEditionRecord;

/// Which fields actually changed, for the `EnrichmentLog.fields_updated`
/// audit column.
pub struct MergeOutcome {
    pub fields_updated: Vec<&'static str>,
}

/// COALESCE: take `incoming` only if `existing` is empty/absent.
fn coalesce_string(existing: &mut Option<String>, incoming: Option<&String>, field: &'static str, changed: &mut Vec<&'static str>) {
    if existing.is_none() {
        if let Some(value) = incoming {
            *existing = Some(value.clone());
            changed.push(field);
        }
    }
}

fn coalesce_i32(existing: &mut Option<i32>, incoming: Option<i32>, field: &'static str, changed: &mut Vec<&'static str>) {
    if existing.is_none() {
        if let Some(value) = incoming {
            *existing = Some(value);
            changed.push(field);
        }
    }
}

/// Merge one provider's edition record into `existing`, applying spec §4.2's
/// table: scalar fields COALESCE, cover slots COALESCE per-slot, subject
/// tags/dewey/alternate-ISBNs/external-id sets UNION, `contributors` append
/// distinct, `related_isbns` honors the `existing_wins` precedence config
/// (spec §9 open question).
pub fn merge_edition(
    existing: &mut Edition,
    incoming: &ProviderEditionRecord,
    related_isbns_existing_wins: bool,
) -> MergeOutcome {
    let mut fields_updated = Vec::new();

    coalesce_string(&mut existing.title, incoming.title.as_ref(), "title", &mut fields_updated);
    coalesce_string(&mut existing.subtitle, incoming.subtitle.as_ref(), "subtitle", &mut fields_updated);
    coalesce_string(&mut existing.publisher, incoming.publisher.as_ref(), "publisher", &mut fields_updated);
    coalesce_string(
        &mut existing.publication_date,
        incoming.publication_date.as_ref(),
        "publication_date",
        &mut fields_updated,
    );
    coalesce_i32(&mut existing.page_count, incoming.page_count, "page_count", &mut fields_updated);
    coalesce_string(&mut existing.format, incoming.format.as_ref(), "format", &mut fields_updated);
    coalesce_string(&mut existing.language, incoming.language.as_ref(), "language", &mut fields_updated);

    if existing.cover.best().is_none() && incoming.cover.best().is_some() {
        fields_updated.push("cover");
    }
    existing.cover.coalesce(&incoming.cover);

    let before = existing.subject_tags.len();
    existing.subject_tags = union_subject_tags(&existing.subject_tags, &incoming.subject_tags);
    if existing.subject_tags.len() != before {
        fields_updated.push("subject_tags");
    }

    let before = existing.dewey.len();
    existing.dewey = union_subject_tags(&existing.dewey, &incoming.dewey);
    if existing.dewey.len() != before {
        fields_updated.push("dewey");
    }

    let before = existing.alternate_isbns.len();
    for isbn in &incoming.alternate_isbns {
        existing.alternate_isbns.insert(isbn.clone());
    }
    if existing.alternate_isbns.len() != before {
        fields_updated.push("alternate_isbns");
    }

    coalesce_string(
        &mut existing.openlibrary_edition_id,
        incoming.openlibrary_edition_id.as_ref(),
        "openlibrary_edition_id",
        &mut fields_updated,
    );
    if let Some(asin) = &incoming.amazon_asin {
        if existing.amazon_asins.insert(asin.clone()) {
            fields_updated.push("amazon_asins");
        }
    }
    if let Some(id) = &incoming.google_books_volume_id {
        if existing.google_books_volume_ids.insert(id.clone()) {
            fields_updated.push("google_books_volume_ids");
        }
    }
    if let Some(id) = &incoming.goodreads_edition_id {
        if existing.goodreads_edition_ids.insert(id.clone()) {
            fields_updated.push("goodreads_edition_ids");
        }
    }

    for alias in &incoming.alternate_isbns {
        let entry = existing
            .related_isbns
            .entry(alias.clone())
            .or_insert_with(|| incoming.format.clone().unwrap_or_default());
        if !related_isbns_existing_wins {
            *entry = incoming.format.clone().unwrap_or_else(|| entry.clone());
        }
    }

    if existing.primary_provider.is_none() {
        existing.primary_provider = Some(incoming.source.clone());
        fields_updated.push("primary_provider");
    }
    append_contributor(&mut existing.contributors, &incoming.source);

    MergeOutcome { fields_updated }
}

/// Merge one provider's contribution into a `Work` row, using the same
/// monotone COALESCE/UNION rules as `merge_edition`: title/subtitle
/// COALESCE, `first_publication_year` COALESCE, `subject_tags` UNION (this
/// is how Wikidata's genre tags reach a work without a separate column),
/// `contributors` append distinct.
pub fn merge_work(
    existing: &mut Work,
    source: &str,
    title: Option<&String>,
    subtitle: Option<&String>,
    first_publication_year: Option<i32>,
    subject_tags: &[String],
) -> MergeOutcome {
    let mut fields_updated = Vec::new();

    coalesce_string(&mut existing.title, title, "title", &mut fields_updated);
    coalesce_string(&mut existing.subtitle, subtitle, "subtitle", &mut fields_updated);
    coalesce_i32(
        &mut existing.first_publication_year,
        first_publication_year,
        "first_publication_year",
        &mut fields_updated,
    );

    let before = existing.subject_tags.len();
    existing.subject_tags = union_subject_tags(&existing.subject_tags, subject_tags);
    if existing.subject_tags.len() != before {
        fields_updated.push("subject_tags");
    }

    if existing.primary_provider.is_none() {
        existing.primary_provider = Some(source.to_string());
        fields_updated.push("primary_provider");
    }
    append_contributor(&mut existing.contributors, source);

    MergeOutcome { fields_updated }
}
