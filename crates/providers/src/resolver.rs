//! Fuzzy title/author resolution scoring shared by providers that only
//! support search-by-keyword (no direct ISBN lookup). Grounded directly on
//! the teacher's `entity_resolution::EntityResolver` fuzzy-match pipeline
//! (`normalize_title`, `normalized_levenshtein`, confidence remapping) —
//! same shape, rebased onto title+author candidates instead of title+year.

use strsim::normalized_levenshtein;

use crate::model::{ResolutionMethod, ResolvedIsbn};

/// A search-result candidate as returned by a provider's keyword search.
pub struct Candidate<'a> {
    pub isbn: &'a str,
    pub title: &'a str,
    pub author: Option<&'a str>,
    pub publisher: Option<&'a str>,
    pub format: Option<&'a str>,
}

/// Lowercase, strip punctuation, collapse whitespace — identical
/// normalization the teacher applies before any Levenshtein comparison.
pub fn normalize_text(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Strip a subtitle off a title before comparing: everything from the
/// first `:` or ` - ` onward. Providers are inconsistent about whether a
/// subtitle is folded into `title` or kept separate in `subtitle`, so
/// comparing only the main title avoids penalizing a correct match for a
/// subtitle difference.
fn strip_subtitle(title: &str) -> &str {
    let colon_cut = title.find(':').map(|i| &title[..i]);
    let dash_cut = title.find(" - ").map(|i| &title[..i]);
    match (colon_cut, dash_cut) {
        (Some(a), Some(b)) => if a.len() <= b.len() { a } else { b },
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => title,
    }
    .trim()
}

fn normalize_title(title: &str) -> String {
    normalize_text(strip_subtitle(title))
}

/// Normalize an author name for comparison, rewriting "Last, First" into
/// "First Last" so a provider that stores names inverted still compares
/// equal to one that doesn't.
fn normalize_author(author: &str) -> String {
    let rewritten = match author.split_once(',') {
        Some((last, first)) if !first.trim().is_empty() => format!("{} {}", first.trim(), last.trim()),
        _ => author.to_string(),
    };
    normalize_text(&rewritten)
}

/// Score every candidate against `query`, returning the best match above
/// the acceptance floor (spec's low-confidence threshold, 45 — see
/// `alexandria_core::confidence`), or `None` if nothing clears it.
///
/// Combined score is `title*0.7 + author*0.3` (or just `title` if either
/// side has no author), plus a +0.10 bonus when publishers match and a
/// +0.05 bonus when formats match, capped at 1.0. The final score maps
/// straight onto `confidence_level`'s 0..100 scale: no separate remap.
pub fn best_fuzzy_match(
    query_title: &str,
    query_author: Option<&str>,
    query_publisher: Option<&str>,
    query_format: Option<&str>,
    candidates: &[Candidate<'_>],
) -> Option<ResolvedIsbn> {
    let normalized_query_title = normalize_title(query_title);
    let normalized_query_author = query_author.map(normalize_author);
    let normalized_query_publisher = query_publisher.map(normalize_text);
    let normalized_query_format = query_format.map(normalize_text);

    let mut best: Option<(f64, &Candidate)> = None;

    for candidate in candidates {
        let title_similarity = normalized_levenshtein(&normalized_query_title, &normalize_title(candidate.title));

        let mut combined = match (&normalized_query_author, candidate.author) {
            (Some(q_author), Some(c_author)) => {
                let author_similarity = normalized_levenshtein(q_author, &normalize_author(c_author));
                // Title carries more weight than author: a wrong author with
                // the right title is still usually the right book (co-authors,
                // pen names, provider data entry inconsistencies).
                title_similarity * 0.7 + author_similarity * 0.3
            }
            _ => title_similarity,
        };

        if let (Some(q_publisher), Some(c_publisher)) = (&normalized_query_publisher, candidate.publisher) {
            if *q_publisher == normalize_text(c_publisher) {
                combined += 0.10;
            }
        }
        if let (Some(q_format), Some(c_format)) = (&normalized_query_format, candidate.format) {
            if *q_format == normalize_text(c_format) {
                combined += 0.05;
            }
        }
        combined = combined.min(1.0);

        if best.as_ref().map(|(score, _)| combined > *score).unwrap_or(true) {
            best = Some((combined, candidate));
        }
    }

    let (score, candidate) = best?;
    if score < 0.45 {
        return None;
    }

    Some(ResolvedIsbn {
        isbn: candidate.isbn.to_string(),
        confidence: (score * 100.0).round() as u8,
        method: ResolutionMethod::TitleAuthorFuzzy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate<'a>(isbn: &'a str, title: &'a str, author: Option<&'a str>) -> Candidate<'a> {
        Candidate {
            isbn,
            title,
            author,
            publisher: None,
            format: None,
        }
    }

    #[test]
    fn normalizes_like_the_teacher_does() {
        assert_eq!(normalize_text("The Hobbit (1937)"), "the hobbit 1937");
    }

    #[test]
    fn strips_subtitle_before_comparing() {
        assert_eq!(normalize_title("The Hobbit: or There and Back Again"), normalize_title("The Hobbit"));
    }

    #[test]
    fn normalizes_inverted_author_names() {
        assert_eq!(normalize_author("Tolkien, J.R.R."), normalize_author("J.R.R. Tolkien"));
    }

    #[test]
    fn exact_title_and_author_scores_near_top_confidence() {
        let candidates = vec![candidate("9780618260300", "The Hobbit", Some("J.R.R. Tolkien"))];
        let result = best_fuzzy_match("The Hobbit", Some("J.R.R. Tolkien"), None, None, &candidates).unwrap();
        assert_eq!(result.isbn, "9780618260300");
        assert!(result.confidence >= 90);
    }

    #[test]
    fn weak_match_is_rejected() {
        let candidates = vec![candidate("0000000000000", "A Completely Unrelated Cookbook", Some("Someone Else"))];
        assert!(best_fuzzy_match("The Hobbit", Some("J.R.R. Tolkien"), None, None, &candidates).is_none());
    }

    #[test]
    fn picks_highest_scoring_candidate() {
        let candidates = vec![
            candidate("1111111111111", "The Hobbitt", Some("J.R.R. Tolkien")),
            candidate("9780618260300", "The Hobbit", Some("J.R.R. Tolkien")),
        ];
        let result = best_fuzzy_match("The Hobbit", Some("J.R.R. Tolkien"), None, None, &candidates).unwrap();
        assert_eq!(result.isbn, "9780618260300");
    }

    #[test]
    fn publisher_and_format_bonuses_lift_a_borderline_match_to_high_confidence() {
        let candidates = vec![Candidate {
            isbn: "9780618260300",
            title: "The Hobbit",
            author: Some("J.R.R. Tolkien"),
            publisher: Some("Houghton Mifflin"),
            format: Some("Hardcover"),
        }];
        let result = best_fuzzy_match(
            "The Hobbit",
            Some("J.R.R. Tolkien"),
            Some("Houghton Mifflin"),
            Some("Hardcover"),
            &candidates,
        )
        .unwrap();
        assert_eq!(result.confidence, 100);
    }

    #[test]
    fn a_high_similarity_score_maps_directly_onto_high_confidence() {
        // A single-character title difference keeps normalized_levenshtein
        // around 0.9; the raw score must reach `confidence_level`'s High
        // tier (>=85) directly, with no stretching remap in between.
        let candidates = vec![candidate("9780618260300", "The Hobbiu", None)];
        let result = best_fuzzy_match("The Hobbit", None, None, None, &candidates).unwrap();
        assert!(result.confidence >= 85, "expected high confidence, got {}", result.confidence);
    }
}
