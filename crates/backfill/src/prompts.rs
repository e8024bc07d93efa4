//! Named prompt variants for AI book-list generation (spec §4.5). An
//! unrecognized variant name is rejected at ingress rather than silently
//! falling back to a default, so a typo in a backfill message never runs
//! against the wrong prompt.

use crate::error::{BackfillError, Result};

/// A registered prompt variant: a name plus the template text sent to the
/// generative providers, with `{count}` substituted for the requested
/// candidate count.
#[derive(Debug, Clone)]
pub struct PromptVariant {
    pub name: &'static str,
    template: &'static str,
}

impl PromptVariant {
    pub fn render(&self, count: u32) -> String {
        self.template.replace("{count}", &count.to_string())
    }
}

const BASELINE: PromptVariant = PromptVariant {
    name: "baseline",
    template: "List {count} real, published books. For each, return title, author, \
        publisher (if known), format (one of Hardcover, Paperback, eBook, Audiobook, \
        Unknown), and four-digit publication_year as a JSON array of objects.",
};

const DIVERSITY_EMPHASIS: PromptVariant = PromptVariant {
    name: "diversity-emphasis",
    template: "List {count} real, published books, favoring a diverse range of authors' \
        genders, nationalities, and languages of origin over well-known Western \
        bestsellers. For each, return title, author, publisher (if known), format (one \
        of Hardcover, Paperback, eBook, Audiobook, Unknown), and four-digit \
        publication_year as a JSON array of objects.",
};

const VARIANTS: &[PromptVariant] = &[BASELINE, DIVERSITY_EMPHASIS];

/// Look up a prompt variant by name, rejecting anything not in `VARIANTS`
/// (spec §4.5: "unrecognized variants are rejected").
pub fn lookup(variant: &str) -> Result<&'static PromptVariant> {
    VARIANTS
        .iter()
        .find(|v| v.name == variant)
        .ok_or_else(|| BackfillError::UnknownPromptVariant(variant.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_and_diversity_emphasis_are_registered() {
        assert!(lookup("baseline").is_ok());
        assert!(lookup("diversity-emphasis").is_ok());
    }

    #[test]
    fn unknown_variant_is_rejected() {
        assert!(lookup("made-up-variant").is_err());
    }

    #[test]
    fn render_substitutes_count() {
        let rendered = lookup("baseline").unwrap().render(20);
        assert!(rendered.contains("20 real"));
    }
}
