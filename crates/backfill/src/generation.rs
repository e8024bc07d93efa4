//! Concurrent-aggregate AI book generation (spec §4.5): every registered
//! `GenerativeProvider` (Gemini, xAI) is called with the same rendered
//! prompt, each call retried up to 3 attempts with exponential backoff
//! (base 1s) unless the failure is non-retryable, and the results are
//! deduplicated by normalized (title, author) before being handed to the
//! synthetic-persistence stage. Grounded on
//! `alexandria_providers::orchestrator::fan_out_fetch`'s `join_all`
//! fan-out shape, generalized from edition records to generated candidates.

use std::sync::Arc;
use std::time::Duration;

use alexandria_providers::{GeneratedBook, GenerativeProvider, ProviderError, ProviderResult};
use futures::future::join_all;
use strsim::normalized_levenshtein;

use crate::prompts::PromptVariant;

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Call `generate` with retries, honoring `ProviderError::is_retryable`
/// (spec §4.5: 3 attempts, exponential backoff from a 1s base, no retry on
/// non-retryable 4xx).
async fn generate_with_retry(
    provider: &dyn GenerativeProvider,
    prompt: &str,
    count: u32,
) -> ProviderResult<Vec<GeneratedBook>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match provider.generate_books(prompt, count).await {
            Ok(books) => return Ok(books),
            Err(err) if attempt < MAX_ATTEMPTS && err.is_retryable() => {
                let backoff = BASE_BACKOFF * 2u32.pow(attempt - 1);
                tracing::warn!(
                    provider = provider.name(),
                    attempt,
                    error = %err,
                    "generate_books failed, retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Normalize a (title, author) pair for dedup purposes: lowercase, trimmed.
fn dedup_key(book: &GeneratedBook) -> String {
    format!("{} {}", book.title.trim().to_lowercase(), book.author.trim().to_lowercase())
}

/// Two generators phrasing the same book slightly differently ("The Hobbit"
/// vs "The Hobbit: or There and Back Again") shouldn't both survive as
/// distinct candidates, so dedup is fuzzy rather than exact: a candidate is
/// a duplicate of an already-accepted one if their normalized (title,
/// author) strings are at least 0.6 similar by edit distance.
const DEDUP_SIMILARITY_THRESHOLD: f64 = 0.6;

fn is_duplicate(key: &str, accepted_keys: &[String]) -> bool {
    accepted_keys
        .iter()
        .any(|existing| normalized_levenshtein(key, existing) >= DEDUP_SIMILARITY_THRESHOLD)
}

/// Run the prompt against every registered generator concurrently, retrying
/// transient failures per-provider, and return the deduplicated union of
/// all generated candidates. A provider that exhausts its retries is
/// logged and excluded rather than failing the whole generation pass — the
/// backfill job should still produce whatever the surviving providers gave
/// it (spec §4.6: "no AI output is ever lost" applies to what *is*
/// generated, not to providers that are entirely unreachable).
pub async fn generate_candidates(
    generators: &[Arc<dyn GenerativeProvider>],
    variant: &PromptVariant,
    count: u32,
) -> Vec<GeneratedBook> {
    let prompt = variant.render(count);

    let futures = generators.iter().map(|provider| {
        let provider = Arc::clone(provider);
        let prompt = prompt.clone();
        async move {
            match generate_with_retry(provider.as_ref(), &prompt, count).await {
                Ok(books) => books,
                Err(err) => {
                    tracing::warn!(provider = provider.name(), error = %err, "generator exhausted retries");
                    Vec::new()
                }
            }
        }
    });

    let results = join_all(futures).await;

    let mut seen_keys = Vec::new();
    let mut out = Vec::new();
    for book in results.into_iter().flatten() {
        let key = dedup_key(&book);
        if !is_duplicate(&key, &seen_keys) {
            seen_keys.push(key);
            out.push(book);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubGenerator {
        name: &'static str,
        books: Vec<GeneratedBook>,
    }

    #[async_trait]
    impl GenerativeProvider for StubGenerator {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn generate_books(&self, _prompt: &str, _count: u32) -> ProviderResult<Vec<GeneratedBook>> {
            Ok(self.books.clone())
        }
    }

    fn book(title: &str, author: &str) -> GeneratedBook {
        GeneratedBook {
            isbn: None,
            title: title.to_string(),
            author: author.to_string(),
            description: None,
            subject_tags: Vec::new(),
            first_publication_year: Some(1954),
        }
    }

    #[tokio::test]
    async fn dedups_across_generators_by_title_and_author() {
        let generators: Vec<Arc<dyn GenerativeProvider>> = vec![
            Arc::new(StubGenerator {
                name: "gemini",
                books: vec![book("The Hobbit", "J.R.R. Tolkien")],
            }),
            Arc::new(StubGenerator {
                name: "xai",
                books: vec![book("the hobbit", "j.r.r. tolkien"), book("Dune", "Frank Herbert")],
            }),
        ];
        let variant = crate::prompts::lookup("baseline").unwrap();
        let candidates = generate_candidates(&generators, variant, 20).await;
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn dedups_near_identical_titles_with_a_minor_spelling_difference() {
        let generators: Vec<Arc<dyn GenerativeProvider>> = vec![
            Arc::new(StubGenerator {
                name: "gemini",
                books: vec![book("The Hobbit", "J.R.R. Tolkien")],
            }),
            Arc::new(StubGenerator {
                name: "xai",
                books: vec![book("The Hobbitt", "J.R.R. Tolkein")],
            }),
        ];
        let variant = crate::prompts::lookup("baseline").unwrap();
        let candidates = generate_candidates(&generators, variant, 20).await;
        assert_eq!(candidates.len(), 1);
    }

    #[tokio::test]
    async fn one_dead_generator_does_not_block_the_others() {
        struct FailingGenerator;

        #[async_trait]
        impl GenerativeProvider for FailingGenerator {
            fn name(&self) -> &'static str {
                "broken"
            }

            async fn generate_books(&self, _prompt: &str, _count: u32) -> ProviderResult<Vec<GeneratedBook>> {
                Err(ProviderError::BadResponse {
                    provider: "broken",
                    reason: "malformed json".to_string(),
                })
            }
        }

        let generators: Vec<Arc<dyn GenerativeProvider>> = vec![
            Arc::new(FailingGenerator),
            Arc::new(StubGenerator {
                name: "gemini",
                books: vec![book("Dune", "Frank Herbert")],
            }),
        ];
        let variant = crate::prompts::lookup("baseline").unwrap();
        let candidates = generate_candidates(&generators, variant, 20).await;
        assert_eq!(candidates.len(), 1);
    }
}
