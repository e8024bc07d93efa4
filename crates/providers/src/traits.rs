//! Provider trait contracts (spec §4.1's operation list: ResolveISBN,
//! FetchMetadata, BatchFetchMetadata, FetchCover, FetchEditionVariants,
//! GenerateBooks). A concrete provider only overrides the operations its
//! upstream API actually supports; the rest fall back to the `None`/empty
//! defaults below so the orchestrator can call every method on every
//! provider uniformly.

use alexandria_core::entities::ImageSet;
use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::model::{GeneratedBook, ProviderAuthorRecord, ProviderEditionRecord, ResolveQuery, ResolvedIsbn};

/// A book-metadata source: ISBNdb, OpenLibrary, Google Books, Archive.org,
/// LibraryThing.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve_isbn(&self, _query: &ResolveQuery) -> ProviderResult<Option<ResolvedIsbn>> {
        Ok(None)
    }

    async fn fetch_metadata(&self, _isbn: &str) -> ProviderResult<Option<ProviderEditionRecord>> {
        Ok(None)
    }

    /// Default: sequential `fetch_metadata` per ISBN. Providers with a real
    /// batch endpoint (ISBNdb) override this for fewer round trips.
    async fn batch_fetch_metadata(&self, isbns: &[String]) -> ProviderResult<Vec<ProviderEditionRecord>> {
        let mut out = Vec::with_capacity(isbns.len());
        for isbn in isbns {
            if let Some(record) = self.fetch_metadata(isbn).await? {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn fetch_cover(&self, _isbn: &str) -> ProviderResult<Option<ImageSet>> {
        Ok(None)
    }

    async fn fetch_edition_variants(&self, _work_key: &str) -> ProviderResult<Vec<ProviderEditionRecord>> {
        Ok(Vec::new())
    }
}

/// Author-biography enrichment source (Wikidata; spec §4.5).
#[async_trait]
pub trait AuthorProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_author(&self, name: &str) -> ProviderResult<Option<ProviderAuthorRecord>>;
}

/// AI record-generation source (Gemini, xAI; spec §4.6).
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate_books(&self, prompt: &str, count: u32) -> ProviderResult<Vec<GeneratedBook>>;
}
