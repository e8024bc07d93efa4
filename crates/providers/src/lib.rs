//! # Alexandria Providers
//!
//! Book-metadata provider clients (ISBNdb, OpenLibrary, Google Books,
//! Archive.org, Wikidata, LibraryThing) plus the generative backfill
//! providers (Gemini, xAI), the fuzzy ISBN resolver, and the three
//! provider-fan-out orchestration strategies spec §4.1 describes.

pub mod error;
pub mod model;
pub mod orchestrator;
pub mod rate_limit;
pub mod registry;
pub mod resolver;
pub mod providers;
pub mod traits;

pub use error::{ProviderError, ProviderResult};
pub use model::{
    GeneratedBook, ProviderAuthorRecord, ProviderEditionRecord, ResolutionMethod, ResolveQuery,
    ResolvedIsbn,
};
pub use orchestrator::{cascading_fetch, concurrent_aggregate_fetch, fan_out_fetch, resolve_isbn_cascade};
pub use registry::ProviderRegistry;
pub use traits::{AuthorProvider, GenerativeProvider, MetadataProvider};
