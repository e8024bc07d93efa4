//! # Alexandria Core
//!
//! Shared domain types for the Alexandria book-metadata enrichment engine:
//! editions, works, authors, the ISBN normalization rules, confidence
//! scoring, configuration, and the error taxonomy used across every other
//! crate in the workspace.
//!
//! ## Modules
//!
//! - `entities`: Edition / Work / Author / WorkAuthor / ExternalIdMapping / EnrichmentLog
//! - `isbn`: ISBN-10/13 normalization and validation
//! - `confidence`: numeric confidence → symbolic level mapping
//! - `error`: shared error type
//! - `config`: engine-wide configuration
//! - `logging`: structured logging init
//! - `sanitization`: provider text sanitization

pub mod config;
pub mod confidence;
pub mod entities;
pub mod error;
pub mod isbn;
pub mod logging;
pub mod sanitization;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use confidence::{confidence_level, ConfidenceLevel};
pub use entities::{
    Author, Edition, EnrichmentLog, EnrichmentOperation, ExternalIdMapping, ImageSet, Work,
    WorkAuthor,
};
pub use error::CoreError;

/// Result type alias for Alexandria core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
