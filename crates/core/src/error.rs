//! Shared error taxonomy (spec §7: ValidationError, StorageError, and the
//! pieces every other crate's own error enum converts into).

use thiserror::Error;

/// Errors surfaced by `alexandria-core` itself (ISBN normalization, config
/// loading). Other crates define their own `thiserror` enums for their
/// taxonomy slice and convert into or wrap this one at the boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid ISBN `{0}`: {1}")]
    InvalidIsbn(String, &'static str),

    #[error("invalid year/month ({year}, {month}): {reason}")]
    InvalidYearMonth {
        year: i32,
        month: i32,
        reason: &'static str,
    },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
