//! # Alexandria Dedup
//!
//! Work/author key resolution and request-scoped single-flight
//! deduplication (spec §4.7, §5).

pub mod keys;
pub mod single_flight;

pub use keys::{resolve_author_key, resolve_work_key};
pub use single_flight::SingleFlight;
