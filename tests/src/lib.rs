//! Cross-crate integration tests for the Alexandria enrichment engine.
//!
//! Each test in `tests/` drives a real pipeline (provider orchestration →
//! quota → merge writer, or the full backfill job flow) across actual crate
//! boundaries, with fakes only at the true I/O edges (Postgres, Redis,
//! Kafka, outbound HTTP) — the same in-memory-fake style every crate's own
//! `#[cfg(test)] mod tests` already uses, just wired across crates instead
//! of within one.

pub mod fakes;
