//! In-memory fakes for every trait seam a pipeline test needs to cross,
//! mirroring the fixture style already used inside each crate's own unit
//! tests (`FakeJobStatusStore`, `FakeSyntheticStore`, etc. in
//! `alexandria_backfill::orchestrator::tests`).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use alexandria_backfill::{BackfillLogStore, EnrichmentEnqueuer, JobStatusStore, SyntheticStore};
use alexandria_backfill::{synthetic_work_key, BackfillJobStatus};
use alexandria_core::entities::ImageSet;
use alexandria_kv::{KvStore, Namespace};
use alexandria_locks::MonthLock;
use alexandria_merge::{AuthorWriter, EnrichmentWriter};
use alexandria_providers::{
    AuthorProvider, GeneratedBook, MetadataProvider, ProviderAuthorRecord, ProviderEditionRecord, ProviderResult,
    ResolveQuery, ResolvedIsbn,
};

/// A plain in-memory `KvStore`: one `Mutex<HashMap>`, no TTL enforcement.
/// Enough for `QuotaManager`/`KvJobStatusStore` to exercise their real
/// counting/serialization logic against something other than Redis.
#[derive(Default)]
pub struct MemoryKv {
    values: Mutex<HashMap<String, String>>,
}

fn key(ns: Namespace, key: &str) -> String {
    format!("{ns:?}:{key}")
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, ns: Namespace, k: &str) -> alexandria_kv::Result<Option<String>> {
        Ok(self.values.lock().unwrap().get(&key(ns, k)).cloned())
    }

    async fn set(&self, ns: Namespace, k: &str, value: &str, _ttl: Option<std::time::Duration>) -> alexandria_kv::Result<()> {
        self.values.lock().unwrap().insert(key(ns, k), value.to_string());
        Ok(())
    }

    async fn incr_by(&self, ns: Namespace, k: &str, delta: i64) -> alexandria_kv::Result<i64> {
        let mut values = self.values.lock().unwrap();
        let entry = values.entry(key(ns, k)).or_insert_with(|| "0".to_string());
        let next = entry.parse::<i64>().unwrap_or(0) + delta;
        *entry = next.to_string();
        Ok(next)
    }

    async fn expire(&self, _ns: Namespace, _k: &str, _ttl: std::time::Duration) -> alexandria_kv::Result<()> {
        Ok(())
    }

    async fn delete(&self, ns: Namespace, k: &str) -> alexandria_kv::Result<()> {
        self.values.lock().unwrap().remove(&key(ns, k));
        Ok(())
    }

    async fn exists(&self, ns: Namespace, k: &str) -> alexandria_kv::Result<bool> {
        Ok(self.values.lock().unwrap().contains_key(&key(ns, k)))
    }
}

/// A `MetadataProvider` returning a fixed, caller-supplied record for any
/// ISBN it's asked about.
pub struct FixedProvider {
    pub name: &'static str,
    pub record: ProviderEditionRecord,
    pub cover: Option<ImageSet>,
}

#[async_trait]
impl MetadataProvider for FixedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_metadata(&self, isbn: &str) -> ProviderResult<Option<ProviderEditionRecord>> {
        let mut record = self.record.clone();
        record.isbn = isbn.to_string();
        Ok(Some(record))
    }

    async fn batch_fetch_metadata(&self, isbns: &[String]) -> ProviderResult<Vec<ProviderEditionRecord>> {
        let mut out = Vec::with_capacity(isbns.len());
        for isbn in isbns {
            let mut record = self.record.clone();
            record.isbn = isbn.clone();
            out.push(record);
        }
        Ok(out)
    }

    async fn resolve_isbn(&self, query: &ResolveQuery) -> ProviderResult<Option<ResolvedIsbn>> {
        let isbn = match &query.isbn {
            Some(isbn) => isbn.clone(),
            None => return Ok(None),
        };
        Ok(Some(ResolvedIsbn {
            isbn,
            confidence: 90,
            method: alexandria_providers::ResolutionMethod::IsbnExact,
        }))
    }

    async fn fetch_cover(&self, _isbn: &str) -> ProviderResult<Option<ImageSet>> {
        Ok(self.cover.clone())
    }
}

/// An `AuthorProvider` returning a fixed, caller-supplied record (or none)
/// for any author name it's asked about.
pub struct FixedAuthorProvider {
    pub record: Option<ProviderAuthorRecord>,
}

#[async_trait]
impl AuthorProvider for FixedAuthorProvider {
    fn name(&self) -> &'static str {
        "wikidata"
    }

    async fn fetch_author(&self, _name: &str) -> ProviderResult<Option<ProviderAuthorRecord>> {
        Ok(self.record.clone())
    }
}

/// Records every `upsert_edition`/`set_cover`/`upsert_work`/`link_edition_work`/
/// `link_work_authors` call it receives, so a test can assert on what the
/// pipeline actually wrote without a database.
#[derive(Default)]
pub struct RecordingWriter {
    pub editions: Mutex<HashMap<String, ProviderEditionRecord>>,
    pub covers: Mutex<HashMap<String, (String, String)>>,
    pub works: Mutex<HashMap<String, Vec<String>>>,
    pub edition_work_links: Mutex<HashMap<String, String>>,
    pub work_authors: Mutex<HashMap<String, Vec<String>>>,
}

#[async_trait]
impl EnrichmentWriter for RecordingWriter {
    async fn upsert_edition(&self, isbn: &str, incoming: &ProviderEditionRecord) -> alexandria_merge::Result<Vec<String>> {
        self.editions.lock().unwrap().insert(isbn.to_string(), incoming.clone());
        Ok(vec!["title".to_string()])
    }

    async fn set_cover(&self, isbn: &str, cdn_url: &str, cover_source: &str) -> alexandria_merge::Result<()> {
        self.covers
            .lock()
            .unwrap()
            .insert(isbn.to_string(), (cdn_url.to_string(), cover_source.to_string()));
        Ok(())
    }

    async fn upsert_work(
        &self,
        work_key: &str,
        _source: &str,
        _title: Option<&String>,
        _subtitle: Option<&String>,
        _first_publication_year: Option<i32>,
        subject_tags: &[String],
    ) -> alexandria_merge::Result<Vec<String>> {
        self.works.lock().unwrap().insert(work_key.to_string(), subject_tags.to_vec());
        Ok(vec!["title".to_string()])
    }

    async fn link_edition_work(&self, isbn: &str, work_key: &str) -> alexandria_merge::Result<String> {
        let mut links = self.edition_work_links.lock().unwrap();
        let key = links.entry(isbn.to_string()).or_insert_with(|| work_key.to_string());
        Ok(key.clone())
    }

    async fn link_work_authors(&self, work_key: &str, author_names: &[String]) -> alexandria_merge::Result<()> {
        self.work_authors.lock().unwrap().insert(work_key.to_string(), author_names.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAuthorWriter {
    pub authors: Mutex<HashMap<String, ProviderAuthorRecord>>,
}

#[async_trait]
impl AuthorWriter for RecordingAuthorWriter {
    async fn upsert_author(&self, author_key: &str, incoming: &ProviderAuthorRecord) -> alexandria_merge::Result<Vec<String>> {
        self.authors.lock().unwrap().insert(author_key.to_string(), incoming.clone());
        Ok(vec!["name".to_string()])
    }
}

/// Always grants the month lock; the backfill tests here care about the
/// generation/resolution/persistence flow, not lock contention (which
/// `alexandria-locks`' own tests already cover).
pub struct AlwaysFreeMonthLock;

#[async_trait]
impl MonthLock for AlwaysFreeMonthLock {
    async fn acquire(&self, _year: i32, _month: i32) -> alexandria_locks::Result<bool> {
        Ok(true)
    }
    async fn release(&self, _year: i32, _month: i32) -> alexandria_locks::Result<bool> {
        Ok(true)
    }
    async fn is_locked(&self, _year: i32, _month: i32) -> alexandria_locks::Result<bool> {
        Ok(false)
    }
}

#[derive(Default)]
pub struct RecordingJobStatusStore {
    pub last: Mutex<Option<BackfillJobStatus>>,
}

#[async_trait]
impl JobStatusStore for RecordingJobStatusStore {
    async fn put(&self, status: &BackfillJobStatus) -> alexandria_backfill::Result<()> {
        *self.last.lock().unwrap() = Some(status.clone());
        Ok(())
    }
    async fn get(&self, _job_id: &str) -> alexandria_backfill::Result<Option<BackfillJobStatus>> {
        Ok(self.last.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct RecordingBackfillLogStore {
    pub completed: Mutex<Option<(i32, i32, u32, u32)>>,
    pub failed: Mutex<Option<(i32, i32, String)>>,
}

#[async_trait]
impl BackfillLogStore for RecordingBackfillLogStore {
    async fn mark_processing(&self, _year: i32, _month: i32, _job_id: &str) -> alexandria_backfill::Result<()> {
        Ok(())
    }
    async fn mark_completed(&self, year: i32, month: i32, isbns_resolved: u32, isbns_queued: u32) -> alexandria_backfill::Result<()> {
        *self.completed.lock().unwrap() = Some((year, month, isbns_resolved, isbns_queued));
        Ok(())
    }
    async fn mark_failed(&self, year: i32, month: i32, error: &str) -> alexandria_backfill::Result<()> {
        *self.failed.lock().unwrap() = Some((year, month, error.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSyntheticStore {
    pub works: Mutex<HashMap<String, GeneratedBook>>,
}

#[async_trait]
impl SyntheticStore for RecordingSyntheticStore {
    async fn upsert_synthetic_work(&self, candidate: &GeneratedBook) -> alexandria_backfill::Result<String> {
        let key = synthetic_work_key(&candidate.title, &candidate.author);
        self.works.lock().unwrap().insert(key.clone(), candidate.clone());
        Ok(key)
    }

    async fn upsert_synthetic_edition(&self, _work_key: &str, _candidate: &GeneratedBook) -> alexandria_backfill::Result<bool> {
        Ok(true)
    }

    async fn select_for_enhancement(&self, _limit: i64) -> alexandria_backfill::Result<Vec<(String, Option<String>, Option<String>)>> {
        Ok(Vec::new())
    }

    async fn record_enhancement_attempt(&self, _work_key: &str, _enqueued: bool) -> alexandria_backfill::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEnqueuer {
    pub enqueued: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl EnrichmentEnqueuer for RecordingEnqueuer {
    async fn enqueue(&self, isbn: &str, source: &str) -> bool {
        self.enqueued.lock().unwrap().push((isbn.to_string(), source.to_string()));
        true
    }
}

/// Invents one fixed book per call, independent of `prompt`/`count`, so a
/// backfill test can assert the synthetic-record path without a live LLM.
pub struct FixedGenerator {
    pub books: Vec<GeneratedBook>,
}

#[async_trait]
impl alexandria_providers::GenerativeProvider for FixedGenerator {
    fn name(&self) -> &'static str {
        "fixed-generator"
    }

    async fn generate_books(&self, _prompt: &str, _count: u32) -> ProviderResult<Vec<GeneratedBook>> {
        Ok(self.books.clone())
    }
}
