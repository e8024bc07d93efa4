//! The 24h "ISBN not found" negative cache (spec §4.3.1, §6 `CACHE`
//! namespace): once ISBNdb reports an ISBN as unknown, the enrichment
//! consumer skips the primary fetch for it on any message received within
//! the next day — re-fetching won't help since ISBNdb's own catalog hasn't
//! changed (spec §8 property 6).

use std::sync::Arc;
use std::time::Duration;

use alexandria_kv::{KvStore, Namespace};

const NOT_FOUND_TTL: Duration = Duration::from_secs(24 * 3600);

fn not_found_key(isbn: &str) -> String {
    format!("isbn_not_found:{isbn}")
}

pub struct NegativeCache<K: KvStore> {
    kv: Arc<K>,
}

impl<K: KvStore> NegativeCache<K> {
    pub fn new(kv: Arc<K>) -> Self {
        Self { kv }
    }

    pub async fn is_known_missing(&self, isbn: &str) -> alexandria_kv::Result<bool> {
        self.kv.exists(Namespace::Cache, &not_found_key(isbn)).await
    }

    pub async fn mark_missing(&self, isbn: &str) -> alexandria_kv::Result<()> {
        self.kv
            .set(Namespace::Cache, &not_found_key(isbn), "true", Some(NOT_FOUND_TTL))
            .await
    }
}
