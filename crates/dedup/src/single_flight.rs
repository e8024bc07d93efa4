//! Request-scoped single-flight deduplication (spec §5, §9): two concurrent
//! enrichment requests for the same ISBN must share one in-flight provider
//! call rather than both paying for it. Grounded on the teacher's
//! "keyed in-flight future map per request" design note, built on
//! `tokio::sync::OnceCell`'s `get_or_try_init` — the first caller for a key
//! runs the future, every other caller for the same key awaits its result.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

pub struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` for `key`, sharing the result with any concurrent caller
    /// already in flight for the same key. The in-flight entry is evicted
    /// once the call completes, so a later, independent call for the same
    /// key runs fresh rather than replaying a stale cached value.
    pub async fn run<F, Fut, E>(&self, key: K, f: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = {
            let mut map = self.inflight.lock().await;
            map.entry(key.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let result = cell.get_or_try_init(f).await.cloned();

        let mut map = self.inflight.lock().await;
        if let Some(entry) = map.get(&key) {
            if Arc::ptr_eq(entry, &cell) {
                map.remove(&key);
            }
        }

        result
    }
}
