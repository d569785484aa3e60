//! Shared memoization wrapper around [`BoundedCache`].

use std::hash::Hash;
use std::sync::Arc;

use beacon_core::Clock;
use parking_lot::Mutex;
use tracing::debug;

use crate::bounded::{BoundedCache, CacheStats};
use crate::config::CacheConfig;

/// Thread-safe memo table for expensive async lookups.
///
/// The lock is never held across the fetch, so two concurrent misses for the
/// same key may both fetch; the later result wins.
pub struct MemoCache<K, V> {
    inner: Mutex<BoundedCache<K, V>>,
}

impl<K, V> MemoCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a memo table on the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(BoundedCache::new(config)),
        }
    }

    /// Create a memo table reading time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(BoundedCache::with_clock(config, clock)),
        }
    }

    /// Cached value for `key`, if present and unexpired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    /// Store a value.
    pub fn insert(&self, key: K, value: V) {
        self.inner.lock().set(key, value);
    }

    /// Forget one key.
    pub fn invalidate(&self, key: &K) {
        let _ = self.inner.lock().delete(key);
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }

    /// Return the cached value or run `fetch` and cache its `Ok` result.
    ///
    /// Errors are returned as-is and never cached.
    pub async fn get_or_try_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        debug!("memo cache miss, fetching");
        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::test_utils::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn memo(ttl_ms: Option<u64>) -> (MemoCache<String, String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig::new(4, ttl_ms.map(Duration::from_millis));
        (MemoCache::with_clock(config, clock.clone()), clock)
    }

    #[tokio::test]
    async fn fetches_once_then_serves_from_cache() {
        let (cache, _) = memo(None);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        for _ in 0..3 {
            let v: Result<String, ()> = cache
                .get_or_try_fetch("ws-1".to_string(), move || async move {
                    let _ = calls.fetch_add(1, Ordering::SeqCst);
                    Ok("models".to_string())
                })
                .await;
            assert_eq!(v.unwrap(), "models");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let (cache, _) = memo(None);
        let first: Result<String, &str> = cache
            .get_or_try_fetch("k".to_string(), || async { Err("offline") })
            .await;
        assert_eq!(first, Err("offline"));
        assert!(cache.get(&"k".to_string()).is_none());

        let second: Result<String, &str> = cache
            .get_or_try_fetch("k".to_string(), || async { Ok("v".to_string()) })
            .await;
        assert_eq!(second.unwrap(), "v");
    }

    #[tokio::test]
    async fn refetches_after_expiry() {
        let (cache, clock) = memo(Some(1000));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(format!("v{n}"))
        };
        assert_eq!(cache.get_or_try_fetch("k".into(), fetch).await.unwrap(), "v0");
        clock.advance(Duration::from_millis(1000));
        assert_eq!(cache.get_or_try_fetch("k".into(), fetch).await.unwrap(), "v1");
    }

    #[test]
    fn invalidate_and_clear() {
        let (cache, _) = memo(None);
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        cache.invalidate(&"a".to_string());
        assert!(cache.get(&"a".to_string()).is_none());
        cache.clear();
        assert!(cache.get(&"b".to_string()).is_none());
    }
}
