//! LRU + TTL key/value store.
//!
//! Insertion order of the backing [`IndexMap`] doubles as recency order: the
//! front is least recently used, the back most recently used. A read moves
//! the entry to the back; eviction pops the front. Expiry is checked lazily
//! on access, there is no sweeper task.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use beacon_core::{Clock, SystemClock};
use indexmap::{Equivalent, IndexMap};
use tracing::trace;

use crate::config::CacheConfig;

struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Cache statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheStats {
    /// Number of entries currently stored (including not-yet-noticed expired ones).
    pub size: usize,
    /// Reads that returned a value.
    pub hits: u64,
    /// Reads that found nothing or found an expired entry.
    pub misses: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: u64,
}

impl CacheStats {
    /// Hit rate (0.0 to 1.0).
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded least-recently-used cache with optional per-entry TTL.
///
/// `len() <= max_entries` holds after every call.
pub struct BoundedCache<K, V> {
    entries: IndexMap<K, CacheEntry<V>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq,
{
    /// Create a cache reading time from the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: IndexMap::with_capacity(config.max_entries().get().min(1024)),
            config,
            clock,
            stats: CacheStats::default(),
        }
    }

    /// Look up `key`, marking it most recently used.
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let now = self.clock.now();
        let Some((_, k, entry)) = self.entries.shift_remove_full(key) else {
            self.stats.misses += 1;
            return None;
        };
        if entry.is_expired(now) {
            self.stats.misses += 1;
            self.stats.expirations += 1;
            trace!("cache entry expired on read");
            return None;
        }
        self.stats.hits += 1;
        let (index, _) = self.entries.insert_full(k, entry);
        self.entries.get_index(index).map(|(_, e)| &e.value)
    }

    /// Store `value` under `key` as the most recently used entry, evicting
    /// the least recently used entries while over capacity.
    pub fn set(&mut self, key: K, value: V) {
        let expires_at = self.config.ttl().map(|ttl| self.clock.now() + ttl);
        let _ = self.entries.shift_remove(&key);
        let _ = self.entries.insert(key, CacheEntry { value, expires_at });
        while self.entries.len() > self.config.max_entries().get() {
            if self.entries.shift_remove_index(0).is_none() {
                break;
            }
            self.stats.evictions += 1;
        }
    }

    /// Remove `key`, returning its value if it was present and unexpired.
    pub fn delete<Q>(&mut self, key: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let now = self.clock.now();
        self.entries
            .shift_remove(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value)
    }

    /// Whether an unexpired entry exists. Does not change recency.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let now = self.clock.now();
        self.entries.get(key).is_some_and(|e| !e.is_expired(now))
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop every expired entry now instead of waiting for it to be read.
    /// Returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let removed = before - self.entries.len();
        self.stats.expirations += removed as u64;
        removed
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            ..self.stats
        }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::test_utils::ManualClock;
    use proptest::prelude::*;
    use std::time::Duration;

    fn cache(max: usize, ttl_ms: Option<u64>) -> (BoundedCache<String, u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig::new(max, ttl_ms.map(Duration::from_millis));
        (BoundedCache::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn set_and_get() {
        let (mut c, _) = cache(10, None);
        c.set("a".into(), 1);
        assert_eq!(c.get("a"), Some(&1));
        assert_eq!(c.get("b"), None);
        assert_eq!(c.stats().hits, 1);
        assert_eq!(c.stats().misses, 1);
    }

    #[test]
    fn set_replaces_existing_value() {
        let (mut c, _) = cache(10, None);
        c.set("a".into(), 1);
        c.set("a".into(), 2);
        assert_eq!(c.len(), 1);
        assert_eq!(c.get("a"), Some(&2));
    }

    #[test]
    fn evicts_least_recently_inserted() {
        let (mut c, _) = cache(2, None);
        c.set("a".into(), 1);
        c.set("b".into(), 2);
        c.set("c".into(), 3);
        assert!(!c.contains_key("a"));
        assert!(c.contains_key("b"));
        assert!(c.contains_key("c"));
        assert_eq!(c.stats().evictions, 1);
    }

    #[test]
    fn read_refreshes_recency() {
        let (mut c, _) = cache(2, None);
        c.set("a".into(), 1);
        c.set("b".into(), 2);
        assert_eq!(c.get("a"), Some(&1));
        c.set("c".into(), 3);
        assert!(c.contains_key("a"));
        assert!(!c.contains_key("b"));
    }

    #[test]
    fn contains_key_does_not_refresh_recency() {
        let (mut c, _) = cache(2, None);
        c.set("a".into(), 1);
        c.set("b".into(), 2);
        assert!(c.contains_key("a"));
        c.set("c".into(), 3);
        assert!(!c.contains_key("a"));
    }

    #[test]
    fn overwrite_refreshes_recency() {
        let (mut c, _) = cache(2, None);
        c.set("a".into(), 1);
        c.set("b".into(), 2);
        c.set("a".into(), 10);
        c.set("c".into(), 3);
        assert_eq!(c.get("a"), Some(&10));
        assert!(!c.contains_key("b"));
    }

    #[test]
    fn entry_expires_exactly_at_deadline() {
        let (mut c, clock) = cache(10, Some(1000));
        c.set("a".into(), 1);
        clock.advance(Duration::from_millis(999));
        assert_eq!(c.get("a"), Some(&1));
        clock.advance(Duration::from_millis(1));
        assert_eq!(c.get("a"), None);
        assert!(c.is_empty());
        assert_eq!(c.stats().expirations, 1);
        // already gone, no second expiry
        assert_eq!(c.get("a"), None);
        assert_eq!(c.stats().expirations, 1);
    }

    #[test]
    fn reading_does_not_extend_ttl() {
        let (mut c, clock) = cache(10, Some(1000));
        c.set("a".into(), 1);
        clock.advance(Duration::from_millis(600));
        assert!(c.get("a").is_some());
        clock.advance(Duration::from_millis(600));
        assert!(c.get("a").is_none());
    }

    #[test]
    fn no_ttl_never_expires() {
        let (mut c, clock) = cache(10, None);
        c.set("a".into(), 1);
        clock.advance(Duration::from_secs(86_400 * 365));
        assert_eq!(c.get("a"), Some(&1));
    }

    #[test]
    fn delete_and_clear() {
        let (mut c, _) = cache(10, None);
        c.set("a".into(), 1);
        c.set("b".into(), 2);
        assert_eq!(c.delete("a"), Some(1));
        assert_eq!(c.delete("a"), None);
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn delete_expired_reports_absent() {
        let (mut c, clock) = cache(10, Some(10));
        c.set("a".into(), 1);
        clock.advance(Duration::from_millis(10));
        assert_eq!(c.delete("a"), None);
        assert!(c.is_empty());
    }

    #[test]
    fn purge_expired_removes_only_stale_entries() {
        let (mut c, clock) = cache(10, Some(100));
        c.set("old".into(), 1);
        clock.advance(Duration::from_millis(60));
        c.set("new".into(), 2);
        clock.advance(Duration::from_millis(50));
        assert_eq!(c.purge_expired(), 1);
        assert_eq!(c.len(), 1);
        assert!(c.contains_key("new"));
    }

    #[test]
    fn hit_rate() {
        let (mut c, _) = cache(10, None);
        assert!((c.stats().hit_rate() - 0.0).abs() < f64::EPSILON);
        c.set("a".into(), 1);
        let _ = c.get("a");
        let _ = c.get("missing");
        assert!((c.stats().hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Set(u8, u32),
        Get(u8),
        Delete(u8),
        Advance(u16),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..16, any::<u32>()).prop_map(|(k, v)| Op::Set(k, v)),
            (0u8..16).prop_map(Op::Get),
            (0u8..16).prop_map(Op::Delete),
            (0u16..500).prop_map(Op::Advance),
        ]
    }

    proptest! {
        #[test]
        fn size_never_exceeds_capacity(
            max in 1usize..8,
            ttl in proptest::option::of(1u64..1000),
            ops in proptest::collection::vec(op(), 0..200),
        ) {
            let (mut c, clock) = cache(max, ttl);
            for op in ops {
                match op {
                    Op::Set(k, v) => {
                        c.set(k.to_string(), v);
                        prop_assert!(c.len() <= max);
                    }
                    Op::Get(k) => { let _ = c.get(k.to_string().as_str()); }
                    Op::Delete(k) => { let _ = c.delete(k.to_string().as_str()); }
                    Op::Advance(ms) => clock.advance(Duration::from_millis(u64::from(ms))),
                }
                prop_assert!(c.len() <= max);
            }
        }

        #[test]
        fn most_recent_set_is_always_readable(
            max in 1usize..8,
            keys in proptest::collection::vec(0u8..32, 1..50),
        ) {
            let (mut c, _) = cache(max, None);
            for (i, k) in keys.iter().enumerate() {
                let v = u32::try_from(i).unwrap_or(u32::MAX);
                c.set(k.to_string(), v);
                prop_assert_eq!(c.get(k.to_string().as_str()), Some(&v));
            }
        }
    }
}
