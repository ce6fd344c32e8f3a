//! Bounded, TTL'd caches for the Knowledge Graph Service (spec §4.2 "Caches").
//!
//! `searchCache` and `entityCache` are both instances of the same generic
//! wrapper: an `lru::LruCache` under a `parking_lot::Mutex`, with a
//! per-entry insertion timestamp checked on read. Invalidation is coarse —
//! any entity write clears the whole search cache and evicts the written
//! entity from the entity cache (spec §4.2: "coarse but correct").

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A capacity-bounded, TTL-expiring cache safe for concurrent access.
pub struct TtlLruCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlLruCache<K, V> {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl,
        }
    }

    /// Fetch a value, returning `None` on miss or expiry. An expired entry is
    /// evicted on access.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock();
        let hit = guard.get(key).map(|e| (e.value.clone(), e.inserted_at.elapsed() > self.ttl));
        match hit {
            Some((_, true)) => {
                guard.pop(key);
                None
            }
            Some((value, false)) => Some(value),
            None => None,
        }
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.inner.lock().pop(key);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let cache: TtlLruCache<String, i32> = TtlLruCache::new(10, Duration::from_secs(60));
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache: TtlLruCache<String, i32> = TtlLruCache::new(10, Duration::from_secs(60));
        assert_eq!(cache.get(&"missing".to_string()), None);
    }

    #[test]
    fn expired_entries_are_evicted_on_read() {
        let cache: TtlLruCache<String, i32> = TtlLruCache::new(10, Duration::from_millis(10));
        cache.put("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_lru_entry() {
        let cache: TtlLruCache<i32, i32> = TtlLruCache::new(2, Duration::from_secs(60));
        cache.put(1, 1);
        cache.put(2, 2);
        cache.put(3, 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn invalidate_removes_single_entry() {
        let cache: TtlLruCache<String, i32> = TtlLruCache::new(10, Duration::from_secs(60));
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.invalidate(&"a".to_string());
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"b".to_string()), Some(2));
    }

    #[test]
    fn clear_empties_cache() {
        let cache: TtlLruCache<String, i32> = TtlLruCache::new(10, Duration::from_secs(60));
        cache.put("a".to_string(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
