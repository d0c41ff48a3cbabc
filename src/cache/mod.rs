//! Shared in-memory caches.
//!
//! Every cache is an [`RwCache`]: a sharded concurrent map of shared,
//! immutable entries. Reads take a shard's read lock only; the map
//! itself is never handed out.

mod query;

pub use query::{CachedQuery, QueryCache, ScannerKey, statement_key};

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Concurrent map of `K` to shared `V`.
pub struct RwCache<K, V: ?Sized> {
    map: DashMap<K, Arc<V>>,
}

impl<K: Eq + Hash, V: ?Sized> RwCache<K, V> {
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    /// Insert or replace. Concurrent writers to one key: last one wins.
    pub fn set(&self, key: K, value: Arc<V>) {
        self.map.insert(key, value);
    }

    /// Insert `value` unless `key` is present; return whichever entry is
    /// in the map afterwards. The first writer wins and losing
    /// candidates are dropped without ever being visible.
    pub fn get_or_set(&self, key: K, value: Arc<V>) -> Arc<V> {
        if let Some(existing) = self.get(&key) {
            return existing;
        }
        // Re-checked under the shard's write lock.
        self.map.entry(key).or_insert(value).value().clone()
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.map.remove(key).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}

impl<K: Eq + Hash, V: ?Sized> Default for RwCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Hit/miss counters of a cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_set_then_get() {
        let cache: RwCache<u64, String> = RwCache::new();
        assert!(cache.get(&1).is_none());
        cache.set(1, Arc::new("a".into()));
        assert_eq!(cache.get(&1).as_deref().map(String::as_str), Some("a"));
        cache.set(1, Arc::new("b".into()));
        assert_eq!(cache.get(&1).as_deref().map(String::as_str), Some("b"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_or_set_keeps_first() {
        let cache: RwCache<&str, i32> = RwCache::new();
        let first = cache.get_or_set("k", Arc::new(1));
        let second = cache.get_or_set("k", Arc::new(2));
        assert_eq!(*second, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_get_or_set_race_single_winner() {
        let cache: RwCache<u8, usize> = RwCache::new();
        let barrier = Barrier::new(16);
        let winners: Vec<Arc<usize>> = thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let cache = &cache;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        cache.get_or_set(0, Arc::new(i))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let stored = cache.get(&0).unwrap();
        assert!(winners.iter().all(|w| Arc::ptr_eq(w, &stored)));
    }

    #[test]
    fn test_remove_and_clear() {
        let cache: RwCache<u8, u8> = RwCache::new();
        cache.set(1, Arc::new(1));
        cache.set(2, Arc::new(2));
        assert_eq!(cache.remove(&1).as_deref(), Some(&1));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            entries: 1,
            hits: 3,
            misses: 1,
        };
        assert_eq!(stats.hit_rate(), 75.0);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
