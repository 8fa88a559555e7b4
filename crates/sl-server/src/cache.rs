//! Read-through TTL cache for the query-serving layer.
//!
//! Durable state stays authoritative: the cache only shortcuts repeated disk
//! reads on the hot status path, and mutating handlers invalidate their
//! video's entry. Expired entries are evicted lazily on lookup.

use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct CacheEntry<V> {
    inserted_at: Instant,
    value: V,
}

/// In-memory cache where every entry expires `ttl` after insertion.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    /// Look up a live entry, evicting it if its TTL has passed.
    pub fn get(&self, key: &K) -> Option<V> {
        {
            let entry = self.entries.get(key)?;
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
            // The shard read guard must drop before the remove below.
        }
        self.entries.remove(key);
        None
    }

    /// Insert or refresh an entry, restarting its TTL.
    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, CacheEntry { inserted_at: Instant::now(), value });
    }

    /// Drop an entry immediately, if present.
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }
}
