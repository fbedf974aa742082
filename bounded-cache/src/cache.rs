use std::hash::Hash;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use log::debug;
use lru::LruCache;

use crate::size::deep_size_of;
use crate::size::DeepSize;

/// Running counters for one cache instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
    pub live_bytes: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

struct Entry<V> {
    value: Arc<V>,
    size_bytes: usize,
    expires_at: Option<Instant>,
}

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    live_bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Key to value cache bounded by a byte ceiling rather than an entry count.
///
/// Every value's footprint is measured once at insert via [`DeepSize`];
/// inserts that push the total past the ceiling evict least recently used
/// entries until it fits again. Entries may also carry a TTL and are
/// treated as misses (and dropped) once it elapses.
pub struct BoundedCache<K: Hash + Eq, V: DeepSize> {
    inner: Mutex<Inner<K, V>>,
    max_bytes: usize,
}

impl<K: Hash + Eq, V: DeepSize> BoundedCache<K, V> {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                live_bytes: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
            max_bytes,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K, V>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            // A panic mid-operation cannot leave the map structurally
            // broken, so keep serving from the poisoned state.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Look up a key, promoting it to most recently used on a hit.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let now = Instant::now();
        let mut inner = self.lock();
        let live = match inner.entries.get(key) {
            Some(entry) => match entry.expires_at {
                Some(deadline) if deadline <= now => None,
                _ => Some(Arc::clone(&entry.value)),
            },
            None => {
                inner.misses += 1;
                return None;
            }
        };
        if let Some(value) = live {
            inner.hits += 1;
            return Some(value);
        }
        if let Some(entry) = inner.entries.pop(key) {
            inner.live_bytes = inner.live_bytes.saturating_sub(entry.size_bytes);
            inner.expirations += 1;
        }
        inner.misses += 1;
        None
    }

    /// Insert a value, measuring it once and evicting LRU entries until the
    /// total fits under the ceiling. The value just inserted is itself a
    /// candidate: an entry larger than the whole ceiling does not stay
    /// resident.
    pub fn put(&self, key: K, value: V, ttl: Option<Duration>) -> Arc<V> {
        let size_bytes = deep_size_of(&value);
        let value = Arc::new(value);
        let entry = Entry {
            value: Arc::clone(&value),
            size_bytes,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };

        let mut inner = self.lock();
        if let Some(previous) = inner.entries.push(key, entry) {
            // push returns the displaced entry when the key already existed.
            inner.live_bytes = inner.live_bytes.saturating_sub(previous.1.size_bytes);
        }
        inner.live_bytes += size_bytes;

        while inner.live_bytes > self.max_bytes {
            let Some((_, evicted)) = inner.entries.pop_lru() else {
                break;
            };
            inner.live_bytes = inner.live_bytes.saturating_sub(evicted.size_bytes);
            inner.evictions += 1;
        }
        debug!(
            "cache put: {size_bytes} bytes, {} live of {} max",
            inner.live_bytes, self.max_bytes
        );
        value
    }

    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.lock();
        match inner.entries.pop(key) {
            Some(entry) => {
                inner.live_bytes = inner.live_bytes.saturating_sub(entry.size_bytes);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.live_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            entries: inner.entries.len(),
            live_bytes: inner.live_bytes,
        }
    }
}
