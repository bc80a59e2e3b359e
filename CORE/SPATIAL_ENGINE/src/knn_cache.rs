// ═══════════════════════════════════════════════════════════════════════════════
// FILE: knn_cache.rs | CORE/SPATIAL_ENGINE/src/knn_cache.rs
// PURPOSE: Version-keyed LRU cache of k-NN query results
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// Entries are keyed by (query cell, k, distance bucket) and carry the global
// version they were computed at. Any mutation advances the global version,
// which invalidates the whole cache in constant time: stale entries simply
// fail the version check on lookup. The common miss path after a mutation is
// lock-free - a single atomic read of the newest stored version rules the
// whole cache out.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::query::KnnHit;

/// Cache key: the query's enclosing cell (hashed key), k, and a logarithmic
/// max-distance bucket so nearby radii share entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KnnCacheKey {
    pub cell: u64,
    pub k: usize,
    pub distance_bucket: u8,
}

impl KnnCacheKey {
    /// Bucket unbounded and bounded radii separately; bounded ones by the
    /// exponent of the radius.
    pub fn bucket_for(max_distance: f32) -> u8 {
        if !max_distance.is_finite() {
            return u8::MAX;
        }
        let clamped = max_distance.max(1.0);
        (clamped.log2().ceil() as i32).clamp(0, 254) as u8
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KnnCacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct LruInner {
    entries: HashMap<KnnCacheKey, (u64, Vec<KnnHit>)>,
    order: VecDeque<KnnCacheKey>,
}

/// Bounded LRU of k-NN results, invalidated wholesale by version advance
pub struct KnnCache {
    inner: Mutex<LruInner>,
    capacity: usize,
    /// Version of the most recently stored entry; a cheaper-than-lock upper
    /// bound on the freshness of anything inside
    newest_version: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl KnnCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            newest_version: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached result valid at `current_version`, if any
    pub fn lookup(&self, key: &KnnCacheKey, current_version: u64) -> Option<Vec<KnnHit>> {
        // lock-free fast path: nothing stored at the current version
        if self.newest_version.load(Ordering::Acquire) != current_version {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let mut inner = self.inner.lock();
        let cached = inner.entries.get(key).map(|(v, h)| (*v, h.clone()));
        match cached {
            Some((version, hits)) if version == current_version => {
                // refresh recency
                if let Some(pos) = inner.order.iter().position(|k| k == key) {
                    inner.order.remove(pos);
                }
                inner.order.push_back(*key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(hits)
            }
            Some(_) => {
                // stale entry: drop it eagerly
                inner.entries.remove(key);
                if let Some(pos) = inner.order.iter().position(|k| k == key) {
                    inner.order.remove(pos);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn store(&self, key: KnnCacheKey, version: u64, hits: Vec<KnnHit>) {
        let mut inner = self.inner.lock();
        if inner.entries.len() >= self.capacity && !inner.entries.contains_key(&key) {
            // evict least recently used
            while let Some(victim) = inner.order.pop_front() {
                if inner.entries.remove(&victim).is_some() {
                    break;
                }
            }
        }
        if let Some(pos) = inner.order.iter().position(|k| k == &key) {
            inner.order.remove(pos);
        }
        inner.order.push_back(key);
        inner.entries.insert(key, (version, hits));
        self.newest_version.store(version, Ordering::Release);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> KnnCacheStats {
        KnnCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;

    fn hit(id: u64, distance: f32) -> KnnHit {
        KnnHit {
            id: EntityId::Seq(id),
            distance,
        }
    }

    fn key(cell: u64) -> KnnCacheKey {
        KnnCacheKey {
            cell,
            k: 2,
            distance_bucket: u8::MAX,
        }
    }

    #[test]
    fn test_hit_at_matching_version() {
        let cache = KnnCache::new(8);
        cache.store(key(1), 10, vec![hit(1, 0.5)]);
        assert_eq!(cache.lookup(&key(1), 10).unwrap().len(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_version_advance_invalidates() {
        let cache = KnnCache::new(8);
        cache.store(key(1), 10, vec![hit(1, 0.5)]);
        // a mutation bumped the global version
        assert!(cache.lookup(&key(1), 11).is_none());
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = KnnCache::new(2);
        cache.store(key(1), 5, vec![]);
        cache.store(key(2), 5, vec![]);
        // touch 1 so 2 becomes the eviction victim
        assert!(cache.lookup(&key(1), 5).is_some());
        cache.store(key(3), 5, vec![]);
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(&key(2), 5).is_none());
        assert!(cache.lookup(&key(1), 5).is_some());
        assert!(cache.lookup(&key(3), 5).is_some());
    }

    #[test]
    fn test_distance_buckets() {
        assert_eq!(
            KnnCacheKey::bucket_for(f32::INFINITY),
            KnnCacheKey::bucket_for(f32::INFINITY)
        );
        assert_eq!(KnnCacheKey::bucket_for(100.0), KnnCacheKey::bucket_for(100.0));
        assert_ne!(KnnCacheKey::bucket_for(2.0), KnnCacheKey::bucket_for(1000.0));
        assert_ne!(KnnCacheKey::bucket_for(100.0), KnnCacheKey::bucket_for(f32::INFINITY));
    }
}
