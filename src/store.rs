//! Per-session cache store.
//!
//! Holds the two mirrored indices of one entity type inside one unit of work,
//! plus hit/miss counters. Uses DashMap for each index so a store can be
//! shared through the registry without an outer lock.

use crate::entity::CacheEntity;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result of removing an entity from a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Found and removed under both its id and its cache key.
    Removed,
    /// Present in neither index.
    NotCached,
    /// Present in only one index; the whole store was cleared.
    Reset,
}

/// Cache store for one entity type within one unit of work.
///
/// Every entity in `by_id` is also in `by_key` under its own cache key. Each
/// index update is atomic on its own, the pair is not.
///
/// # Example
///
/// ```ignore
/// let store = CacheStore::<Library>::new();
/// store.insert(Arc::clone(&library));
///
/// assert!(store.contains_id(&library.id()));
/// assert!(store.contains_key(&library.cache_key()));
/// ```
pub struct CacheStore<T: CacheEntity> {
    by_id: DashMap<T::Id, Arc<T>>,
    by_key: DashMap<T::Key, Arc<T>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: CacheEntity> CacheStore<T> {
    /// Create an empty (cold) store.
    pub fn new() -> Self {
        CacheStore {
            by_id: DashMap::new(),
            by_key: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up an entity by id without touching the counters.
    pub fn get_by_id(&self, id: &T::Id) -> Option<Arc<T>> {
        self.by_id.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up an entity by cache key without touching the counters.
    pub fn get_by_key(&self, key: &T::Key) -> Option<Arc<T>> {
        self.by_key.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `id` is indexed.
    pub fn contains_id(&self, id: &T::Id) -> bool {
        self.by_id.contains_key(id)
    }

    /// Whether `key` is indexed.
    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.by_key.contains_key(key)
    }

    /// Index an entity under its id and its cache key.
    ///
    /// Overwrites whatever was stored at either slot (last writer wins).
    pub fn insert(&self, entity: Arc<T>) {
        let id = entity.id();
        let key = entity.cache_key();
        self.by_id.insert(id.clone(), Arc::clone(&entity));
        self.by_key.insert(key.clone(), entity);
        debug!("✓ {} INSERT id={:?} key={:?}", T::cache_prefix(), id, key);
    }

    /// Remove an entity from both indices.
    ///
    /// The id and key are computed from the entity as it is now. If only one
    /// of the two lookups finds something the indices have drifted apart
    /// (the key changed since insertion, or a concurrent writer got in
    /// between), and the whole store is cleared.
    pub fn remove(&self, entity: &T) -> RemoveOutcome {
        let id = entity.id();
        let key = entity.cache_key();
        let id_found = self.by_id.remove(&id).is_some();
        let key_found = self.by_key.remove(&key).is_some();

        match (id_found, key_found) {
            (true, true) => {
                debug!("✓ {} REMOVE id={:?} key={:?}", T::cache_prefix(), id, key);
                RemoveOutcome::Removed
            }
            (false, false) => RemoveOutcome::NotCached,
            _ => {
                warn!(
                    "⚠ {} cache out of sync removing id={:?} key={:?} (id indexed: {}, key indexed: {}); clearing store",
                    T::cache_prefix(),
                    id,
                    key,
                    id_found,
                    key_found
                );
                self.clear();
                RemoveOutcome::Reset
            }
        }
    }

    /// Empty both indices. Counters are kept.
    pub fn clear(&self) {
        self.by_id.clear();
        self.by_key.clear();
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of cache hits served by this store.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of cache misses recorded by this store.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of entities indexed by id.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the store is cold.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.by_key.is_empty()
    }

    /// Snapshot of counters and index sizes.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits(),
            misses: self.misses(),
            ids: self.by_id.len(),
            keys: self.by_key.len(),
        }
    }
}

impl<T: CacheEntity> Default for CacheStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries in the id index
    pub ids: usize,
    /// Entries in the cache-key index
    pub keys: usize,
}

impl CacheStats {
    /// Total lookups counted.
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups that were hits, `None` before the first lookup.
    pub fn hit_ratio(&self) -> Option<f64> {
        match self.lookups() {
            0 => None,
            total => Some(self.hits as f64 / total as f64),
        }
    }
}
