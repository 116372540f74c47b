//! Table cache engine - main entry point for cache operations.

use crate::config::CacheConfig;
use crate::context::ContextHandle;
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::registry::SessionRegistry;
use crate::repository::{DataRepository, UnitOfWork};
use crate::store::{CacheStats, CacheStore, RemoveOutcome};
use futures::{future, TryStream, TryStreamExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Which index a lookup goes through.
enum Index<'a, T: CacheEntity> {
    Id(&'a T::Id),
    Key(&'a T::Key),
}

impl<T: CacheEntity> Index<'_, T> {
    fn probe(&self, store: &CacheStore<T>) -> Option<Arc<T>> {
        match self {
            Index::Id(id) => store.get_by_id(id),
            Index::Key(key) => store.get_by_key(key),
        }
    }
}

impl<T: CacheEntity> fmt::Display for Index<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Id(id) => write!(f, "{}:id={:?}", T::cache_prefix(), id),
            Index::Key(key) => write!(f, "{}:key={:?}", T::cache_prefix(), key),
        }
    }
}

/// Read-through, per-session table cache.
///
/// Resolves entities by id or by cache key against the store of the caller's
/// unit of work, falling back to the persistence layer on a miss. Every hit is
/// checked against the session first; a reference that was deleted or
/// detached behind the cache's back is evicted and the lookup runs again.
///
/// `TableCache` is cheap to clone: clones share the registry and metrics.
///
/// # Example
///
/// ```ignore
/// use table_cache::TableCache;
///
/// let cache = TableCache::new();
///
/// // Miss: fetched through the session, then cached
/// let library = cache.by_id::<Library, _>(&session, &7).await?;
///
/// // Hit: served from the session's store
/// let again = cache.by_id::<Library, _>(&session, &7).await?;
///
/// // Lookup by business key, creating the row if it does not exist
/// let (genre, is_new) = cache
///     .by_cache_key::<Genre, _, _, _>(&session, &"Fantasy".to_string(), || async {
///         Genre::find_or_create(&session, "Fantasy").await
///     })
///     .await?;
/// ```
#[derive(Clone)]
pub struct TableCache {
    registry: Arc<SessionRegistry>,
    metrics: Arc<dyn CacheMetrics>,
    config: CacheConfig,
}

impl TableCache {
    /// Create a cache with its own registry and default configuration.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(SessionRegistry::new()))
    }

    /// Create a cache over an existing registry.
    pub fn with_registry(registry: Arc<SessionRegistry>) -> Self {
        TableCache {
            registry,
            metrics: Arc::new(NoOpMetrics),
            config: CacheConfig::default(),
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set configuration.
    ///
    /// A configuration that fails [`CacheConfig::validate`] is not rejected:
    /// `max_stale_retries` is raised to 1 and a warning is logged.
    pub fn with_config(mut self, mut config: CacheConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!("⚠ {}; using max_stale_retries = 1", e);
            config.max_stale_retries = 1;
        }
        self.config = config;
        self
    }

    /// Get configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get registry reference (for advanced use).
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Return the store for `T` in `context`, creating it if absent.
    ///
    /// # Errors
    /// `Error::StoreTypeMismatch` if `T`'s cache name is taken by another type
    pub fn store<T: CacheEntity>(&self, context: &ContextHandle) -> Result<Arc<CacheStore<T>>> {
        self.registry.resolve::<T>(context)
    }

    /// Snapshot of the counters and index sizes of `T`'s store in `context`.
    ///
    /// # Errors
    /// Same as [`TableCache::store`]
    pub fn stats<T: CacheEntity>(&self, context: &ContextHandle) -> Result<CacheStats> {
        Ok(self.store::<T>(context)?.stats())
    }

    /// Look up an entity by its database id.
    ///
    /// On a miss the entity is fetched with `DataRepository::fetch_by_id()`
    /// and cached if found.
    ///
    /// # Errors
    ///
    /// - `Error::StoreTypeMismatch`: `T`'s cache name is taken by another type
    /// - Any error returned by `fetch_by_id()`, unchanged
    pub async fn by_id<T, S>(&self, session: &S, id: &T::Id) -> Result<Option<Arc<T>>>
    where
        T: CacheEntity,
        S: UnitOfWork + DataRepository<T>,
    {
        self.by_id_with::<T, S, _, _>(session, id, || {
            <S as DataRepository<T>>::fetch_by_id(session, id)
        })
        .await
    }

    /// Look up an entity by its database id with a custom fallback.
    ///
    /// `fallback` runs at most once, and only on a miss.
    ///
    /// # Errors
    ///
    /// - `Error::StoreTypeMismatch`: `T`'s cache name is taken by another type
    /// - Any error returned by `fallback`, unchanged
    pub async fn by_id_with<T, S, F, Fut>(
        &self,
        session: &S,
        id: &T::Id,
        fallback: F,
    ) -> Result<Option<Arc<T>>>
    where
        T: CacheEntity,
        S: UnitOfWork + DataRepository<T>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Arc<T>>>>,
    {
        let (entity, _) = self
            .lookup(session, Index::Id(id), || async move {
                Ok::<_, Error>((fallback().await?, false))
            })
            .await?;
        Ok(entity)
    }

    /// Look up an entity by its cache key.
    ///
    /// On a miss `miss_hook` is called once. It returns the entity (or `None`)
    /// and whether it just created that entity; the flag is handed back
    /// unchanged. A hit always reports `false`.
    ///
    /// # Errors
    ///
    /// - `Error::StoreTypeMismatch`: `T`'s cache name is taken by another type
    /// - Any error returned by `miss_hook`, unchanged
    pub async fn by_cache_key<T, S, F, Fut>(
        &self,
        session: &S,
        key: &T::Key,
        miss_hook: F,
    ) -> Result<(Option<Arc<T>>, bool)>
    where
        T: CacheEntity,
        S: UnitOfWork + DataRepository<T>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Option<Arc<T>>, bool)>>,
    {
        self.lookup(session, Index::Key(key), miss_hook).await
    }

    /// Cache an entity under its id and its cache key.
    ///
    /// # Errors
    /// `Error::StoreTypeMismatch` if `T`'s cache name is taken by another type
    pub fn insert<T: CacheEntity>(&self, context: &ContextHandle, entity: Arc<T>) -> Result<()> {
        self.store::<T>(context)?.insert(entity);
        Ok(())
    }

    /// Evict an entity from both indices.
    ///
    /// If the indices disagree about the entity the whole store for `T` is
    /// cleared (see [`RemoveOutcome::Reset`]).
    ///
    /// # Errors
    /// `Error::StoreTypeMismatch` if `T`'s cache name is taken by another type
    pub fn remove<T: CacheEntity>(
        &self,
        context: &ContextHandle,
        entity: &T,
    ) -> Result<RemoveOutcome> {
        let store = self.store::<T>(context)?;
        Ok(self.evict::<T>(&store, entity))
    }

    /// Pre-populate the store with everything `producer` yields.
    ///
    /// Warm inserts are not lookups: hit and miss counters stay untouched.
    /// Returns the number of entities inserted.
    ///
    /// # Errors
    ///
    /// - `Error::StoreTypeMismatch`: `T`'s cache name is taken by another type
    /// - Any error returned by `producer`, unchanged
    pub async fn warm<T, P, Fut, I>(&self, context: &ContextHandle, producer: P) -> Result<usize>
    where
        T: CacheEntity,
        P: FnOnce() -> Fut,
        Fut: Future<Output = Result<I>>,
        I: IntoIterator<Item = Arc<T>>,
    {
        let store = self.store::<T>(context)?;
        let mut count = 0;
        for entity in producer().await? {
            store.insert(entity);
            count += 1;
        }
        self.finish_warm::<T>(&store, count);
        Ok(count)
    }

    /// Pre-populate the store from a fallible stream of entities.
    ///
    /// Entities received before a stream error stay cached.
    ///
    /// # Errors
    ///
    /// - `Error::StoreTypeMismatch`: `T`'s cache name is taken by another type
    /// - The first error yielded by `stream`
    pub async fn warm_stream<T, St>(&self, context: &ContextHandle, stream: St) -> Result<usize>
    where
        T: CacheEntity,
        St: TryStream<Ok = Arc<T>, Error = Error>,
    {
        let store = self.store::<T>(context)?;
        let count = stream
            .try_fold(0usize, |count, entity| {
                store.insert(entity);
                future::ready(Ok::<usize, Error>(count + 1))
            })
            .await?;
        self.finish_warm::<T>(&store, count);
        Ok(count)
    }

    /// Pre-populate the store with the whole table via
    /// `DataRepository::fetch_all()`.
    ///
    /// # Errors
    ///
    /// - `Error::NotImplemented` if the repository cannot list the table
    /// - Any other error returned by `fetch_all()`
    pub async fn warm_from_repository<T, S>(&self, session: &S) -> Result<usize>
    where
        T: CacheEntity,
        S: UnitOfWork + DataRepository<T>,
    {
        self.warm::<T, _, _, _>(session.context(), || {
            <S as DataRepository<T>>::fetch_all(session)
        })
        .await
    }

    /// Shared lookup path for both indices.
    ///
    /// Loops while the cached entity fails the validity check, evicting it
    /// each time. After `max_stale_retries` evictions the lookup is treated as
    /// a miss regardless of what the store holds.
    async fn lookup<T, S, F, Fut>(
        &self,
        session: &S,
        index: Index<'_, T>,
        fallback: F,
    ) -> Result<(Option<Arc<T>>, bool)>
    where
        T: CacheEntity,
        S: UnitOfWork + DataRepository<T>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Option<Arc<T>>, bool)>>,
    {
        let timer = Instant::now();
        let store = self.store::<T>(session.context())?;
        let cache = T::cache_prefix();

        debug!("» Cache lookup for {} (context {})", index, session.context().id());

        let mut stale_hits = 0;
        while let Some(entity) = index.probe(&store) {
            let state = <S as DataRepository<T>>::entity_state(session, &entity);
            if state.is_live() {
                store.record_hit();
                self.metrics.record_hit(cache, timer.elapsed());
                debug!("✓ Cache hit for {}", index);
                return Ok((Some(entity), false));
            }

            debug!("✗ Stale cache entry for {} ({:?}), evicting", index, state);
            self.metrics.record_stale(cache);
            self.evict::<T>(&store, &entity);

            stale_hits += 1;
            if stale_hits >= self.config.max_stale_retries {
                warn!(
                    "⚠ {} stale entries for {} in one lookup, falling back",
                    stale_hits, index
                );
                break;
            }
        }

        store.record_miss();
        debug!("✗ Cache miss for {}, calling fallback", index);

        let (entity, is_new) = fallback().await?;
        if let Some(entity) = &entity {
            store.insert(Arc::clone(entity));
        }
        self.metrics.record_miss(cache, timer.elapsed());

        Ok((entity, is_new))
    }

    fn evict<T: CacheEntity>(&self, store: &CacheStore<T>, entity: &T) -> RemoveOutcome {
        let outcome = store.remove(entity);
        if outcome == RemoveOutcome::Reset {
            self.metrics.record_reset(T::cache_prefix());
            if self.config.log_stats_on_reset {
                info!("{} store reset, stats: {:?}", T::cache_prefix(), store.stats());
            }
        }
        outcome
    }

    fn finish_warm<T: CacheEntity>(&self, store: &CacheStore<T>, count: usize) {
        self.metrics.record_warm(T::cache_prefix(), count);
        debug!(
            "✓ Warmed {} cache with {} entities ({} cached)",
            T::cache_prefix(),
            count,
            store.len()
        );
    }
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new()
    }
}
