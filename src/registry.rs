//! Session registry.
//!
//! Side table from a unit-of-work context to its cache stores, one store per
//! cache name. State is created on first access and becomes garbage when the
//! context's last handle is dropped. Dead entries are pruned whenever a new
//! context registers or live contexts are counted; `prune()` does it on demand.

use crate::context::{ContextHandle, ContextId, ContextLiveness};
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::store::CacheStore;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

type ErasedStore = Arc<dyn Any + Send + Sync>;

/// Cache state of one context: cache name → store.
struct ContextCaches {
    liveness: ContextLiveness,
    stores: DashMap<&'static str, ErasedStore>,
}

/// Registry of per-context cache stores.
///
/// # Example
///
/// ```ignore
/// let registry = SessionRegistry::new();
/// let ctx = ContextHandle::new();
///
/// let a = registry.resolve::<Library>(&ctx)?;
/// let b = registry.resolve::<Library>(&ctx)?;
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Default)]
pub struct SessionRegistry {
    contexts: DashMap<ContextId, Arc<ContextCaches>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        SessionRegistry {
            contexts: DashMap::new(),
        }
    }

    /// Return the store for `T` in `context`, creating it if absent.
    ///
    /// Idempotent per (context, cache name): repeated calls return the same
    /// store instance.
    ///
    /// # Errors
    ///
    /// `Error::StoreTypeMismatch` if the cache name of `T` is already bound to
    /// another entity type in this context.
    pub fn resolve<T: CacheEntity>(&self, context: &ContextHandle) -> Result<Arc<CacheStore<T>>> {
        let caches = self.context_caches(context);
        let name = T::cache_prefix();

        let erased = caches
            .stores
            .entry(name)
            .or_insert_with(|| {
                debug!("» New {} cache store for context {}", name, context.id());
                Arc::new(CacheStore::<T>::new()) as ErasedStore
            })
            .clone();

        erased
            .downcast::<CacheStore<T>>()
            .map_err(|_| Error::StoreTypeMismatch {
                cache: name.to_string(),
            })
    }

    /// Number of contexts with live cache state. Drops the state of ended
    /// contexts first.
    pub fn context_count(&self) -> usize {
        self.prune();
        self.contexts.len()
    }

    /// Whether `context` has live cache state.
    pub fn contains(&self, context: &ContextHandle) -> bool {
        self.contexts
            .get(&context.id())
            .is_some_and(|entry| entry.value().liveness.is_alive())
    }

    fn context_caches(&self, context: &ContextHandle) -> Arc<ContextCaches> {
        let id = context.id();
        if let Some(existing) = self.contexts.get(&id) {
            return Arc::clone(existing.value());
        }

        self.prune();
        Arc::clone(
            self.contexts
                .entry(id)
                .or_insert_with(|| {
                    Arc::new(ContextCaches {
                        liveness: context.liveness(),
                        stores: DashMap::new(),
                    })
                })
                .value(),
        )
    }

    /// Drop cache state of contexts that have ended, returning how many were
    /// dropped.
    ///
    /// Runs on its own whenever a new context registers or
    /// [`context_count`](Self::context_count) is called; call it directly to
    /// release entities held for ended contexts in an otherwise idle registry.
    pub fn prune(&self) -> usize {
        let before = self.contexts.len();
        self.contexts
            .retain(|_, caches| caches.liveness.is_alive());
        let dropped = before.saturating_sub(self.contexts.len());
        if dropped > 0 {
            debug!("✓ Pruned cache state of {} ended context(s)", dropped);
        }
        dropped
    }
}
