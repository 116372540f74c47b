//! Persistence seam: the unit of work and the data repository.
//!
//! The table cache does not own entities. It borrows two capabilities from the
//! persistence layer:
//!
//! - **`UnitOfWork`**: which context (session, transaction scope) a lookup
//!   belongs to. Cache state is partitioned by this context.
//! - **`DataRepository<T>`**: fetching one entity by id (the default miss
//!   fallback), fetching the whole table (for warming), and reporting whether
//!   a cached reference is still live inside the session.
//!
//! # Implementing the traits
//!
//! Implement both traits on your session type:
//!
//! ```ignore
//! impl UnitOfWork for DbSession {
//!     fn context(&self) -> &ContextHandle {
//!         &self.context
//!     }
//! }
//!
//! impl DataRepository<Library> for DbSession {
//!     async fn fetch_by_id(&self, id: &i64) -> Result<Option<Arc<Library>>> {
//!         self.identity_map.get_or_load(*id).await
//!     }
//!
//!     fn entity_state(&self, entity: &Arc<Library>) -> EntityState {
//!         self.identity_map.state_of(entity)
//!     }
//! }
//! ```
//!
//! # Mocking for Tests
//!
//! [`InMemorySession`] is a small identity-map session that implements both
//! traits and counts fallback fetches.

use crate::context::ContextHandle;
use crate::entity::CacheEntity;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Lifecycle state of an entity reference inside its session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EntityState {
    /// Loaded and attached to the session.
    #[default]
    Persistent,

    /// Added to the session, not yet flushed.
    Pending,

    /// Marked for deletion; the delete has not been flushed yet.
    PendingDeletion,

    /// Deleted and flushed within the session.
    Deleted,

    /// No longer attached to the session (expunged, or never was).
    Detached,
}

impl EntityState {
    /// Whether a cached reference in this state may be handed out.
    pub fn is_live(&self) -> bool {
        matches!(self, EntityState::Persistent | EntityState::Pending)
    }
}

/// A unit of work that cache state can be attached to.
pub trait UnitOfWork: Send + Sync {
    /// Identity of this unit of work.
    fn context(&self) -> &ContextHandle;
}

/// Trait for data repository implementations.
///
/// Abstracts the persistence session, decoupling the cache from a specific
/// ORM or database client.
#[allow(async_fn_in_trait)]
pub trait DataRepository<T: CacheEntity>: Send + Sync {
    /// Fetch one entity by id from the primary data source.
    ///
    /// Called by `TableCache::by_id()` on a miss.
    ///
    /// # Returns
    /// - `Ok(Some(entity))` - Entity found
    /// - `Ok(None)` - Entity not found (not an error, never cached)
    /// - `Err(e)` - Database error, propagated to the caller unchanged
    ///
    /// # Errors
    /// Returns `Err` if data source is unavailable or fetch fails
    async fn fetch_by_id(&self, id: &T::Id) -> Result<Option<Arc<T>>>;

    /// Optional: Get all entities of the table, used to warm a cache.
    ///
    /// # Errors
    /// Returns `Err` if not implemented or if data source operation fails
    async fn fetch_all(&self) -> Result<Vec<Arc<T>>> {
        Err(crate::error::Error::NotImplemented(
            "fetch_all not implemented for this repository".to_string(),
        ))
    }

    /// Report the session state of a reference previously handed out.
    ///
    /// Only live states (`Persistent`, `Pending`) pass the cache's validity
    /// check.
    fn entity_state(&self, entity: &Arc<T>) -> EntityState;
}

// ============================================================================
// In-Memory Test Session
// ============================================================================

/// Identity-map session for testing table-cache users.
///
/// Every entity is stored once as an `Arc<T>`; `fetch_by_id()` hands out that
/// same reference, so tests can compare references with `Arc::ptr_eq`.
/// Entity states can be changed to simulate deletes and expunges made by code
/// the cache does not see.
///
/// # Example Usage
///
/// ```ignore
/// let mut session = InMemorySession::new();
/// let library = session.add(Library { id: 1, short_name: "NYPL".into() });
///
/// let cache = TableCache::new();
/// let found = cache.by_id::<Library, _>(&session, &1).await?;
/// assert!(Arc::ptr_eq(&found.unwrap(), &library));
///
/// session.delete(&1);
/// assert_eq!(session.fetch_count(), 1);
/// ```
pub struct InMemorySession<T: CacheEntity> {
    context: ContextHandle,
    rows: HashMap<T::Id, Arc<T>>,
    states: HashMap<T::Id, EntityState>,
    fetches: AtomicUsize,
}

impl<T: CacheEntity> InMemorySession<T> {
    /// Create an empty session with its own context.
    pub fn new() -> Self {
        Self::with_context(ContextHandle::new())
    }

    /// Create an empty session bound to an existing context.
    pub fn with_context(context: ContextHandle) -> Self {
        InMemorySession {
            context,
            rows: HashMap::new(),
            states: HashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Add an entity as a persistent row and return the session's reference.
    ///
    /// Adding a row with an existing id replaces the previous reference.
    pub fn add(&mut self, entity: T) -> Arc<T> {
        let id = entity.id();
        let entity = Arc::new(entity);
        self.rows.insert(id.clone(), Arc::clone(&entity));
        self.states.insert(id, EntityState::Persistent);
        entity
    }

    /// Set the state of the row with `id`.
    pub fn set_state(&mut self, id: &T::Id, state: EntityState) {
        if self.rows.contains_key(id) {
            self.states.insert(id.clone(), state);
        }
    }

    /// Mark the row with `id` for deletion (not yet flushed).
    pub fn delete(&mut self, id: &T::Id) {
        self.set_state(id, EntityState::PendingDeletion);
    }

    /// Drop the row with `id` from the identity map.
    ///
    /// References handed out earlier become detached.
    pub fn expunge(&mut self, id: &T::Id) -> Option<Arc<T>> {
        self.states.remove(id);
        self.rows.remove(id)
    }

    /// Number of `fetch_by_id()` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of rows in the identity map.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Return true if the session holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn state_of(&self, id: &T::Id) -> EntityState {
        self.states.get(id).copied().unwrap_or(EntityState::Detached)
    }
}

impl<T: CacheEntity> Default for InMemorySession<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CacheEntity> UnitOfWork for InMemorySession<T> {
    fn context(&self) -> &ContextHandle {
        &self.context
    }
}

impl<T: CacheEntity> DataRepository<T> for InMemorySession<T> {
    async fn fetch_by_id(&self, id: &T::Id) -> Result<Option<Arc<T>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.state_of(id).is_live() {
            return Ok(None);
        }
        Ok(self.rows.get(id).cloned())
    }

    async fn fetch_all(&self) -> Result<Vec<Arc<T>>> {
        Ok(self
            .rows
            .iter()
            .filter(|(id, _)| self.state_of(id).is_live())
            .map(|(_, entity)| Arc::clone(entity))
            .collect())
    }

    fn entity_state(&self, entity: &Arc<T>) -> EntityState {
        let id = entity.id();
        match self.rows.get(&id) {
            Some(attached) if Arc::ptr_eq(attached, entity) => self.state_of(&id),
            _ => EntityState::Detached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestEntity {
        id: u64,
        name: String,
    }

    impl CacheEntity for TestEntity {
        type Id = u64;
        type Key = String;

        fn id(&self) -> Self::Id {
            self.id
        }

        fn cache_key(&self) -> Self::Key {
            self.name.clone()
        }

        fn cache_prefix() -> &'static str {
            "test"
        }
    }

    fn entity(id: u64, name: &str) -> TestEntity {
        TestEntity {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_entity_state_liveness() {
        assert!(EntityState::Persistent.is_live());
        assert!(EntityState::Pending.is_live());
        assert!(!EntityState::PendingDeletion.is_live());
        assert!(!EntityState::Deleted.is_live());
        assert!(!EntityState::Detached.is_live());
    }

    #[tokio::test]
    async fn test_in_memory_session_fetch() {
        let mut session = InMemorySession::new();
        let added = session.add(entity(1, "a"));

        let fetched = session
            .fetch_by_id(&1)
            .await
            .expect("Failed to fetch")
            .expect("Entity not found");

        assert!(Arc::ptr_eq(&added, &fetched));
        assert_eq!(session.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_session_miss() {
        let session: InMemorySession<TestEntity> = InMemorySession::new();

        let fetched = session.fetch_by_id(&42).await.expect("Failed to fetch");
        assert!(fetched.is_none());
        assert_eq!(session.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_deleted_rows_are_not_fetched() {
        let mut session = InMemorySession::new();
        session.add(entity(1, "a"));
        session.add(entity(2, "b"));
        session.delete(&1);

        assert!(session.fetch_by_id(&1).await.expect("fetch").is_none());

        let all = session.fetch_all().await.expect("Failed to fetch all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, 2);
    }

    #[test]
    fn test_entity_state_tracks_identity() {
        let mut session = InMemorySession::new();
        let first = session.add(entity(1, "a"));
        assert_eq!(session.entity_state(&first), EntityState::Persistent);

        // Replacing the row detaches the old reference
        let second = session.add(entity(1, "a"));
        assert_eq!(session.entity_state(&first), EntityState::Detached);
        assert_eq!(session.entity_state(&second), EntityState::Persistent);

        session.delete(&1);
        assert_eq!(session.entity_state(&second), EntityState::PendingDeletion);

        session.expunge(&1);
        assert_eq!(session.entity_state(&second), EntityState::Detached);
        assert!(session.is_empty());
    }

    #[test]
    fn test_set_state_ignores_unknown_rows() {
        let mut session: InMemorySession<TestEntity> = InMemorySession::new();
        session.set_state(&9, EntityState::Deleted);
        assert_eq!(session.len(), 0);
        assert_eq!(session.state_of(&9), EntityState::Detached);
    }
}
