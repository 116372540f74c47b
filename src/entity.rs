//! Core entity trait that all cached entities must implement.

use std::fmt::Debug;
use std::hash::Hash;

/// Trait that all entities held by a table cache must implement.
///
/// An entity is indexed twice: by its stable database identifier and by a
/// cache key derived from its logical business key. The cache key must not be
/// derived from the identifier, and it must be deterministic for as long as
/// the entity is cached.
///
/// # Example
///
/// ```
/// use table_cache::CacheEntity;
///
/// pub struct Library {
///     pub id: i64,
///     pub short_name: String,
/// }
///
/// impl CacheEntity for Library {
///     type Id = i64;
///     type Key = String;
///
///     fn id(&self) -> Self::Id {
///         self.id
///     }
///
///     fn cache_key(&self) -> Self::Key {
///         self.short_name.clone()
///     }
///
///     fn cache_prefix() -> &'static str {
///         "library"
///     }
/// }
/// ```
pub trait CacheEntity: Send + Sync + 'static {
    /// Type of the entity's primary identifier (typically an integer).
    type Id: Debug + Clone + Send + Sync + Eq + Hash + 'static;

    /// Type of the entity's cache key (any hashable business key).
    type Key: Debug + Clone + Send + Sync + Eq + Hash + 'static;

    /// Return the entity's stable database identifier.
    fn id(&self) -> Self::Id;

    /// Return the entity's cache key.
    ///
    /// Example: a library's short name, or `(collection_id, identifier)`.
    fn cache_key(&self) -> Self::Key;

    /// Return the cache name for this entity type.
    ///
    /// One Store exists per unit of work and cache name, so every entity type
    /// needs its own prefix.
    fn cache_prefix() -> &'static str;
}
