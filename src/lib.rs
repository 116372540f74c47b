//! # table-cache
//!
//! A per-session, full-table, read-through entity cache.
//!
//! Small reference tables (libraries, genres, data sources) are looked up
//! constantly and change rarely. `table-cache` keeps every entity of such a
//! table that a unit of work has touched in a store private to that unit of
//! work, indexed both by primary key and by a domain cache key.
//!
//! ## Features
//!
//! - **Session scoped:** One store per (context, entity type); contexts never
//!   see each other's entries, and state is dropped with the context
//! - **Two indices:** Look up by id or by cache key; both indices always
//!   reference the same instances
//! - **Self-healing:** Cached references that were deleted or detached are
//!   evicted and re-fetched transparently
//! - **Warmable:** Fill a store from any collection or stream without
//!   touching hit/miss statistics
//! - **Analytics dispatch:** A small facade fanning events out to
//!   configured providers, sitewide or per scope
//!
//! ## Quick Start
//!
//! ```ignore
//! use table_cache::{CacheEntity, TableCache};
//!
//! struct Library {
//!     id: i64,
//!     short_name: String,
//! }
//!
//! impl CacheEntity for Library {
//!     type Id = i64;
//!     type Key = String;
//!     fn id(&self) -> i64 { self.id }
//!     fn cache_key(&self) -> String { self.short_name.clone() }
//!     fn cache_prefix() -> &'static str { "library" }
//! }
//!
//! let cache = TableCache::new();
//!
//! // `session` implements UnitOfWork + DataRepository<Library>
//! let library = cache.by_id::<Library, _>(&session, &7).await?;
//!
//! let (library, is_new) = cache
//!     .by_cache_key::<Library, _, _, _>(&session, &"NYPL".to_string(), || async {
//!         let created = session.create_library("NYPL").await?;
//!         Ok((Some(created), true))
//!     })
//!     .await?;
//! ```

#[macro_use]
extern crate log;

pub mod analytics;
pub mod config;
pub mod context;
pub mod engine;
pub mod entity;
pub mod error;
pub mod observability;
pub mod registry;
pub mod repository;
pub mod store;

// Re-exports for convenience
pub use analytics::{Analytics, AnalyticsProvider, IntegrationConfig, ProviderRegistry};
pub use config::CacheConfig;
pub use context::{ContextHandle, ContextId};
pub use engine::TableCache;
pub use entity::CacheEntity;
pub use error::{Error, Result};
pub use observability::{CacheMetrics, LogMetrics, NoOpMetrics};
pub use registry::SessionRegistry;
pub use repository::{DataRepository, EntityState, InMemorySession, UnitOfWork};
pub use store::{CacheStats, CacheStore, RemoveOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
