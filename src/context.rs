//! Identity of a unit of work.
//!
//! A [`ContextHandle`] is held by whatever owns the unit of work (a database
//! session, a request scope). The registry keys cache state by the handle's
//! id and watches its liveness, so the context type itself never has to know
//! about caching.

use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Identifier of a unit-of-work context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Return the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct Marker {
    id: ContextId,
}

/// Cloneable identity of one unit of work.
///
/// The context ends when the last clone is dropped. Cache state registered
/// for it becomes garbage at that point.
///
/// # Example
///
/// ```
/// use table_cache::ContextHandle;
///
/// let ctx = ContextHandle::new();
/// let same = ctx.clone();
/// assert_eq!(ctx.id(), same.id());
/// assert_ne!(ctx.id(), ContextHandle::new().id());
/// ```
#[derive(Clone, Debug)]
pub struct ContextHandle {
    marker: Arc<Marker>,
}

impl ContextHandle {
    /// Start a new context with a fresh time-ordered id.
    pub fn new() -> Self {
        ContextHandle {
            marker: Arc::new(Marker {
                id: ContextId(Uuid::now_v7()),
            }),
        }
    }

    /// Return this context's id.
    pub fn id(&self) -> ContextId {
        self.marker.id
    }

    pub(crate) fn liveness(&self) -> ContextLiveness {
        ContextLiveness(Arc::downgrade(&self.marker))
    }
}

impl Default for ContextHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ContextHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ContextHandle {}

/// Weak observer of a context, held by the registry.
#[derive(Clone, Debug)]
pub(crate) struct ContextLiveness(Weak<Marker>);

impl ContextLiveness {
    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
