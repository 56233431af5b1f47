//! The contract a value must satisfy to live in the cache.

use crate::cache::Cache;
use crate::context::CallContext;
use crate::key::{CacheKey, ObjectClass};
use std::any::Any;
use std::sync::Arc;
use strata_core::constants::DEFAULT_OBJECT_SIZE_BYTES;
use strata_core::Scope;

/// Shared handle to a cached value.
pub type CachedObject = Arc<dyn Cacheable>;

/// A cacheable business entity.
///
/// Persistence layers implement this for their row types. The cache
/// identifies objects by [`primary_key`](Cacheable::primary_key) and files
/// them into the time bucket named by [`longevity`](Cacheable::longevity).
pub trait Cacheable: Any + Send + Sync {
    /// Type tag compared against the class of the key used to store the object.
    fn object_class(&self) -> ObjectClass;

    /// Objects that return `false` are silently ignored by `put`.
    fn is_cacheable(&self) -> bool {
        true
    }

    fn longevity(&self) -> Scope;

    /// Called with the key's scope after a regeneration, before the object is stored.
    fn set_longevity(&mut self, scope: Scope);

    /// Canonical key. Only CALL-scoped objects may return `None`.
    fn primary_key(&self) -> Option<CacheKey>;

    /// Optional alias registered alongside the primary key.
    fn secondary_key(&self) -> Option<CacheKey> {
        None
    }

    /// Whether reads keep the object alive.
    fn refresh_on_use(&self) -> bool {
        true
    }

    /// Flush dependent objects. Invoked by a recursive flush before the
    /// object itself is expired.
    fn flush_children(&self, _cache: &Cache, _ctx: &CallContext) {}

    /// Carry transient state over from the object this one replaces.
    fn regenerate_from(&self, _previous: &CachedObject) {}

    /// Estimated heap footprint in bytes.
    fn approximate_size(&self) -> usize {
        DEFAULT_OBJECT_SIZE_BYTES
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn Cacheable {
    /// Downcast to a concrete entity type.
    pub fn downcast_ref<T: Cacheable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
