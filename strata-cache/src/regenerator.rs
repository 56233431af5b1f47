//! Regenerators rebuild a missing object from its key.

use crate::criteria::CacheCriteria;
use crate::entity::Cacheable;
use crate::key::{CacheKey, ObjectClass};
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::{Scope, StrataResult};

/// Rebuilds an object from its class and criteria, usually by reading the
/// backing store.
///
/// `Ok(None)` means the object does not exist. Errors are propagated to the
/// caller of `get`.
pub trait Regenerator: Send + Sync {
    fn regenerate(
        &self,
        class: &ObjectClass,
        criteria: &CacheCriteria,
    ) -> StrataResult<Option<Box<dyn Cacheable>>>;
}

impl<F> Regenerator for F
where
    F: Fn(&ObjectClass, &CacheCriteria) -> StrataResult<Option<Box<dyn Cacheable>>> + Send + Sync,
{
    fn regenerate(
        &self,
        class: &ObjectClass,
        criteria: &CacheCriteria,
    ) -> StrataResult<Option<Box<dyn Cacheable>>> {
        self(class, criteria)
    }
}

/// Regenerators indexed by object class.
#[derive(Default, Clone)]
pub struct RegeneratorRegistry {
    regenerators: HashMap<ObjectClass, Arc<dyn Regenerator>>,
}

impl RegeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the regenerator for a class, replacing any previous one.
    pub fn register(&mut self, class: ObjectClass, regenerator: Arc<dyn Regenerator>) {
        self.regenerators.insert(class, regenerator);
    }

    pub fn with(mut self, class: ObjectClass, regenerator: Arc<dyn Regenerator>) -> Self {
        self.register(class, regenerator);
        self
    }

    pub fn get(&self, class: &ObjectClass) -> Option<Arc<dyn Regenerator>> {
        self.regenerators.get(class).cloned()
    }

    pub fn len(&self) -> usize {
        self.regenerators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regenerators.is_empty()
    }

    /// Build a key wired to the class's regenerator, if one is registered.
    pub fn key_for(&self, class: ObjectClass, criteria: CacheCriteria, scope: Scope) -> CacheKey {
        let regenerator = self.get(&class);
        let key = CacheKey::new(class, criteria).with_scope(scope);
        match regenerator {
            Some(regenerator) => key.with_regenerator(regenerator),
            None => key,
        }
    }
}
