//! Cache keys.
//!
//! A [`CacheKey`] names a cached object by its class and criteria. Its
//! canonical string form `<class>@<criteria>` is what the entry map is
//! keyed on. Equal keys always share an entry. Criterion kinds are not
//! tagged in that string, so `Int(7)` and `Text("7")` also share one even
//! though the keys compare unequal.

use crate::criteria::{CacheCriteria, Criterion};
use crate::regenerator::Regenerator;
use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use strata_core::Scope;

/// Type tag identifying the kind of object a key addresses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectClass(Cow<'static, str>);

impl ObjectClass {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Prefix shared by the canonical strings of every key of this class.
    pub fn key_prefix(&self) -> String {
        format!("{}@", self.0)
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite identifier of a cached object.
///
/// Equality and hashing consider only the class and criteria. The scope
/// selects where the object lives (`Call` keys never touch the shared map)
/// and the optional regenerator rebuilds the object on a miss.
#[derive(Clone)]
pub struct CacheKey {
    class: ObjectClass,
    criteria: CacheCriteria,
    regenerator: Option<Arc<dyn Regenerator>>,
    scope: Scope,
    hash: u64,
}

impl CacheKey {
    pub fn new(class: ObjectClass, criteria: CacheCriteria) -> Self {
        let mut hasher = DefaultHasher::new();
        class.hash(&mut hasher);
        let hash = hasher
            .finish()
            .wrapping_add(criteria.hash_value().wrapping_mul(31));
        Self {
            class,
            criteria,
            regenerator: None,
            scope: Scope::default(),
            hash,
        }
    }

    /// Key over a single raw criterion value.
    pub fn for_value(class: ObjectClass, value: impl Into<Criterion>) -> Self {
        Self::new(class, CacheCriteria::single(value))
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_regenerator(mut self, regenerator: Arc<dyn Regenerator>) -> Self {
        self.regenerator = Some(regenerator);
        self
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    pub fn set_regenerator(&mut self, regenerator: Arc<dyn Regenerator>) {
        self.regenerator = Some(regenerator);
    }

    pub fn object_class(&self) -> &ObjectClass {
        &self.class
    }

    pub fn criteria(&self) -> &CacheCriteria {
        &self.criteria
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn regenerator(&self) -> Option<&Arc<dyn Regenerator>> {
        self.regenerator.as_ref()
    }

    /// The memoized hash value.
    pub fn hash_value(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.criteria == other.criteria
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.class, self.criteria)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheKey")
            .field("class", &self.class)
            .field("criteria", &self.criteria)
            .field("scope", &self.scope)
            .field("has_regenerator", &self.regenerator.is_some())
            .finish()
    }
}
