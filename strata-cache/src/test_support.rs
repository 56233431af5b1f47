//! Fixture entity for unit tests.

use crate::cache::Cache;
use crate::context::CallContext;
use crate::entity::{Cacheable, CachedObject};
use crate::key::{CacheKey, ObjectClass};
use std::any::Any;
use std::sync::{Arc, Mutex};
use strata_core::Scope;

pub(crate) const ITEM: ObjectClass = ObjectClass::from_static("Item");

#[derive(Debug)]
pub(crate) struct Item {
    pub id: i64,
    pub scope: Scope,
    pub cacheable: bool,
    pub refresh: bool,
    pub size: usize,
    pub alias: Option<String>,
    pub children: Vec<CacheKey>,
    pub note: Mutex<Option<String>>,
}

impl Item {
    pub fn new(id: i64, scope: Scope) -> Self {
        Self {
            id,
            scope,
            cacheable: true,
            refresh: true,
            size: 100,
            alias: None,
            children: Vec::new(),
            note: Mutex::new(None),
        }
    }

    pub fn key(id: i64) -> CacheKey {
        CacheKey::for_value(ITEM, id)
    }

    pub fn alias_key(alias: &str) -> CacheKey {
        CacheKey::for_value(ITEM, alias)
    }

    pub fn note(&self) -> Option<String> {
        self.note.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

impl Cacheable for Item {
    fn object_class(&self) -> ObjectClass {
        ITEM
    }

    fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    fn longevity(&self) -> Scope {
        self.scope
    }

    fn set_longevity(&mut self, scope: Scope) {
        self.scope = scope;
    }

    fn primary_key(&self) -> Option<CacheKey> {
        Some(Item::key(self.id))
    }

    fn secondary_key(&self) -> Option<CacheKey> {
        self.alias.as_deref().map(Item::alias_key)
    }

    fn refresh_on_use(&self) -> bool {
        self.refresh
    }

    fn flush_children(&self, cache: &Cache, ctx: &CallContext) {
        for child in &self.children {
            cache.flush(ctx, child, true);
        }
    }

    fn regenerate_from(&self, previous: &CachedObject) {
        if let Some(previous) = previous.downcast_ref::<Item>() {
            if let Ok(mut note) = self.note.lock() {
                *note = previous.note();
            }
        }
    }

    fn approximate_size(&self) -> usize {
        self.size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) fn item(id: i64, scope: Scope) -> CachedObject {
    Arc::new(Item::new(id, scope))
}

pub(crate) fn frozen_item(id: i64, scope: Scope) -> CachedObject {
    Arc::new(Item {
        refresh: false,
        ..Item::new(id, scope)
    })
}
