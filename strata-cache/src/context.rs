//! Per-call context.
//!
//! A [`CallContext`] travels through every cache operation. It names the
//! cache stack the call works against, carries the request hash that
//! CALL-scoped entries are tagged with, and owns the call-scoped attribute
//! store those entries live in.

use crate::entry::CacheEntry;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::constants::DEFAULT_STACK_ID;
use strata_core::{RequestHash, StackId};
use uuid::Uuid;

/// Request-local state handed to cache operations.
///
/// Not `Sync`: a context belongs to the thread serving the request.
#[derive(Debug)]
pub struct CallContext {
    request_id: Uuid,
    stack_id: StackId,
    attributes: RefCell<HashMap<String, Arc<CacheEntry>>>,
}

impl CallContext {
    /// A fresh request on the default stack.
    pub fn new() -> Self {
        Self::for_stack(DEFAULT_STACK_ID)
    }

    pub fn for_stack(stack_id: StackId) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            stack_id,
            attributes: RefCell::new(HashMap::new()),
        }
    }

    /// Context used by background maintenance. Its request hash is zero.
    pub fn maintenance(stack_id: StackId) -> Self {
        Self {
            request_id: Uuid::nil(),
            stack_id,
            attributes: RefCell::new(HashMap::new()),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn stack_id(&self) -> StackId {
        self.stack_id
    }

    pub fn request_hash(&self) -> RequestHash {
        let (high, low) = self.request_id.as_u64_pair();
        high ^ low
    }

    pub fn attribute(&self, name: &str) -> Option<Arc<CacheEntry>> {
        self.attributes.borrow().get(name).cloned()
    }

    pub fn set_attribute(&self, name: String, entry: Arc<CacheEntry>) {
        self.attributes.borrow_mut().insert(name, entry);
    }

    pub fn remove_attribute(&self, name: &str) -> Option<Arc<CacheEntry>> {
        self.attributes.borrow_mut().remove(name)
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.borrow().len()
    }

    /// Drop every call-scoped attribute.
    pub fn clear_attributes(&self) {
        self.attributes.borrow_mut().clear();
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}
