//! Holder that keeps a reference to an object by key rather than by value.

use crate::context::CallContext;
use crate::directory::CacheDirectory;
use crate::entity::CachedObject;
use crate::key::CacheKey;
use std::sync::Arc;
use strata_core::StrataResult;

/// Holds an object through the cache.
///
/// Once the object has a primary key, every read goes back to the cache so
/// the holder always sees the current copy. Objects whose key is assigned
/// late (for example on first save) are stored as soon as the key appears.
#[derive(Default)]
pub struct ObjectHolder {
    key: Option<CacheKey>,
    object: Option<CachedObject>,
}

impl ObjectHolder {
    /// Wrap an object, storing it if it is cacheable and has a key.
    pub fn new(
        directory: &CacheDirectory,
        ctx: &CallContext,
        object: Option<CachedObject>,
    ) -> StrataResult<Self> {
        let mut holder = Self { key: None, object };
        holder.bind_key(directory, ctx)?;
        Ok(holder)
    }

    fn bind_key(&mut self, directory: &CacheDirectory, ctx: &CallContext) -> StrataResult<()> {
        let Some(object) = self.object.as_ref().filter(|o| o.is_cacheable()) else {
            return Ok(());
        };
        if let Some(key) = object.primary_key() {
            directory.put_object(ctx, Arc::clone(object))?;
            self.key = Some(key);
        }
        Ok(())
    }

    /// Current object, re-read from the cache when the key is known.
    pub fn object(
        &mut self,
        directory: &CacheDirectory,
        ctx: &CallContext,
    ) -> StrataResult<Option<CachedObject>> {
        match &self.key {
            None => self.bind_key(directory, ctx)?,
            Some(key) => self.object = directory.get(ctx, key)?,
        }
        Ok(self.object.clone())
    }

    pub fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }
}
