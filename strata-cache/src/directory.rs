//! Cache directory: one [`Cache`] per stack, created on first use.

use crate::cache::Cache;
use crate::context::CallContext;
use crate::criteria::Criterion;
use crate::entity::CachedObject;
use crate::key::{CacheKey, ObjectClass};
use crate::size::{ReportedSize, SizeEstimator};
use dashmap::DashMap;
use std::sync::Arc;
use strata_core::{CacheConfig, Clock, RequestHash, StackId, StrataResult, SystemClock};
use tracing::{debug, info};

/// Process-wide registry of caches, keyed by stack id.
///
/// Construct one and share it (usually behind an `Arc`) instead of relying
/// on a global.
pub struct CacheDirectory {
    caches: DashMap<StackId, Arc<Cache>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    estimator: Arc<dyn SizeEstimator>,
}

impl CacheDirectory {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            caches: DashMap::new(),
            config,
            clock,
            estimator: Arc::new(ReportedSize),
        }
    }

    /// Replace the size estimator used for LRU accounting.
    pub fn with_estimator(mut self, estimator: Arc<dyn SizeEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn estimator(&self) -> &dyn SizeEstimator {
        self.estimator.as_ref()
    }

    /// The cache for a stack, created if absent.
    pub fn cache_for(&self, stack_id: StackId) -> Arc<Cache> {
        let cache = self.caches.entry(stack_id).or_insert_with(|| {
            debug!(stack_id, "Creating cache for stack");
            Arc::new(Cache::new(
                stack_id,
                self.config.scope_ttls.clone(),
                Arc::clone(&self.clock),
            ))
        });
        Arc::clone(cache.value())
    }

    /// The cache for the context's stack.
    pub fn cache(&self, ctx: &CallContext) -> Arc<Cache> {
        self.cache_for(ctx.stack_id())
    }

    /// Snapshot of every cache created so far.
    pub fn caches(&self) -> Vec<Arc<Cache>> {
        self.caches.iter().map(|c| Arc::clone(c.value())).collect()
    }

    pub fn put(&self, ctx: &CallContext, key: Option<&CacheKey>, object: CachedObject) -> StrataResult<()> {
        self.cache(ctx).put(ctx, key, object)
    }

    /// Store an object under its own keys.
    pub fn put_object(&self, ctx: &CallContext, object: CachedObject) -> StrataResult<()> {
        self.put(ctx, None, object)
    }

    pub fn get(&self, ctx: &CallContext, key: &CacheKey) -> StrataResult<Option<CachedObject>> {
        self.cache(ctx).get(ctx, key)
    }

    /// Look up the cached copy of an object by its primary key.
    pub fn get_by_object(
        &self,
        ctx: &CallContext,
        object: &CachedObject,
    ) -> StrataResult<Option<CachedObject>> {
        match object.primary_key() {
            Some(key) => self.get(ctx, &key),
            None => Ok(None),
        }
    }

    /// Look up an object by class and single-value id.
    pub fn get_by_id(
        &self,
        ctx: &CallContext,
        class: ObjectClass,
        id: impl Into<Criterion>,
    ) -> StrataResult<Option<CachedObject>> {
        self.get(ctx, &CacheKey::for_value(class, id))
    }

    pub fn contains_key(&self, ctx: &CallContext, key: &CacheKey) -> bool {
        self.cache(ctx).contains_key(key)
    }

    pub fn contains_object(&self, ctx: &CallContext, object: &CachedObject) -> bool {
        object
            .primary_key()
            .is_some_and(|key| self.contains_key(ctx, &key))
    }

    pub fn flush(&self, ctx: &CallContext, key: &CacheKey, recursive: bool) {
        self.cache(ctx).flush(ctx, key, recursive);
    }

    /// Flush an object by its primary key, without recursion.
    pub fn flush_object(&self, ctx: &CallContext, object: &CachedObject) {
        if let Some(key) = object.primary_key() {
            self.flush(ctx, &key, false);
        }
    }

    pub fn flush_request(&self, ctx: &CallContext, request_hash: RequestHash) -> usize {
        self.cache(ctx).flush_request(request_hash)
    }

    pub fn end_request(&self, ctx: &CallContext) -> usize {
        self.cache(ctx).end_request(ctx)
    }

    pub fn regenerate(&self, ctx: &CallContext, key: &CacheKey) -> bool {
        self.cache(ctx).regenerate(ctx, key)
    }

    /// Number of keys in the context's cache.
    pub fn size(&self, ctx: &CallContext) -> usize {
        self.cache(ctx).len()
    }

    /// Clear the context's cache.
    pub fn reset(&self, ctx: &CallContext) {
        self.cache(ctx).clear();
        info!(stack_id = ctx.stack_id(), "Cache reset");
    }

    /// Override the SHORT, MEDIUM and LONG TTLs of the context's cache.
    pub fn set_times(&self, ctx: &CallContext, short: i64, medium: i64, long: i64) {
        self.cache(ctx).scopes().set_times(short, medium, long);
    }

    pub fn all_for_class(&self, ctx: &CallContext, class: &ObjectClass) -> Vec<CachedObject> {
        self.cache(ctx).all_for_class(class)
    }

    /// Sweep every cache at `now_millis`. Returns the number of entries evicted.
    pub fn sweep_all(&self, now_millis: i64) -> usize {
        self.caches().iter().map(|cache| cache.sweep(now_millis)).sum()
    }

    /// Estimated footprint of every cache.
    pub fn estimated_size(&self) -> u64 {
        self.caches()
            .iter()
            .map(|cache| cache.estimated_size(self.estimator.as_ref()))
            .sum()
    }

    /// Evict least recently used entries across every cache until
    /// `target_bytes` are freed. Returns the bytes freed.
    pub fn evict_least_recently_used(&self, target_bytes: u64) -> u64 {
        let mut freed = 0;
        for cache in self.caches() {
            if freed >= target_bytes {
                break;
            }
            freed += cache.flush_least_recently_used(target_bytes - freed, self.estimator.as_ref());
        }
        freed
    }

    /// Clear and drop every cache.
    pub fn shutdown(&self) {
        for cache in self.caches() {
            cache.clear();
        }
        self.caches.clear();
        info!("Cache directory shut down");
    }
}

impl Default for CacheDirectory {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size::FixedSize;
    use crate::test_support::{item, Item, ITEM};
    use strata_core::{ManualClock, Scope};

    fn directory() -> (CacheDirectory, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let directory = CacheDirectory::with_clock(CacheConfig::default(), clock.clone());
        (directory, clock)
    }

    #[test]
    fn test_stacks_are_isolated() {
        let (directory, _) = directory();
        let stack_a = CallContext::for_stack(1);
        let stack_b = CallContext::for_stack(2);

        directory.put_object(&stack_a, item(1, Scope::Short)).unwrap();
        assert!(directory.contains_key(&stack_a, &Item::key(1)));
        assert!(!directory.contains_key(&stack_b, &Item::key(1)));
        assert_eq!(directory.caches().len(), 2);
        assert!(Arc::ptr_eq(&directory.cache(&stack_a), &directory.cache_for(1)));
    }

    #[test]
    fn test_object_helpers() {
        let (directory, _) = directory();
        let ctx = CallContext::new();
        let object = item(4, Scope::Medium);
        directory.put_object(&ctx, Arc::clone(&object)).unwrap();

        assert!(directory.contains_object(&ctx, &object));
        let by_object = directory.get_by_object(&ctx, &object).unwrap();
        assert!(by_object.is_some_and(|o| Arc::ptr_eq(&o, &object)));
        let by_id = directory.get_by_id(&ctx, ITEM, 4i64).unwrap();
        assert!(by_id.is_some_and(|o| Arc::ptr_eq(&o, &object)));
        assert_eq!(directory.all_for_class(&ctx, &ITEM).len(), 1);

        directory.flush_object(&ctx, &object);
        assert!(!directory.contains_object(&ctx, &object));
        assert_eq!(directory.size(&ctx), 0);
    }

    #[test]
    fn test_sweep_all_covers_every_stack() {
        let (directory, clock) = directory();
        directory
            .put_object(&CallContext::for_stack(1), item(1, Scope::Short))
            .unwrap();
        directory
            .put_object(&CallContext::for_stack(2), item(2, Scope::Short))
            .unwrap();

        clock.advance_minutes(6);
        assert_eq!(directory.sweep_all(clock.now_millis()), 2);
    }

    #[test]
    fn test_set_times_applies_to_context_cache() {
        let (directory, clock) = directory();
        let ctx = CallContext::new();
        directory.set_times(&ctx, 1, 2, 3);
        directory.put_object(&ctx, item(1, Scope::Short)).unwrap();
        clock.advance_minutes(2);
        assert_eq!(directory.sweep_all(clock.now_millis()), 1);
    }

    #[test]
    fn test_eviction_across_stacks() {
        let clock = Arc::new(ManualClock::new(0));
        let directory = CacheDirectory::with_clock(CacheConfig::default(), clock.clone())
            .with_estimator(Arc::new(FixedSize(100)));
        for stack in 0..3 {
            directory
                .put_object(&CallContext::for_stack(stack), item(1, Scope::Long))
                .unwrap();
        }
        assert_eq!(directory.estimated_size(), 300);
        assert!(directory.evict_least_recently_used(150) >= 150);
        assert!(directory.estimated_size() <= 150);
    }

    #[test]
    fn test_reset_and_shutdown() {
        let (directory, _) = directory();
        let ctx = CallContext::new();
        directory.put_object(&ctx, item(1, Scope::Short)).unwrap();
        directory.reset(&ctx);
        assert_eq!(directory.size(&ctx), 0);

        directory.put_object(&ctx, item(1, Scope::Short)).unwrap();
        directory.shutdown();
        assert!(directory.caches().is_empty());
    }
}
