//! The per-stack object cache.
//!
//! Entries live in a concurrent map keyed by the canonical string of every
//! key that resolves to them. Expiry is driven by the [`ScopeManager`]'s
//! time buckets; CALL-scoped objects bypass the map entirely and live in the
//! caller's [`CallContext`].

use crate::context::CallContext;
use crate::entity::{Cacheable, CachedObject};
use crate::entry::CacheEntry;
use crate::key::{CacheKey, ObjectClass};
use crate::scope_manager::ScopeManager;
use crate::size::SizeEstimator;
use crate::sync::lock;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use strata_core::{
    format_age, CacheError, Clock, RequestHash, Scope, ScopeTtls, StackId, StrataResult,
};
use tracing::{debug, trace, warn};

pub struct Cache {
    stack_id: StackId,
    entries: DashMap<String, Arc<CacheEntry>>,
    scopes: ScopeManager,
    clock: Arc<dyn Clock>,
    maintenance: Mutex<()>,
}

impl Cache {
    pub fn new(stack_id: StackId, ttls: ScopeTtls, clock: Arc<dyn Clock>) -> Self {
        Self {
            stack_id,
            entries: DashMap::new(),
            scopes: ScopeManager::new(ttls),
            clock,
            maintenance: Mutex::new(()),
        }
    }

    pub fn stack_id(&self) -> StackId {
        self.stack_id
    }

    pub fn scopes(&self) -> &ScopeManager {
        &self.scopes
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Store an object.
    ///
    /// The object is filed under its primary key, its secondary key if any,
    /// and `key` if given. When an entry already exists for the primary key
    /// its object is replaced without touching it. Objects that are not
    /// cacheable are ignored.
    ///
    /// CALL-scoped puts, by the key's scope or the object's longevity, go to
    /// the context's attribute store instead. Only those may omit a primary
    /// key; anything else without one fails with
    /// [`CacheError::MissingPrimaryKey`].
    pub fn put(
        &self,
        ctx: &CallContext,
        key: Option<&CacheKey>,
        object: CachedObject,
    ) -> StrataResult<()> {
        if let Some(key) = key {
            let actual = object.object_class();
            if *key.object_class() != actual {
                return Err(CacheError::TypeMismatch {
                    expected: key.object_class().to_string(),
                    actual: actual.to_string(),
                }
                .into());
            }
        }

        if !object.is_cacheable() {
            trace!(class = %object.object_class(), "Ignoring non-cacheable object");
            return Ok(());
        }

        let scope = object.longevity();
        if scope == Scope::Call || key.is_some_and(|k| k.scope() == Scope::Call) {
            self.put_call_scoped(ctx, key, object);
            return Ok(());
        }
        let Some(primary) = object.primary_key() else {
            return Err(CacheError::MissingPrimaryKey {
                class: object.object_class().to_string(),
            }
            .into());
        };

        let now = self.clock.now_millis();
        let (entry, created) = match self.entries.entry(primary.to_string()) {
            Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
            Entry::Vacant(vacant) => {
                let entry = CacheEntry::new(
                    Arc::clone(&object),
                    self.scopes.bucket_for(scope),
                    ctx.request_hash(),
                    now,
                );
                vacant.insert(Arc::clone(&entry));
                (entry, true)
            }
        };

        if created {
            trace!(key = %primary, scope = %scope, "Cached new entry");
            entry.add_key(primary);
        } else {
            entry.set_object(Arc::clone(&object));
        }

        if let Some(secondary) = object.secondary_key() {
            self.entries.insert(secondary.to_string(), Arc::clone(&entry));
            entry.add_key(secondary);
        }
        if let Some(key) = key {
            if let Entry::Vacant(vacant) = self.entries.entry(key.to_string()) {
                vacant.insert(Arc::clone(&entry));
                entry.add_key(key.clone());
            }
        }
        Ok(())
    }

    fn put_call_scoped(&self, ctx: &CallContext, key: Option<&CacheKey>, object: CachedObject) {
        let primary = object.primary_key();
        let existing = primary
            .as_ref()
            .and_then(|primary| ctx.attribute(&primary.to_string()));
        let aliases: Vec<CacheKey> = [primary, object.secondary_key(), key.cloned()]
            .into_iter()
            .flatten()
            .collect();
        if aliases.is_empty() {
            debug!(class = %object.object_class(), "Ignoring call-scoped object without keys");
            return;
        }

        let entry = match existing {
            Some(existing) => {
                existing.set_object(Arc::clone(&object));
                existing
            }
            None => CacheEntry::new(
                Arc::clone(&object),
                self.scopes.bucket_for(Scope::Call),
                ctx.request_hash(),
                self.clock.now_millis(),
            ),
        };

        for alias in aliases {
            ctx.set_attribute(alias.to_string(), Arc::clone(&entry));
            entry.add_key(alias);
        }
    }

    /// Look up an object, regenerating it on a miss.
    ///
    /// A hit touches the entry. On a miss the key's regenerator, if any,
    /// rebuilds the object, which is stored with the key's scope and
    /// returned.
    pub fn get(&self, ctx: &CallContext, key: &CacheKey) -> StrataResult<Option<CachedObject>> {
        let canonical = key.to_string();
        let now = self.clock.now_millis();

        let entry = if key.scope() == Scope::Call {
            ctx.attribute(&canonical)
        } else {
            self.entries.get(&canonical).map(|e| Arc::clone(e.value()))
        };
        if let Some(object) = entry.and_then(|entry| entry.object(now)) {
            trace!(key = %canonical, "Cache hit");
            return Ok(Some(object));
        }

        self.regenerate_missing(ctx, key)
    }

    fn regenerate_missing(
        &self,
        ctx: &CallContext,
        key: &CacheKey,
    ) -> StrataResult<Option<CachedObject>> {
        let Some(regenerator) = key.regenerator() else {
            return Ok(None);
        };

        debug!(key = %key, "Cache miss, regenerating");
        let Some(mut fresh) = regenerator.regenerate(key.object_class(), key.criteria())? else {
            return Ok(None);
        };
        fresh.set_longevity(key.scope());
        let fresh: CachedObject = Arc::from(fresh);
        self.put(ctx, Some(key), Arc::clone(&fresh))?;
        Ok(Some(fresh))
    }

    /// Whether an entry exists for `key` in the shared map. Does not touch.
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(&key.to_string())
    }

    /// Remove the entry for `key` from the cache.
    ///
    /// A recursive flush first lets the object flush its children.
    pub fn flush(&self, ctx: &CallContext, key: &CacheKey, recursive: bool) {
        let canonical = key.to_string();
        if key.scope() == Scope::Call {
            ctx.remove_attribute(&canonical);
            return;
        }

        let entry = self.entries.get(&canonical).map(|e| Arc::clone(e.value()));
        if let Some(entry) = entry {
            self.flush_entry(ctx, &entry, recursive);
        }
    }

    /// Unmap every key of `entry`, optionally flush its children, then expire it.
    pub fn flush_entry(&self, ctx: &CallContext, entry: &Arc<CacheEntry>, recursive: bool) {
        for key in entry.keys() {
            self.entries
                .remove_if(&key.to_string(), |_, mapped| Arc::ptr_eq(mapped, entry));
        }
        if recursive {
            if let Some(object) = entry.peek_object() {
                object.flush_children(self, ctx);
            }
        }
        entry.expire();
    }

    /// Expire the CALL-scoped entries tagged with `request_hash`.
    pub fn flush_request(&self, request_hash: RequestHash) -> usize {
        self.scopes.flush_for_request(request_hash, |entry| entry.expire())
    }

    /// Release everything the request held: its attribute store and its
    /// CALL-scoped entries.
    pub fn end_request(&self, ctx: &CallContext) -> usize {
        ctx.clear_attributes();
        self.flush_request(ctx.request_hash())
    }

    /// Replace the cached object for `key` with a freshly regenerated one.
    ///
    /// The old object is flushed recursively first. The new object may carry
    /// state over from it. Returns whether a new object was produced;
    /// failures are logged, not returned.
    pub fn regenerate(&self, ctx: &CallContext, key: &CacheKey) -> bool {
        let previous = self
            .entries
            .get(&key.to_string())
            .and_then(|e| e.value().peek_object());

        self.flush(ctx, key, true);
        match self.get(ctx, key) {
            Ok(Some(fresh)) => {
                if let Some(previous) = previous {
                    fresh.regenerate_from(&previous);
                }
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(key = %key, error = %e, "Regeneration failed");
                false
            }
        }
    }

    /// Expire everything whose TTL has elapsed at `now_millis`.
    ///
    /// Sweeps are serialized per cache.
    pub fn sweep(&self, now_millis: i64) -> usize {
        let _guard = lock(&self.maintenance);
        let ctx = CallContext::maintenance(self.stack_id);
        self.scopes.sweep(now_millis, |scope, entry| {
            if let Some(key) = entry.keys().first() {
                debug!(
                    key = %key,
                    scope = %scope,
                    age = %format_age(now_millis - entry.last_access_millis()),
                    "Expiring entry"
                );
            }
            self.flush_entry(&ctx, &entry, true)
        })
    }

    /// Sweep at the clock's current time.
    pub fn sweep_now(&self) -> usize {
        self.sweep(self.clock.now_millis())
    }

    /// Evict least recently used entries until `target_bytes` are freed.
    pub fn flush_least_recently_used(
        &self,
        target_bytes: u64,
        estimator: &dyn SizeEstimator,
    ) -> u64 {
        let _guard = lock(&self.maintenance);
        let ctx = CallContext::maintenance(self.stack_id);
        self.scopes
            .flush_least_recently_used(target_bytes, estimator, |entry| {
                self.flush_entry(&ctx, entry, true)
            })
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let _guard = lock(&self.maintenance);
        for entry in self.unique_entries() {
            entry.expire();
        }
        self.entries.clear();
        self.scopes.flush_all_scopes();
    }

    /// Number of keys in the shared map.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of `(canonical key, entry)` pairs.
    pub fn entries(&self) -> Vec<(String, Arc<CacheEntry>)> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }

    /// Distinct entries, regardless of how many keys map to each.
    pub fn unique_entries(&self) -> Vec<Arc<CacheEntry>> {
        let mut seen = HashSet::new();
        self.entries()
            .into_iter()
            .filter(|(_, entry)| seen.insert(Arc::as_ptr(entry)))
            .map(|(_, entry)| entry)
            .collect()
    }

    /// Every cached object of the given class.
    pub fn all_for_class(&self, class: &ObjectClass) -> Vec<CachedObject> {
        let prefix = class.key_prefix();
        let mut seen = HashSet::new();
        self.entries()
            .into_iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .filter(|(_, entry)| seen.insert(Arc::as_ptr(entry)))
            .filter_map(|(_, entry)| entry.peek_object())
            .collect()
    }

    /// Estimated footprint of the distinct cached objects.
    pub fn estimated_size(&self, estimator: &dyn SizeEstimator) -> u64 {
        self.unique_entries()
            .iter()
            .filter_map(|entry| entry.peek_object())
            .map(|object| estimator.estimate(object.as_ref()))
            .sum()
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("stack_id", &self.stack_id)
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}
