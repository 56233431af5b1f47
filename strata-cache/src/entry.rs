//! Cache entries.
//!
//! An entry wraps one cached object together with every key that resolves
//! to it and the ids of its touch records in the scope bucket.

use crate::entity::CachedObject;
use crate::key::CacheKey;
use crate::sync::lock;
use crate::time_bucket::{TimeBucket, TouchRecord};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use strata_core::{shrink_time, RequestHash};

struct EntryState {
    object: Option<CachedObject>,
    keys: HashSet<CacheKey>,
    touches: Vec<u64>,
    untouched: bool,
}

/// One cached object and its bookkeeping.
///
/// Lock order is entry state, then bucket. Access times are kept in atomics
/// so buckets can judge liveness without the entry lock.
pub struct CacheEntry {
    state: Mutex<EntryState>,
    last_access_millis: AtomicI64,
    last_access_minute: AtomicI64,
    bucket: Option<Weak<TimeBucket>>,
    request_hash: RequestHash,
}

impl CacheEntry {
    /// Create an entry and record its first touch at `now_millis`.
    ///
    /// Entries without a bucket (`Permanent` scope) are never swept.
    pub fn new(
        object: CachedObject,
        bucket: Option<&Arc<TimeBucket>>,
        request_hash: RequestHash,
        now_millis: i64,
    ) -> Arc<Self> {
        let entry = Arc::new(Self {
            state: Mutex::new(EntryState {
                object: Some(object),
                keys: HashSet::new(),
                touches: Vec::new(),
                untouched: true,
            }),
            last_access_millis: AtomicI64::new(0),
            last_access_minute: AtomicI64::new(0),
            bucket: bucket.map(Arc::downgrade),
            request_hash,
        });
        entry.touch(now_millis);
        entry
    }

    /// Record an access.
    ///
    /// The first touch after creation or expiry always registers a record.
    /// Later touches update the access time only for refresh-on-use objects
    /// and append a new record only when the minute has advanced.
    pub fn touch(self: &Arc<Self>, now_millis: i64) {
        let mut state = lock(&self.state);
        let minute = shrink_time(now_millis);

        if state.untouched {
            state.untouched = false;
            self.last_access_millis.store(now_millis, Ordering::Release);
            self.last_access_minute.store(minute, Ordering::Release);
            self.record_touch(&mut state, now_millis);
            return;
        }

        let refresh = state
            .object
            .as_ref()
            .map_or(true, |object| object.refresh_on_use());
        if !refresh {
            return;
        }

        self.last_access_millis.store(now_millis, Ordering::Release);
        if minute > self.last_access_minute.load(Ordering::Acquire) {
            self.last_access_minute.store(minute, Ordering::Release);
            self.record_touch(&mut state, now_millis);
        }
    }

    fn record_touch(self: &Arc<Self>, state: &mut EntryState, now_millis: i64) {
        let Some(bucket) = self.bucket.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        let record = TouchRecord::new(Arc::clone(self), now_millis);
        state.touches.push(record.id());
        bucket.add(record);
    }

    /// Touch, then return the object.
    pub fn object(self: &Arc<Self>, now_millis: i64) -> Option<CachedObject> {
        self.touch(now_millis);
        self.peek_object()
    }

    /// Return the object without touching.
    pub fn peek_object(&self) -> Option<CachedObject> {
        lock(&self.state).object.clone()
    }

    /// Replace the object. Does not touch.
    pub fn set_object(&self, object: CachedObject) {
        let previous = lock(&self.state).object.replace(object);
        drop(previous);
    }

    pub fn add_key(&self, key: CacheKey) {
        lock(&self.state).keys.insert(key);
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        lock(&self.state).keys.iter().cloned().collect()
    }

    /// Drop the object, keys and touch records.
    ///
    /// Idempotent. A later touch re-arms the entry.
    pub fn expire(&self) {
        let mut state = lock(&self.state);
        state.keys.clear();
        if let Some(bucket) = self.bucket.as_ref().and_then(Weak::upgrade) {
            bucket.remove_all(&state.touches);
        }
        state.touches.clear();
        state.untouched = true;
        let object = state.object.take();
        drop(state);
        drop(object);
    }

    pub fn has_object(&self) -> bool {
        lock(&self.state).object.is_some()
    }

    pub fn is_untouched(&self) -> bool {
        lock(&self.state).untouched
    }

    pub fn touch_count(&self) -> usize {
        lock(&self.state).touches.len()
    }

    pub fn last_access_millis(&self) -> i64 {
        self.last_access_millis.load(Ordering::Acquire)
    }

    pub fn last_access_minute(&self) -> i64 {
        self.last_access_minute.load(Ordering::Acquire)
    }

    pub fn request_hash(&self) -> RequestHash {
        self.request_hash
    }

    pub fn is_bucketed(&self) -> bool {
        self.bucket.is_some()
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("last_access_millis", &self.last_access_millis())
            .field("request_hash", &self.request_hash)
            .field("bucketed", &self.is_bucketed())
            .finish_non_exhaustive()
    }
}
