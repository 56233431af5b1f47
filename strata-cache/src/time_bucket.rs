//! Time buckets: append-ordered touch logs, one per scope.
//!
//! Every time an entry is touched in a new minute a [`TouchRecord`] is
//! appended to its scope's bucket. Records are never reordered, so the front
//! of a bucket is always its oldest touch. Only the newest record of an entry
//! is *live*; older ones are left in place and skipped when they surface.

use crate::entry::CacheEntry;
use crate::sync::lock;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use strata_core::{shrink_time, RequestHash};

static NEXT_TOUCH_ID: AtomicU64 = AtomicU64::new(1);

/// One touch of an entry.
#[derive(Clone)]
pub struct TouchRecord {
    id: u64,
    entry: Arc<CacheEntry>,
    minute: i64,
    touched_at: i64,
}

impl TouchRecord {
    pub(crate) fn new(entry: Arc<CacheEntry>, touched_at: i64) -> Self {
        Self {
            id: NEXT_TOUCH_ID.fetch_add(1, Ordering::Relaxed),
            entry,
            minute: shrink_time(touched_at),
            touched_at,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn entry(&self) -> &Arc<CacheEntry> {
        &self.entry
    }

    /// Minute slot of the touch.
    pub fn minute(&self) -> i64 {
        self.minute
    }

    /// Millisecond timestamp of the touch.
    pub fn touched_at(&self) -> i64 {
        self.touched_at
    }

    /// Whether this is the entry's newest touch.
    pub fn is_live(&self) -> bool {
        self.minute == self.entry.last_access_minute()
    }
}

impl fmt::Debug for TouchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TouchRecord")
            .field("id", &self.id)
            .field("minute", &self.minute)
            .field("touched_at", &self.touched_at)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Ordered log of touch records.
///
/// The bucket only reads entry atomics. It never takes an entry's lock, so
/// entries may call into their bucket while holding their own.
#[derive(Default)]
pub struct TimeBucket {
    records: Mutex<VecDeque<TouchRecord>>,
}

impl TimeBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_records(records: Vec<TouchRecord>) -> Self {
        Self {
            records: Mutex::new(records.into()),
        }
    }

    pub fn add(&self, record: TouchRecord) {
        lock(&self.records).push_back(record);
    }

    pub fn add_all(&self, records: impl IntoIterator<Item = TouchRecord>) {
        lock(&self.records).extend(records);
    }

    /// Remove the records with the given ids. Returns how many were found.
    pub fn remove_all(&self, ids: &[u64]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let mut records = lock(&self.records);
        let before = records.len();
        records.retain(|record| !ids.contains(&record.id));
        before - records.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    /// Snapshot of the records, oldest first.
    pub fn contents(&self) -> Vec<TouchRecord> {
        lock(&self.records).iter().cloned().collect()
    }

    /// Drop every record. Returns how many were dropped.
    pub fn flush(&self) -> usize {
        let mut records = lock(&self.records);
        let count = records.len();
        records.clear();
        count
    }

    /// Pop the records older than `cutoff_millis` and return the entries
    /// that expired.
    ///
    /// Stale records are discarded. A live record whose entry was read again
    /// at or after the cutoff stays where it is and the scan moves past it.
    /// The scan stops at the first record touched at or after the cutoff.
    pub fn clear_before(&self, cutoff_millis: i64) -> Vec<Arc<CacheEntry>> {
        let mut expired = Vec::new();
        let mut records = lock(&self.records);
        let mut index = 0;
        while let Some(record) = records.get(index) {
            if record.touched_at >= cutoff_millis {
                break;
            }
            let live = record.is_live();
            if live && record.entry.last_access_millis() >= cutoff_millis {
                index += 1;
                continue;
            }
            if let Some(record) = records.remove(index) {
                if live {
                    expired.push(record.entry);
                }
            }
        }
        expired
    }

    /// Remove every record tagged with `request_hash` and return the
    /// distinct entries they belonged to.
    pub fn clear_for(&self, request_hash: RequestHash) -> Vec<Arc<CacheEntry>> {
        let mut seen = HashSet::new();
        let mut flushed = Vec::new();
        let mut records = lock(&self.records);
        records.retain(|record| {
            if record.entry.request_hash() != request_hash {
                return true;
            }
            if seen.insert(Arc::as_ptr(&record.entry)) {
                flushed.push(Arc::clone(&record.entry));
            }
            false
        });
        flushed
    }

    /// Pop the oldest record.
    ///
    /// Returns its entry only when the record is live; a stale front record
    /// is dropped and `None` returned, so callers loop until the bucket is
    /// empty rather than until `None`.
    pub fn least_recently_used(&self) -> Option<Arc<CacheEntry>> {
        let record = lock(&self.records).pop_front()?;
        record.is_live().then_some(record.entry)
    }
}

impl fmt::Debug for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeBucket").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::item;
    use strata_core::constants::BUCKET_SCALE_MS;
    use strata_core::Scope;

    const MINUTE: i64 = BUCKET_SCALE_MS;

    fn bucket() -> Arc<TimeBucket> {
        Arc::new(TimeBucket::new())
    }

    #[test]
    fn test_new_entry_appends_one_record() {
        let bucket = bucket();
        let _entry = CacheEntry::new(item(1, Scope::Short), Some(&bucket), 0, 0);
        assert_eq!(bucket.len(), 1);
        assert!(bucket.contents()[0].is_live());
    }

    #[test]
    fn test_clear_before_expires_old_entries() {
        let bucket = bucket();
        let old = CacheEntry::new(item(1, Scope::Short), Some(&bucket), 0, 0);
        let fresh = CacheEntry::new(item(2, Scope::Short), Some(&bucket), 0, 6 * MINUTE);

        let expired = bucket.clear_before(5 * MINUTE);
        assert_eq!(expired.len(), 1);
        assert!(Arc::ptr_eq(&expired[0], &old));
        assert_eq!(bucket.len(), 1);
        assert!(Arc::ptr_eq(bucket.contents()[0].entry(), &fresh));
    }

    #[test]
    fn test_clear_before_skips_stale_records() {
        let bucket = bucket();
        let entry = CacheEntry::new(item(1, Scope::Short), Some(&bucket), 0, 0);
        entry.touch(4 * MINUTE);
        assert_eq!(bucket.len(), 2);

        let expired = bucket.clear_before(3 * MINUTE);
        assert!(expired.is_empty());
        assert_eq!(bucket.len(), 1);
        assert!(bucket.contents()[0].is_live());
    }

    #[test]
    fn test_same_minute_read_protects_live_record() {
        let bucket = bucket();
        let entry = CacheEntry::new(item(1, Scope::Short), Some(&bucket), 0, 0);
        entry.touch(30_000);
        assert_eq!(bucket.len(), 1);

        assert!(bucket.clear_before(10_000).is_empty());
        assert_eq!(bucket.len(), 1);
        assert!(bucket.clear_before(40_000).len() == 1);
    }

    #[test]
    fn test_read_entry_does_not_shield_older_records() {
        let bucket = bucket();
        let read = CacheEntry::new(item(1, Scope::Short), Some(&bucket), 0, 0);
        let idle = CacheEntry::new(item(2, Scope::Short), Some(&bucket), 0, 1_000);
        read.touch(50_000);
        assert_eq!(bucket.len(), 2);

        let expired = bucket.clear_before(1_001);
        assert_eq!(expired.len(), 1);
        assert!(Arc::ptr_eq(&expired[0], &idle));
        assert_eq!(bucket.len(), 1);
        assert!(Arc::ptr_eq(bucket.contents()[0].entry(), &read));

        let expired = bucket.clear_before(50_001);
        assert!(expired.len() == 1 && Arc::ptr_eq(&expired[0], &read));
        assert!(bucket.is_empty());
    }

    #[test]
    fn test_non_refreshing_entry_expires_despite_reads() {
        let bucket = bucket();
        let entry = CacheEntry::new(
            crate::test_support::frozen_item(1, Scope::Short),
            Some(&bucket),
            0,
            0,
        );
        entry.touch(4 * MINUTE);
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket.clear_before(3 * MINUTE).len(), 1);
    }

    #[test]
    fn test_clear_for_request_hash() {
        let bucket = bucket();
        let mine = CacheEntry::new(item(1, Scope::Call), Some(&bucket), 7, 0);
        mine.touch(2 * MINUTE);
        let _theirs = CacheEntry::new(item(2, Scope::Call), Some(&bucket), 8, 0);

        let flushed = bucket.clear_for(7);
        assert_eq!(flushed.len(), 1);
        assert!(Arc::ptr_eq(&flushed[0], &mine));
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn test_least_recently_used_drops_stale_front() {
        let bucket = bucket();
        let entry = CacheEntry::new(item(1, Scope::Short), Some(&bucket), 0, 0);
        entry.touch(2 * MINUTE);

        assert!(bucket.least_recently_used().is_none());
        let live = bucket.least_recently_used();
        assert!(live.is_some_and(|e| Arc::ptr_eq(&e, &entry)));
        assert!(bucket.is_empty());
    }

    #[test]
    fn test_remove_all_and_flush() {
        let bucket = bucket();
        let entry = CacheEntry::new(item(1, Scope::Short), Some(&bucket), 0, 0);
        let _other = CacheEntry::new(item(2, Scope::Short), Some(&bucket), 0, 0);
        let id = bucket.contents()[0].id();
        assert_eq!(bucket.remove_all(&[id]), 1);
        assert_eq!(bucket.remove_all(&[]), 0);
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket.flush(), 1);
        assert!(bucket.is_empty());
        drop(entry);
    }
}
