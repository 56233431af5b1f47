//! Scope manager: one time bucket per bucketed scope, plus the TTL table.

use crate::entry::CacheEntry;
use crate::size::SizeEstimator;
use crate::time_bucket::TimeBucket;
use std::sync::{Arc, PoisonError, RwLock};
use strata_core::constants::BUCKET_SCALE_MS;
use strata_core::{RequestHash, Scope, ScopeTtls};
use tracing::{debug, info};

/// Owns the time buckets of one cache.
#[derive(Debug)]
pub struct ScopeManager {
    ttls: RwLock<ScopeTtls>,
    buckets: [Arc<TimeBucket>; Scope::BUCKETED],
}

impl ScopeManager {
    pub fn new(ttls: ScopeTtls) -> Self {
        Self {
            ttls: RwLock::new(ttls),
            buckets: std::array::from_fn(|_| Arc::new(TimeBucket::new())),
        }
    }

    /// Bucket for a scope. `Permanent` has none.
    pub fn bucket_for(&self, scope: Scope) -> Option<&Arc<TimeBucket>> {
        self.buckets.get(scope.index())
    }

    pub fn ttls(&self) -> ScopeTtls {
        self.ttls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn ttl_minutes(&self, scope: Scope) -> Option<u32> {
        self.ttls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .minutes(scope)
    }

    /// Override the SHORT, MEDIUM and LONG TTLs; non-positive values are ignored.
    pub fn set_times(&self, short: i64, medium: i64, long: i64) {
        let mut ttls = self.ttls.write().unwrap_or_else(PoisonError::into_inner);
        ttls.set_times(short, medium, long);
        info!(
            short = ttls.short,
            medium = ttls.medium,
            long = ttls.long,
            "Scope TTLs updated"
        );
    }

    /// Expire every entry in the swept scopes whose TTL has elapsed at
    /// `now_millis`, handing each to `evict`. Returns the number evicted.
    pub fn sweep(&self, now_millis: i64, mut evict: impl FnMut(Scope, Arc<CacheEntry>)) -> usize {
        let mut total = 0;
        for scope in Scope::SWEPT {
            let Some(minutes) = self.ttl_minutes(scope) else {
                continue;
            };
            let Some(bucket) = self.bucket_for(scope) else {
                continue;
            };
            let cutoff = now_millis - i64::from(minutes) * BUCKET_SCALE_MS;
            let expired = bucket.clear_before(cutoff);
            if expired.is_empty() {
                continue;
            }
            info!(scope = %scope, count = expired.len(), "Evicting expired cache entries");
            total += expired.len();
            for entry in expired {
                evict(scope, entry);
            }
        }
        total
    }

    /// Remove the CALL-scope records tagged with `request_hash`, handing each
    /// entry to `evict`.
    pub fn flush_for_request(
        &self,
        request_hash: RequestHash,
        mut evict: impl FnMut(Arc<CacheEntry>),
    ) -> usize {
        let Some(bucket) = self.bucket_for(Scope::Call) else {
            return 0;
        };
        let flushed = bucket.clear_for(request_hash);
        let count = flushed.len();
        for entry in flushed {
            evict(entry);
        }
        if count > 0 {
            debug!(request_hash, count, "Flushed call-scoped entries");
        }
        count
    }

    /// Drop every record in the swept scopes.
    pub fn flush_all_scopes(&self) -> usize {
        Scope::SWEPT
            .iter()
            .filter_map(|scope| self.bucket_for(*scope))
            .map(|bucket| bucket.flush())
            .sum()
    }

    /// Merge the swept buckets into one list ordered by last access.
    pub fn combine_touch_lists(&self) -> TimeBucket {
        let mut records: Vec<_> = Scope::SWEPT
            .iter()
            .filter_map(|scope| self.bucket_for(*scope))
            .flat_map(|bucket| bucket.contents())
            .collect();
        records.sort_by_key(|record| record.entry().last_access_millis());
        TimeBucket::from_records(records)
    }

    /// Evict least recently used entries across the swept scopes until at
    /// least `target_bytes` have been freed or no candidates remain.
    /// Returns the bytes freed.
    pub fn flush_least_recently_used(
        &self,
        target_bytes: u64,
        estimator: &dyn SizeEstimator,
        mut evict: impl FnMut(&Arc<CacheEntry>),
    ) -> u64 {
        let merged = self.combine_touch_lists();
        let mut freed = 0u64;
        let mut evicted = 0usize;

        while freed < target_bytes && !merged.is_empty() {
            let Some(entry) = merged.least_recently_used() else {
                continue;
            };
            if let Some(object) = entry.peek_object() {
                freed += estimator.estimate(object.as_ref());
            }
            evict(&entry);
            evicted += 1;
        }

        debug!(target_bytes, freed, evicted, "LRU pass finished");
        freed
    }
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new(ScopeTtls::default())
    }
}
