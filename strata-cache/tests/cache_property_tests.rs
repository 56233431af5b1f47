//! Property-Based Tests for Cache Bookkeeping
//!
//! Properties covered:
//! - Key equality follows class and criteria
//! - Put/get returns the identical object
//! - Aliases share one entry
//! - Re-putting under a primary key swaps the payload, not the entry
//! - TTL sweep boundary, with and without refresh-on-use
//! - CALL-scoped isolation and request flushes
//! - LRU eviction removes exactly the oldest entries
//! - Expiry is idempotent

use proptest::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use strata_cache::{CacheEntry, FixedSize};
use strata_core::constants::BUCKET_SCALE_MS;
use strata_test_utils::assertions::{assert_cached, assert_hit, assert_not_cached};
use strata_test_utils::fixtures::{manual_directory, stock};
use strata_test_utils::generators::{arb_criteria, arb_stock_ids, arb_swept_scope};
use strata_test_utils::*;

const MINUTE: i64 = BUCKET_SCALE_MS;

fn hash_of(key: &CacheKey) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

fn entry_for(directory: &CacheDirectory, ctx: &CallContext, key: &CacheKey) -> Arc<CacheEntry> {
    let canonical = key.to_string();
    directory
        .cache(ctx)
        .entries()
        .into_iter()
        .find(|(k, _)| *k == canonical)
        .map(|(_, entry)| entry)
        .expect("entry should be mapped")
}

fn ttl_millis(scope: Scope) -> i64 {
    let minutes = ScopeTtls::default().minutes(scope).unwrap_or_default();
    i64::from(minutes) * MINUTE
}

// ============================================================================
// KEYS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Equal class and criteria give equal keys with equal hashes.
    #[test]
    fn prop_key_equality(criteria in arb_criteria()) {
        let a = CacheKey::new(STOCK_PRICE, criteria.clone());
        let b = CacheKey::new(STOCK_PRICE, criteria.clone());
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(hash_of(&a), hash_of(&b));
        prop_assert_eq!(a.to_string(), b.to_string());

        let other_class = CacheKey::new(PORTFOLIO, criteria);
        prop_assert_ne!(a, other_class);
    }

    /// Differing criteria give differing keys.
    #[test]
    fn prop_key_inequality(left in arb_criteria(), right in arb_criteria()) {
        prop_assume!(left.values() != right.values());
        let a = CacheKey::new(STOCK_PRICE, left);
        let b = CacheKey::new(STOCK_PRICE, right);
        prop_assert_ne!(a, b);
    }
}

// ============================================================================
// PUT / GET
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_put_then_get_returns_same_object(id in 0i64..10_000, scope in arb_swept_scope()) {
        let (directory, _clock) = manual_directory(0);
        let ctx = CallContext::new();
        let object = stock(id, scope);
        directory.put(&ctx, None, Arc::clone(&object)).unwrap();

        assert_hit(&directory.get(&ctx, &StockPrice::key(id)), &object);
        assert_hit(&directory.get(&ctx, &StockPrice::symbol_key(&format!("SYM{id}"))), &object);
    }

    /// Flushing any alias unmaps all of them.
    #[test]
    fn prop_alias_invalidation(id in 0i64..10_000, flush_primary in any::<bool>()) {
        let (directory, _clock) = manual_directory(0);
        let ctx = CallContext::new();
        let alias = CacheKey::for_value(STOCK_PRICE, format!("ALT{id}"));
        directory.put(&ctx, Some(&alias), stock(id, Scope::Medium)).unwrap();
        assert_cached(&directory, &ctx, &alias);

        let (flushed, other) = if flush_primary {
            (StockPrice::key(id), alias)
        } else {
            (alias, StockPrice::key(id))
        };
        directory.flush(&ctx, &flushed, false);
        prop_assert!(directory.get(&ctx, &other).unwrap().is_none());
        prop_assert_eq!(directory.size(&ctx), 0);
    }

    /// A second put under the same primary key keeps the entry and swaps its payload.
    #[test]
    fn prop_first_writer_keeps_entry(id in 0i64..10_000) {
        let (directory, _clock) = manual_directory(0);
        let ctx = CallContext::new();
        let first = stock(id, Scope::Long);
        let second = stock(id, Scope::Long);
        directory.put_object(&ctx, Arc::clone(&first)).unwrap();
        let entry = entry_for(&directory, &ctx, &StockPrice::key(id));

        directory.put_object(&ctx, Arc::clone(&second)).unwrap();
        let after = entry_for(&directory, &ctx, &StockPrice::key(id));
        prop_assert!(Arc::ptr_eq(&entry, &after));
        let payload = entry.peek_object().unwrap();
        prop_assert!(Arc::ptr_eq(&payload, &second));
    }
}

// ============================================================================
// TTL SWEEP
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_sweep_boundary(scope in arb_swept_scope(), start in 0i64..1_000_000_000) {
        let (directory, _clock) = manual_directory(start);
        let ctx = CallContext::new();
        let key = StockPrice::key(1);
        directory.put_object(&ctx, stock(1, scope)).unwrap();

        prop_assert_eq!(directory.sweep_all(start + ttl_millis(scope) - 1), 0);
        assert_cached(&directory, &ctx, &key);

        prop_assert_eq!(directory.sweep_all(start + ttl_millis(scope) + 1), 1);
        assert_not_cached(&directory, &ctx, &key);
    }

    /// A fresh read of one entry never hides an idle entry queued behind it.
    #[test]
    fn prop_sweep_boundary_behind_fresh_read(
        scope in arb_swept_scope(),
        gap in 1i64..30_000,
        read_at in 30_000i64..MINUTE,
    ) {
        let (directory, clock) = manual_directory(0);
        let ctx = CallContext::new();
        directory.put_object(&ctx, stock(1, scope)).unwrap();
        clock.set(gap);
        directory.put_object(&ctx, stock(2, scope)).unwrap();
        clock.set(read_at);
        prop_assert!(directory.get(&ctx, &StockPrice::key(1)).unwrap().is_some());

        prop_assert_eq!(directory.sweep_all(gap + ttl_millis(scope) + 1), 1);
        assert_cached(&directory, &ctx, &StockPrice::key(1));
        assert_not_cached(&directory, &ctx, &StockPrice::key(2));
    }

    /// Reads of an entity that does not refresh on use never postpone eviction.
    #[test]
    fn prop_frozen_entity_expires_despite_reads(
        scope in arb_swept_scope(),
        reads in prop::collection::vec(1i64..100, 1..10),
    ) {
        let (directory, clock) = manual_directory(0);
        let ctx = CallContext::new();
        let ttl = ttl_millis(scope);
        let frozen = StockPrice::new(1, "FRZ", 10).with_longevity(scope).frozen().into_cached();
        directory.put_object(&ctx, frozen).unwrap();

        for offset in reads {
            clock.set(ttl * offset / 100);
            prop_assert!(directory.get(&ctx, &StockPrice::key(1)).unwrap().is_some());
        }

        directory.sweep_all(ttl + 1);
        assert_not_cached(&directory, &ctx, &StockPrice::key(1));
    }

    /// A read after the first touch keeps a refreshing entity alive.
    #[test]
    fn prop_refreshing_entity_survives_after_read(scope in arb_swept_scope()) {
        let (directory, clock) = manual_directory(0);
        let ctx = CallContext::new();
        let ttl = ttl_millis(scope);
        directory.put_object(&ctx, stock(1, scope)).unwrap();

        clock.set(ttl - MINUTE);
        prop_assert!(directory.get(&ctx, &StockPrice::key(1)).unwrap().is_some());

        prop_assert_eq!(directory.sweep_all(ttl + 1), 0);
        assert_cached(&directory, &ctx, &StockPrice::key(1));
    }

    #[test]
    fn prop_permanent_is_never_swept(elapsed_minutes in 0i64..1_000_000) {
        let (directory, _clock) = manual_directory(0);
        let ctx = CallContext::new();
        directory.put_object(&ctx, stock(1, Scope::Permanent)).unwrap();

        prop_assert_eq!(directory.sweep_all(elapsed_minutes * MINUTE), 0);
        assert_cached(&directory, &ctx, &StockPrice::key(1));
    }
}

// ============================================================================
// REQUEST SCOPE
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_call_scope_isolation(ids in arb_stock_ids(6)) {
        let (directory, _clock) = manual_directory(0);
        let mine = CallContext::new();
        let theirs = CallContext::new();
        prop_assume!(mine.request_hash() != theirs.request_hash());

        for id in &ids {
            directory.put_object(&mine, stock(*id, Scope::Call)).unwrap();
            directory.put_object(&theirs, stock(*id, Scope::Call)).unwrap();
        }
        prop_assert_eq!(directory.size(&mine), 0);
        prop_assert!(directory.all_for_class(&mine, &STOCK_PRICE).is_empty());
        prop_assert!(directory.output_contents(&mine).is_empty());

        let call_key = |id: i64| StockPrice::key(id).with_scope(Scope::Call);
        for id in &ids {
            prop_assert!(directory.get(&mine, &call_key(*id)).unwrap().is_some());
            prop_assert!(directory.get(&mine, &StockPrice::key(*id)).unwrap().is_none());
        }

        let flushed = directory.flush_request(&mine, mine.request_hash());
        prop_assert_eq!(flushed, ids.len());
        for id in &ids {
            prop_assert!(directory.get(&mine, &call_key(*id)).unwrap().is_none());
            prop_assert!(directory.get(&theirs, &call_key(*id)).unwrap().is_some());
        }
    }
}

// ============================================================================
// LRU EVICTION
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_lru_evicts_exactly_the_oldest(
        (count, evict) in (2usize..10).prop_flat_map(|n| (Just(n), 1..n)),
        scopes in prop::collection::vec(arb_swept_scope(), 10),
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let directory = CacheDirectory::with_clock(CacheConfig::default(), clock.clone())
            .with_estimator(Arc::new(FixedSize(100)));
        let ctx = CallContext::new();
        for id in 0..count {
            clock.set(id as i64 * MINUTE + 1);
            directory.put_object(&ctx, stock(id as i64, scopes[id])).unwrap();
        }

        let freed = directory.evict_least_recently_used(evict as u64 * 100);
        prop_assert_eq!(freed, evict as u64 * 100);
        for id in 0..count {
            let cached = directory.contains_key(&ctx, &StockPrice::key(id as i64));
            prop_assert_eq!(cached, id >= evict, "id {} of {}", id, count);
        }
    }
}

// ============================================================================
// EXPIRY
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_expire_is_idempotent(id in 0i64..10_000, scope in arb_swept_scope()) {
        let (directory, _clock) = manual_directory(0);
        let ctx = CallContext::new();
        directory.put_object(&ctx, stock(id, scope)).unwrap();
        let entry = entry_for(&directory, &ctx, &StockPrice::key(id));

        directory.flush(&ctx, &StockPrice::key(id), true);
        prop_assert!(!entry.has_object());
        prop_assert!(entry.keys().is_empty());
        prop_assert_eq!(entry.touch_count(), 0);

        entry.expire();
        directory.flush(&ctx, &StockPrice::key(id), true);
        prop_assert!(!entry.has_object());
        prop_assert!(entry.keys().is_empty());
        prop_assert_eq!(entry.touch_count(), 0);
        prop_assert_eq!(directory.size(&ctx), 0);
    }
}
