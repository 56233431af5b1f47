//! STRATA Test Utilities
//!
//! Centralized test infrastructure for the STRATA workspace:
//! - Sample entities (`StockPrice`, `Portfolio`)
//! - A mock backing store that acts as a regenerator
//! - Proptest generators
//! - Fixtures and custom assertions

// Re-export core types for convenience
pub use strata_cache::{
    Cache, CacheCriteria, CacheDirectory, CacheKey, Cacheable, CachedObject, CallContext,
    Criterion, ObjectClass, Regenerator,
};
pub use strata_core::{
    CacheConfig, CacheError, Clock, ManualClock, Scope, ScopeTtls, StrataError, StrataResult,
};

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

// ============================================================================
// SAMPLE ENTITIES
// ============================================================================

pub const STOCK_PRICE: ObjectClass = ObjectClass::from_static("StockPrice");
pub const PORTFOLIO: ObjectClass = ObjectClass::from_static("Portfolio");

/// A quoted price, keyed by id with its ticker symbol as a secondary key.
#[derive(Debug)]
pub struct StockPrice {
    pub id: i64,
    pub symbol: String,
    pub price_cents: i64,
    pub longevity: Scope,
    pub refresh_on_use: bool,
    pub size_bytes: usize,
    annotation: Mutex<Option<String>>,
}

impl StockPrice {
    pub fn new(id: i64, symbol: impl Into<String>, price_cents: i64) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            price_cents,
            longevity: Scope::Short,
            refresh_on_use: true,
            size_bytes: 256,
            annotation: Mutex::new(None),
        }
    }

    pub fn with_longevity(mut self, scope: Scope) -> Self {
        self.longevity = scope;
        self
    }

    /// Reads no longer extend the object's life.
    pub fn frozen(mut self) -> Self {
        self.refresh_on_use = false;
        self
    }

    pub fn with_size(mut self, size_bytes: usize) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn key(id: i64) -> CacheKey {
        CacheKey::for_value(STOCK_PRICE, id)
    }

    pub fn symbol_key(symbol: &str) -> CacheKey {
        CacheKey::for_value(STOCK_PRICE, symbol)
    }

    pub fn annotate(&self, note: impl Into<String>) {
        *self.annotation.lock().unwrap_or_else(PoisonError::into_inner) = Some(note.into());
    }

    pub fn annotation(&self) -> Option<String> {
        self.annotation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn into_cached(self) -> CachedObject {
        Arc::new(self)
    }
}

impl Cacheable for StockPrice {
    fn object_class(&self) -> ObjectClass {
        STOCK_PRICE
    }

    fn longevity(&self) -> Scope {
        self.longevity
    }

    fn set_longevity(&mut self, scope: Scope) {
        self.longevity = scope;
    }

    fn primary_key(&self) -> Option<CacheKey> {
        Some(StockPrice::key(self.id))
    }

    fn secondary_key(&self) -> Option<CacheKey> {
        Some(StockPrice::symbol_key(&self.symbol))
    }

    fn refresh_on_use(&self) -> bool {
        self.refresh_on_use
    }

    fn regenerate_from(&self, previous: &CachedObject) {
        if let Some(note) = previous
            .downcast_ref::<StockPrice>()
            .and_then(StockPrice::annotation)
        {
            self.annotate(note);
        }
    }

    fn approximate_size(&self) -> usize {
        self.size_bytes
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A set of holdings. Flushing a portfolio recursively flushes its prices.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub id: i64,
    pub holdings: Vec<i64>,
    pub longevity: Scope,
}

impl Portfolio {
    pub fn new(id: i64, holdings: Vec<i64>) -> Self {
        Self {
            id,
            holdings,
            longevity: Scope::Long,
        }
    }

    pub fn key(id: i64) -> CacheKey {
        CacheKey::for_value(PORTFOLIO, id)
    }
}

impl Cacheable for Portfolio {
    fn object_class(&self) -> ObjectClass {
        PORTFOLIO
    }

    fn longevity(&self) -> Scope {
        self.longevity
    }

    fn set_longevity(&mut self, scope: Scope) {
        self.longevity = scope;
    }

    fn primary_key(&self) -> Option<CacheKey> {
        Some(Portfolio::key(self.id))
    }

    fn flush_children(&self, cache: &Cache, ctx: &CallContext) {
        for id in &self.holdings {
            cache.flush(ctx, &StockPrice::key(*id), true);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// MOCK BACKING STORE
// ============================================================================

/// In-memory price table that regenerates `StockPrice` objects and counts
/// how often it is asked to.
#[derive(Debug, Default)]
pub struct MockStockSource {
    prices: Mutex<HashMap<i64, (String, i64)>>,
    failing: Mutex<HashSet<i64>>,
    calls: AtomicUsize,
}

impl MockStockSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, id: i64, symbol: impl Into<String>, price_cents: i64) {
        self.prices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (symbol.into(), price_cents));
    }

    /// Make lookups of `id` fail.
    pub fn fail_on(&self, id: i64) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Key for a price, wired to this source.
    pub fn key(self: &Arc<Self>, id: i64, scope: Scope) -> CacheKey {
        let regenerator: Arc<dyn Regenerator> = Arc::clone(self) as Arc<dyn Regenerator>;
        StockPrice::key(id)
            .with_scope(scope)
            .with_regenerator(regenerator)
    }
}

impl Regenerator for MockStockSource {
    fn regenerate(
        &self,
        class: &ObjectClass,
        criteria: &CacheCriteria,
    ) -> StrataResult<Option<Box<dyn Cacheable>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *class != STOCK_PRICE {
            return Ok(None);
        }
        let Some(Criterion::Int(id)) = criteria.first() else {
            return Ok(None);
        };
        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
        {
            return Err(StrataError::regeneration(
                class.name(),
                criteria.to_string(),
                "price feed unavailable",
            ));
        }

        let row = self
            .prices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned();
        Ok(row.map(|(symbol, price)| {
            Box::new(StockPrice::new(*id, symbol, price)) as Box<dyn Cacheable>
        }))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for STRATA types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_scope() -> impl Strategy<Value = Scope> {
        prop::sample::select(Scope::ALL.to_vec())
    }

    /// Scopes covered by the TTL sweep.
    pub fn arb_swept_scope() -> impl Strategy<Value = Scope> {
        prop::sample::select(Scope::SWEPT.to_vec())
    }

    pub fn arb_criterion() -> impl Strategy<Value = Criterion> {
        prop_oneof![
            Just(Criterion::Null),
            any::<bool>().prop_map(Criterion::Bool),
            any::<i64>().prop_map(Criterion::Int),
            "[A-Za-z0-9]{0,12}".prop_map(Criterion::Text),
        ]
    }

    pub fn arb_criteria() -> impl Strategy<Value = CacheCriteria> {
        prop::collection::vec(arb_criterion(), 0..4).prop_map(CacheCriteria::new)
    }

    /// TTLs that pass validation: positive and non-decreasing.
    pub fn arb_valid_ttls() -> impl Strategy<Value = ScopeTtls> {
        (1u32..30, 0u32..30, 0u32..60, 0u32..240).prop_map(|(short, d1, d2, d3)| ScopeTtls {
            call: 0,
            short,
            medium: short + d1,
            long: short + d1 + d2,
            very_long: short + d1 + d2 + d3,
        })
    }

    /// Distinct ids with distinct symbols.
    pub fn arb_stock_ids(max: usize) -> impl Strategy<Value = Vec<i64>> {
        prop::collection::hash_set(0i64..10_000, 1..=max).prop_map(|ids| ids.into_iter().collect())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;

    /// Directory on a manual clock starting at `start_millis`.
    pub fn manual_directory(start_millis: i64) -> (Arc<CacheDirectory>, Arc<ManualClock>) {
        manual_directory_with(CacheConfig::default(), start_millis)
    }

    pub fn manual_directory_with(
        config: CacheConfig,
        start_millis: i64,
    ) -> (Arc<CacheDirectory>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_millis));
        let directory = Arc::new(CacheDirectory::with_clock(config, clock.clone()));
        (directory, clock)
    }

    /// A price whose symbol is derived from its id.
    pub fn stock(id: i64, scope: Scope) -> CachedObject {
        StockPrice::new(id, format!("SYM{id}"), 100 * id)
            .with_longevity(scope)
            .into_cached()
    }

    /// A mock source pre-loaded with `ids`.
    pub fn stock_source(ids: impl IntoIterator<Item = i64>) -> Arc<MockStockSource> {
        let source = MockStockSource::new();
        for id in ids {
            source.insert(id, format!("SYM{id}"), 100 * id);
        }
        source
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache state.

    use super::*;

    #[track_caller]
    pub fn assert_cached(directory: &CacheDirectory, ctx: &CallContext, key: &CacheKey) {
        assert!(
            directory.contains_key(ctx, key),
            "Expected {key} to be cached"
        );
    }

    #[track_caller]
    pub fn assert_not_cached(directory: &CacheDirectory, ctx: &CallContext, key: &CacheKey) {
        assert!(
            !directory.contains_key(ctx, key),
            "Expected {key} not to be cached"
        );
    }

    /// Assert both handles point at the same object.
    #[track_caller]
    pub fn assert_same_object(actual: &CachedObject, expected: &CachedObject) {
        assert!(
            Arc::ptr_eq(actual, expected),
            "Expected the identical cached object"
        );
    }

    /// Assert an optional lookup result is the given object.
    #[track_caller]
    pub fn assert_hit(result: &StrataResult<Option<CachedObject>>, expected: &CachedObject) {
        match result {
            Ok(Some(actual)) => assert_same_object(actual, expected),
            Ok(None) => panic!("Expected a cache hit, got a miss"),
            Err(e) => panic!("Expected a cache hit, got error: {e}"),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
