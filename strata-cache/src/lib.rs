//! STRATA Cache - Scoped Object Cache
//!
//! In-process cache for business entities. Every object is filed under its
//! canonical key and placed in a time bucket chosen by its scope; a periodic
//! sweep expires whatever has not been touched within the scope's TTL.
//!
//! # Scopes
//!
//! | Scope       | Lifetime                                   |
//! |-------------|--------------------------------------------|
//! | `CALL`      | The current request only                   |
//! | `SHORT`     | 5 minutes since last touch (default)       |
//! | `MEDIUM`    | 15 minutes                                 |
//! | `LONG`      | 30 minutes                                 |
//! | `VERY_LONG` | 120 minutes                                |
//! | `PERMANENT` | Until flushed                              |
//!
//! # Architecture
//!
//! ```text
//! CacheDirectory ── stack id ──► Cache ── canonical key ──► CacheEntry ──► object
//!                                  │                            │
//!                                  └── ScopeManager ── TimeBucket ◄── TouchRecord
//! ```
//!
//! Misses are filled by the key's [`Regenerator`]. An [`EvictionScheduler`]
//! runs the TTL sweep and an optional size-based LRU evictor on Tokio.

pub mod cache;
pub mod context;
pub mod criteria;
pub mod diagnostics;
pub mod directory;
pub mod entity;
pub mod entry;
pub mod holder;
pub mod jobs;
pub mod key;
pub mod regenerator;
pub mod scope_manager;
pub mod size;
pub mod time_bucket;

mod sync;

#[cfg(test)]
mod test_support;

pub use cache::Cache;
pub use context::CallContext;
pub use criteria::{CacheCriteria, Criterion};
pub use diagnostics::EntrySnapshot;
pub use directory::CacheDirectory;
pub use entity::{Cacheable, CachedObject};
pub use entry::CacheEntry;
pub use holder::ObjectHolder;
pub use jobs::{EvictionScheduler, EvictorState, EvictorStatus, SchedulerReport};
pub use key::{CacheKey, ObjectClass};
pub use regenerator::{Regenerator, RegeneratorRegistry};
pub use scope_manager::ScopeManager;
pub use size::{FixedSize, ReportedSize, SizeEstimator};
pub use time_bucket::{TimeBucket, TouchRecord};
