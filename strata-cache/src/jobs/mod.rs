//! Background Jobs for the STRATA cache
//!
//! This module contains background tasks that run periodically:
//!
//! - `sweep`: Expires entries whose scope TTL has elapsed
//! - `lru_flush`: Evicts least recently used entries while the cache is over its size ceiling
//!
//! Both are owned by an [`EvictionScheduler`], which starts them against a
//! shared [`CacheDirectory`](crate::CacheDirectory) and stops them through a
//! watch channel.
//!
//! # Usage
//!
//! ```ignore
//! use strata_cache::{CacheDirectory, EvictionScheduler};
//! use strata_core::CacheConfig;
//! use std::sync::Arc;
//!
//! let directory = Arc::new(CacheDirectory::new(CacheConfig::from_env()));
//! let scheduler = EvictionScheduler::start(Arc::clone(&directory));
//!
//! // On shutdown
//! let report = scheduler.shutdown().await?;
//! ```

pub mod lru_flush;
pub mod scheduler;
pub mod sweep;

// Re-export commonly used types
pub use lru_flush::{
    evict_excess, lru_flush_task, EvictionOutcome, EvictorSnapshot, EvictorState, EvictorStatus,
};
pub use scheduler::{EvictionScheduler, SchedulerReport};
pub use sweep::{sweep_task, SweepMetrics, SweepSnapshot};
