//! STRATA Core - Shared Types
//!
//! Scopes, errors, configuration and clocks used by every STRATA crate.
//! This crate contains no cache logic.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod scope;

pub use clock::{format_age, shrink_time, Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, EvictionConfig, ScopeTtls};
pub use error::{CacheError, ConfigError, StrataError, StrataResult};
pub use scope::Scope;

/// Identifier of an isolated logical cache stack.
pub type StackId = u32;

/// Correlation hash tying cache entries to the request that created them.
pub type RequestHash = u64;
