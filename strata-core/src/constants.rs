//! Constants for STRATA
//!
//! Default values shared by the configuration layer and the cache.

// ============================================================================
// TIME BUCKETS
// ============================================================================

/// Milliseconds per time-bucket slot (one minute).
pub const BUCKET_SCALE_MS: i64 = 60 * 1000;

/// Default time-to-live for CALL scope, in minutes (swept only at request end)
pub const DEFAULT_CALL_TTL_MINUTES: u32 = 0;

/// Default time-to-live for SHORT scope, in minutes
pub const DEFAULT_SHORT_TTL_MINUTES: u32 = 5;

/// Default time-to-live for MEDIUM scope, in minutes
pub const DEFAULT_MEDIUM_TTL_MINUTES: u32 = 15;

/// Default time-to-live for LONG scope, in minutes
pub const DEFAULT_LONG_TTL_MINUTES: u32 = 30;

/// Default time-to-live for VERY_LONG scope, in minutes
pub const DEFAULT_VERY_LONG_TTL_MINUTES: u32 = 120;

// ============================================================================
// BACKGROUND JOBS
// ============================================================================

/// Default interval between TTL sweeps, in seconds
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default interval between LRU size checks, in seconds
pub const DEFAULT_LRU_RUN_INTERVAL_SECS: u64 = 10;

/// Default cache size ceiling for the LRU evictor, in megabytes
pub const DEFAULT_MAX_CACHE_SIZE_MB: u64 = 256;

/// Bytes per megabyte for the size ceiling
pub const ONE_MEGABYTE: u64 = 1_048_576;

/// Server list value that disables the LRU evictor everywhere
pub const SERVERS_LIST_NONE: &str = "NONE";

// ============================================================================
// SIZE ESTIMATION
// ============================================================================

/// Size reported by entities that do not estimate their own footprint
pub const DEFAULT_OBJECT_SIZE_BYTES: usize = 1024;

// ============================================================================
// CALL CONTEXT
// ============================================================================

/// Stack identifier used when a call context does not name one
pub const DEFAULT_STACK_ID: u32 = 0;
