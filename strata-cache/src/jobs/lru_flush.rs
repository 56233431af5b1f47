//! LRU Flush Background Task
//!
//! Keeps the estimated cache footprint under a configured ceiling. Each
//! cycle measures the directory; while it is over the ceiling the least
//! recently used entries of the swept scopes are evicted and the footprint
//! re-measured.
//!
//! The evictor's state is shared through [`EvictorState`] so operators can
//! read its status and counters, raise or lower the ceiling, or stop it while
//! it runs.

use crate::directory::CacheDirectory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_core::constants::ONE_MEGABYTE;
use strata_core::{CacheError, EvictionConfig, StrataResult};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

// ============================================================================
// STATE
// ============================================================================

/// Lifecycle of the evictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvictorStatus {
    Pending,
    Running,
    Stopped,
}

impl EvictorStatus {
    fn as_u8(self) -> u8 {
        match self {
            EvictorStatus::Pending => 0,
            EvictorStatus::Running => 1,
            EvictorStatus::Stopped => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => EvictorStatus::Pending,
            1 => EvictorStatus::Running,
            _ => EvictorStatus::Stopped,
        }
    }
}

impl fmt::Display for EvictorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EvictorStatus::Pending => "PENDING",
            EvictorStatus::Running => "RUNNING",
            EvictorStatus::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Live, shared state of the evictor.
#[derive(Debug)]
pub struct EvictorState {
    status: AtomicU8,
    max_size_mb: AtomicU64,
    stop_on_error: AtomicBool,
    last_cache_size: AtomicU64,

    /// Total cycles run
    pub cycles: AtomicU64,

    /// Cycles that found the cache over its ceiling
    pub adjustments: AtomicU64,

    /// Total bytes evicted since startup
    pub bytes_freed: AtomicU64,

    /// Cycles that failed
    pub errors: AtomicU64,
}

impl EvictorState {
    pub fn new(config: &EvictionConfig) -> Self {
        Self {
            status: AtomicU8::new(EvictorStatus::Pending.as_u8()),
            max_size_mb: AtomicU64::new(config.max_size_mb),
            stop_on_error: AtomicBool::new(config.stop_on_error),
            last_cache_size: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
            adjustments: AtomicU64::new(0),
            bytes_freed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn status(&self) -> EvictorStatus {
        EvictorStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: EvictorStatus) {
        self.status.store(status.as_u8(), Ordering::Release);
    }

    /// Ask the evictor to stop after its current cycle.
    pub fn stop(&self) {
        self.set_status(EvictorStatus::Stopped);
        tracing::info!("LRU evictor stop requested");
    }

    pub fn max_size_mb(&self) -> u64 {
        self.max_size_mb.load(Ordering::Relaxed)
    }

    /// Change the ceiling. Takes effect on the next cycle.
    pub fn set_max_size_mb(&self, max_size_mb: u64) {
        self.max_size_mb.store(max_size_mb, Ordering::Relaxed);
        tracing::info!(max_size_mb, "LRU ceiling updated");
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb().saturating_mul(ONE_MEGABYTE)
    }

    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error.load(Ordering::Relaxed)
    }

    pub fn set_stop_on_error(&self, stop_on_error: bool) {
        self.stop_on_error.store(stop_on_error, Ordering::Relaxed);
    }

    /// Footprint measured at the end of the last cycle, in bytes.
    pub fn last_cache_size(&self) -> u64 {
        self.last_cache_size.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> EvictorSnapshot {
        EvictorSnapshot {
            status: self.status(),
            max_size_mb: self.max_size_mb(),
            stop_on_error: self.stop_on_error(),
            last_cache_size: self.last_cache_size(),
            cycles: self.cycles.load(Ordering::Relaxed),
            adjustments: self.adjustments.load(Ordering::Relaxed),
            bytes_freed: self.bytes_freed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the evictor at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictorSnapshot {
    pub status: EvictorStatus,
    pub max_size_mb: u64,
    pub stop_on_error: bool,
    pub last_cache_size: u64,
    pub cycles: u64,
    pub adjustments: u64,
    pub bytes_freed: u64,
    pub errors: u64,
}

// ============================================================================
// EVICTION
// ============================================================================

/// Result of one eviction cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionOutcome {
    /// Footprint after the cycle
    pub size_bytes: u64,
    pub freed_bytes: u64,
    /// Whether the cache was over its ceiling
    pub adjusted: bool,
}

/// Evict until the directory's estimated footprint is at or under
/// `ceiling_bytes`.
///
/// Fails with [`CacheError::EvictionStalled`] when a pass frees nothing while
/// the cache is still over the ceiling, which happens when the excess sits in
/// PERMANENT or CALL entries.
pub fn evict_excess(directory: &CacheDirectory, ceiling_bytes: u64) -> StrataResult<EvictionOutcome> {
    let mut size = directory.estimated_size();
    let mut freed_bytes = 0;
    let mut adjusted = false;

    while size > ceiling_bytes {
        adjusted = true;
        tracing::debug!(size, ceiling_bytes, "Cache over ceiling");

        directory.evict_least_recently_used(size - ceiling_bytes);
        let remeasured = directory.estimated_size();
        if remeasured >= size {
            return Err(CacheError::EvictionStalled {
                remaining_bytes: remeasured - ceiling_bytes,
            }
            .into());
        }
        freed_bytes += size - remeasured;
        size = remeasured;
    }

    Ok(EvictionOutcome {
        size_bytes: size,
        freed_bytes,
        adjusted,
    })
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that enforces the size ceiling every `run_interval`.
///
/// Runs until the shutdown signal is received or the state is stopped,
/// either by [`EvictorState::stop`] or by a failed cycle while
/// stop-on-error is set. The first check happens one interval after start.
pub async fn lru_flush_task(
    directory: Arc<CacheDirectory>,
    run_interval: Duration,
    state: Arc<EvictorState>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<EvictorState> {
    let mut ticker = interval_at(Instant::now() + run_interval, run_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    if state.status() == EvictorStatus::Pending {
        state.set_status(EvictorStatus::Running);
    }
    tracing::info!(
        run_interval_ms = run_interval.as_millis() as u64,
        max_size_mb = state.max_size_mb(),
        stop_on_error = state.stop_on_error(),
        "LRU evictor started"
    );

    while state.status() == EvictorStatus::Running {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("LRU evictor shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                if state.status() != EvictorStatus::Running {
                    break;
                }
                run_cycle(&directory, &state).await;
            }
        }
    }

    state.set_status(EvictorStatus::Stopped);
    let snapshot = state.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        adjustments = snapshot.adjustments,
        bytes_freed = snapshot.bytes_freed,
        errors = snapshot.errors,
        "LRU evictor stopped"
    );

    state
}

/// Perform one eviction cycle.
async fn run_cycle(directory: &Arc<CacheDirectory>, state: &EvictorState) {
    state.cycles.fetch_add(1, Ordering::Relaxed);
    let ceiling = state.max_size_bytes();

    let directory = Arc::clone(directory);
    let result = tokio::task::spawn_blocking(move || evict_excess(&directory, ceiling)).await;

    let failure = match result {
        Ok(Ok(outcome)) => {
            state
                .last_cache_size
                .store(outcome.size_bytes, Ordering::Relaxed);
            if outcome.adjusted {
                state.adjustments.fetch_add(1, Ordering::Relaxed);
                state
                    .bytes_freed
                    .fetch_add(outcome.freed_bytes, Ordering::Relaxed);
                tracing::info!(
                    size = outcome.size_bytes,
                    freed = outcome.freed_bytes,
                    ceiling,
                    "Cache size adjusted"
                );
            } else {
                tracing::trace!(size = outcome.size_bytes, ceiling, "Cache size ok");
            }
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    };

    state.errors.fetch_add(1, Ordering::Relaxed);
    tracing::error!(error = %failure, "LRU eviction cycle failed");
    if state.stop_on_error() {
        state.set_status(EvictorStatus::Stopped);
        tracing::warn!("LRU evictor stopping after error");
    }
}

// ============================================================================
// TESTS
// ============================================================================
