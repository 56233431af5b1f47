//! TTL Sweep Background Task
//!
//! Periodically sweeps every cache in a directory, expiring the entries in
//! the SHORT through VERY_LONG scopes whose last touch is older than the
//! scope's TTL. The sweep itself is synchronous and runs on the blocking
//! pool so a large cache never stalls the runtime.

use crate::directory::CacheDirectory;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// METRICS
// ============================================================================

/// Counters for sweep activity.
#[derive(Debug, Default)]
pub struct SweepMetrics {
    /// Total sweep cycles started
    pub sweep_cycles: AtomicU64,

    /// Total entries expired since startup
    pub entries_evicted: AtomicU64,

    /// Total cycles that panicked
    pub sweep_errors: AtomicU64,
}

impl SweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SweepSnapshot {
        SweepSnapshot {
            sweep_cycles: self.sweep_cycles.load(Ordering::Relaxed),
            entries_evicted: self.entries_evicted.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sweep metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSnapshot {
    pub sweep_cycles: u64,
    pub entries_evicted: u64,
    pub sweep_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that sweeps the directory every `sweep_interval` until
/// the shutdown signal is received.
///
/// The first sweep runs immediately.
pub async fn sweep_task(
    directory: Arc<CacheDirectory>,
    sweep_interval: Duration,
    metrics: Arc<SweepMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SweepMetrics> {
    let mut ticker = interval(sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        sweep_interval_ms = sweep_interval.as_millis() as u64,
        "Cache sweep task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache sweep task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                run_sweep(&directory, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        sweep_cycles = snapshot.sweep_cycles,
        entries_evicted = snapshot.entries_evicted,
        sweep_errors = snapshot.sweep_errors,
        "Cache sweep task completed"
    );

    metrics
}

/// Perform one sweep cycle.
async fn run_sweep(directory: &Arc<CacheDirectory>, metrics: &SweepMetrics) {
    metrics.sweep_cycles.fetch_add(1, Ordering::Relaxed);

    let directory = Arc::clone(directory);
    let result = tokio::task::spawn_blocking(move || {
        let now = directory.clock().now_millis();
        directory.sweep_all(now)
    })
    .await;

    match result {
        Ok(0) => tracing::trace!("Sweep cycle completed with no expired entries"),
        Ok(evicted) => {
            tracing::info!(evicted, "Sweep cycle completed");
            metrics
                .entries_evicted
                .fetch_add(evicted as u64, Ordering::Relaxed);
        }
        Err(e) => {
            tracing::error!(error = %e, "Sweep cycle failed");
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
