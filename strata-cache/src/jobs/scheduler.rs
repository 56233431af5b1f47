//! Owner of the cache's background tasks.

use super::lru_flush::{lru_flush_task, EvictorSnapshot, EvictorState};
use super::sweep::{sweep_task, SweepMetrics, SweepSnapshot};
use crate::directory::CacheDirectory;
use serde::Serialize;
use std::sync::Arc;
use strata_core::{CacheError, StrataResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Final counters of a stopped scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerReport {
    pub sweep: SweepSnapshot,
    /// `None` when the evictor was not scheduled on this server
    pub evictor: Option<EvictorSnapshot>,
}

/// Runs the TTL sweep and, where configured, the LRU evictor for a
/// directory.
pub struct EvictionScheduler {
    shutdown_tx: watch::Sender<bool>,
    sweep_handle: JoinHandle<Arc<SweepMetrics>>,
    lru_handle: Option<JoinHandle<Arc<EvictorState>>>,
    sweep_metrics: Arc<SweepMetrics>,
    evictor: Arc<EvictorState>,
}

impl EvictionScheduler {
    /// Spawn the background tasks. Must be called within a Tokio runtime.
    ///
    /// The sweep always runs. The evictor runs only when enabled and the
    /// run-list selects this server.
    pub fn start(directory: Arc<CacheDirectory>) -> Self {
        let config = directory.config().clone();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sweep_metrics = Arc::new(SweepMetrics::new());
        let sweep_handle = tokio::spawn(sweep_task(
            Arc::clone(&directory),
            config.sweep_interval,
            Arc::clone(&sweep_metrics),
            shutdown_rx.clone(),
        ));

        let evictor = Arc::new(EvictorState::new(&config.eviction));
        let lru_handle = if config.eviction.should_run() {
            Some(tokio::spawn(lru_flush_task(
                directory,
                config.eviction.run_interval,
                Arc::clone(&evictor),
                shutdown_rx,
            )))
        } else {
            tracing::info!(
                enabled = config.eviction.enabled,
                server_name = %config.eviction.server_name,
                servers_list = %config.eviction.servers_list,
                "LRU evictor not scheduled on this server"
            );
            None
        };

        Self {
            shutdown_tx,
            sweep_handle,
            lru_handle,
            sweep_metrics,
            evictor,
        }
    }

    pub fn sweep_metrics(&self) -> SweepSnapshot {
        self.sweep_metrics.snapshot()
    }

    /// Shared evictor state, for status reads and live tuning.
    pub fn evictor(&self) -> &Arc<EvictorState> {
        &self.evictor
    }

    pub fn evictor_scheduled(&self) -> bool {
        self.lru_handle.is_some()
    }

    /// Signal both tasks to stop and wait for them.
    pub async fn shutdown(self) -> StrataResult<SchedulerReport> {
        // Receivers are gone only if both tasks already exited.
        let _ = self.shutdown_tx.send(true);

        let sweep = match self.sweep_handle.await {
            Ok(metrics) => metrics.snapshot(),
            Err(e) => {
                tracing::error!(error = %e, "Cache sweep task did not stop cleanly");
                return Err(CacheError::SchedulerStopped.into());
            }
        };

        let evictor = match self.lru_handle {
            Some(handle) => match handle.await {
                Ok(state) => Some(state.snapshot()),
                Err(e) => {
                    tracing::error!(error = %e, "LRU evictor did not stop cleanly");
                    return Err(CacheError::SchedulerStopped.into());
                }
            },
            None => None,
        };

        Ok(SchedulerReport { sweep, evictor })
    }
}
