// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `skuflow run`: worker pool plus stale sweeper until a shutdown signal.

use std::sync::Arc;

use skuflow_config::SkuflowConfig;
use skuflow_core::{HealthStatus, ImeiLocks, PluginAdapter, SkuflowError};
use skuflow_queue::{install_signal_handler, WorkerPool};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{build_processor, open_storage};

pub async fn run(config: &SkuflowConfig) -> Result<(), SkuflowError> {
    let storage = open_storage(config).await?;
    match storage.health_check().await? {
        HealthStatus::Healthy => {}
        HealthStatus::Degraded(reason) => warn!(reason = %reason, "storage degraded at startup"),
        HealthStatus::Unhealthy(reason) => {
            return Err(SkuflowError::Internal(format!("storage unhealthy: {reason}")));
        }
    }

    let processor = Arc::new(build_processor(config, &storage, Arc::new(ImeiLocks::new())));
    let cancel = install_signal_handler();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move { memory_monitor(cancel).await });
    }

    info!(
        database = %config.storage.database_path,
        workers = config.queue.workers,
        batch_size = config.queue.batch_size,
        "skuflow intake running"
    );
    WorkerPool::new(processor).run(cancel).await;

    storage.shutdown().await?;
    info!("skuflow shutdown complete");
    Ok(())
}

/// Logs allocator statistics once a minute.
#[cfg(not(target_env = "msvc"))]
async fn memory_monitor(cancel: CancellationToken) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Stats are cached until the epoch advances.
                let _ = tikv_jemalloc_ctl::epoch::advance();
                let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
                let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
                debug!(
                    allocated_mb = allocated / (1024 * 1024),
                    resident_mb = resident / (1024 * 1024),
                    "memory usage"
                );
            }
            _ = cancel.cancelled() => break,
        }
    }
}

#[cfg(target_env = "msvc")]
async fn memory_monitor(cancel: CancellationToken) {
    cancel.cancelled().await;
}
