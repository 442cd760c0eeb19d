// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker pool: `workers` claim loops plus one stale-claim sweeper.
//!
//! A worker that finds work claims again immediately; an idle one sleeps for
//! `poll_interval`. Cancellation is checked between batches, never inside one.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::processor::QueueProcessor;

/// Runs a [`QueueProcessor`] on several concurrent loops until cancelled.
pub struct WorkerPool {
    processor: Arc<QueueProcessor>,
    instance: String,
}

impl WorkerPool {
    pub fn new(processor: Arc<QueueProcessor>) -> Self {
        let instance = uuid::Uuid::new_v4().simple().to_string();
        Self {
            processor,
            instance: instance[..8].to_string(),
        }
    }

    /// Worker identifier stamped on claims, unique per pool instance.
    pub fn worker_id(&self, n: usize) -> String {
        format!("worker-{}-{n}", self.instance)
    }

    /// Run every loop until `cancel` fires, then wait for them to drain.
    pub async fn run(self, cancel: CancellationToken) {
        let config = self.processor.config().clone();
        let mut tasks = JoinSet::new();

        for n in 0..config.workers {
            let processor = self.processor.clone();
            let cancel = cancel.clone();
            let worker_id = self.worker_id(n);
            let poll = config.poll_interval();
            tasks.spawn(async move {
                worker_loop(processor, worker_id, poll, cancel).await;
            });
        }

        {
            let processor = self.processor.clone();
            let cancel = cancel.clone();
            let every = config.sweep_interval();
            tasks.spawn(async move {
                sweeper_loop(processor, every, cancel).await;
            });
        }

        info!(workers = config.workers, instance = %self.instance, "worker pool started");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
        info!("worker pool stopped");
    }
}

async fn worker_loop(
    processor: Arc<QueueProcessor>,
    worker_id: String,
    poll: std::time::Duration,
    cancel: CancellationToken,
) {
    debug!(worker_id = %worker_id, "worker started");
    while !cancel.is_cancelled() {
        let idle = match processor.process_batch(&worker_id).await {
            Ok(report) => report.claimed == 0,
            Err(e) => {
                warn!(worker_id = %worker_id, error = %e, "batch failed");
                true
            }
        };
        if idle {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }
    debug!(worker_id = %worker_id, "worker shutting down");
}

async fn sweeper_loop(
    processor: Arc<QueueProcessor>,
    every: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = processor.sweep_stale().await {
                    warn!(error = %e, "stale sweep failed (non-fatal)");
                }
                processor.locks().prune();
            }
            _ = cancel.cancelled() => {
                debug!("stale sweeper shutting down");
                break;
            }
        }
    }
}
