// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue processor: claim, normalize, match, persist.
//!
//! Items in a claimed batch are processed concurrently against one shared
//! catalog snapshot. Each inventory write holds the IMEI's lock, so two items
//! for the same device never interleave. Every error raised while handling an
//! item is mapped onto the item's `failed` state here and nowhere else.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use skuflow_config::model::QueueConfig;
use skuflow_core::types::{
    EnqueueReceipt, FailureKind, QueueFilter, QueueItem, QueueItemId, QueuePage, QueueStatus,
    SkuCatalogEntry, StaleSweep,
};
use skuflow_core::{CatalogRepository, ImeiLocks, IngestRepository, SkuflowError};
use skuflow_match::SkuMatcher;

use crate::normalize::normalize;

/// What happened to one claimed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Items claimed by this call.
    pub claimed: usize,
    /// Items written to inventory and marked `completed`.
    pub completed: usize,
    /// Completed items that got no SKU.
    pub unmatched: usize,
    /// Items marked `failed`.
    pub failed: usize,
    /// Items another actor moved out of `processing` before the result was
    /// written; left for whoever holds them now.
    pub lost: usize,
}

enum ItemOutcome {
    Completed { matched: bool },
    Failed,
    Lost,
}

/// Drives queue items through the ingestion state machine.
pub struct QueueProcessor {
    ingest: Arc<dyn IngestRepository>,
    catalog: Arc<dyn CatalogRepository>,
    matcher: SkuMatcher,
    locks: Arc<ImeiLocks>,
    config: QueueConfig,
}

impl QueueProcessor {
    pub fn new(
        ingest: Arc<dyn IngestRepository>,
        catalog: Arc<dyn CatalogRepository>,
        matcher: SkuMatcher,
        locks: Arc<ImeiLocks>,
        config: QueueConfig,
    ) -> Self {
        Self {
            ingest,
            catalog,
            matcher,
            locks,
            config,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn locks(&self) -> &Arc<ImeiLocks> {
        &self.locks
    }

    /// Persist payloads as `pending` items.
    ///
    /// Only non-empty JSON objects are accepted; everything else is counted in
    /// [`EnqueueReceipt::rejected`] and never stored.
    pub async fn enqueue(&self, payloads: Vec<Value>) -> Result<EnqueueReceipt, SkuflowError> {
        let total = payloads.len();
        let accepted: Vec<Value> = payloads
            .into_iter()
            .filter(|p| p.as_object().is_some_and(|map| !map.is_empty()))
            .collect();
        let rejected = total - accepted.len();

        let ids = if accepted.is_empty() {
            Vec::new()
        } else {
            self.ingest.enqueue_many(&accepted).await?
        };
        info!(accepted = ids.len(), rejected, "payloads enqueued");
        Ok(EnqueueReceipt { ids, rejected })
    }

    /// Claim one batch for `worker_id` and process it to completion.
    pub async fn process_batch(&self, worker_id: &str) -> Result<BatchReport, SkuflowError> {
        let items = self
            .ingest
            .claim_batch(worker_id, self.config.batch_size)
            .await?;
        let mut report = BatchReport {
            claimed: items.len(),
            ..BatchReport::default()
        };
        if items.is_empty() {
            return Ok(report);
        }
        debug!(worker_id, claimed = items.len(), "batch claimed");

        let catalog: Arc<[SkuCatalogEntry]> = match self.catalog.active_catalog().await {
            Ok(entries) => entries.into(),
            Err(err) => {
                error!(worker_id, error = %err, "catalog snapshot unavailable, failing batch");
                let outcomes = join_all(items.iter().map(|item| {
                    self.fail(item.id, SkuflowError::storage(format!("catalog unavailable: {err}")))
                }))
                .await;
                for outcome in outcomes {
                    tally(&mut report, outcome);
                }
                return Ok(report);
            }
        };

        let outcomes = join_all(items.iter().map(|item| self.process_item(item, &catalog))).await;
        for outcome in outcomes {
            tally(&mut report, outcome);
        }

        info!(
            worker_id,
            claimed = report.claimed,
            completed = report.completed,
            unmatched = report.unmatched,
            failed = report.failed,
            lost = report.lost,
            "batch processed"
        );
        Ok(report)
    }

    async fn process_item(&self, item: &QueueItem, catalog: &[SkuCatalogEntry]) -> ItemOutcome {
        match self.ingest_item(item, catalog).await {
            Ok(matched) => ItemOutcome::Completed { matched },
            Err(err) => self.fail(item.id, err).await,
        }
    }

    async fn ingest_item(
        &self,
        item: &QueueItem,
        catalog: &[SkuCatalogEntry],
    ) -> Result<bool, SkuflowError> {
        let device = normalize(&item.raw_data)?;
        let result = self.matcher.match_device(&device, catalog)?;
        if let Err(soft) = result.require_sku(&device.imei) {
            debug!(item_id = item.id, error = %soft, "ingesting without a sku");
        }

        let _guard = self.locks.lock(&device.imei).await;
        let receipt = self
            .ingest
            .record_ingestion(item.id, &device, &result)
            .await?;
        debug!(
            item_id = item.id,
            imei = %receipt.imei,
            quantity = receipt.quantity,
            created = receipt.created,
            sku = result.sku_code.as_deref().unwrap_or("-"),
            method = %result.method,
            "queue item completed"
        );
        Ok(result.is_matched())
    }

    /// Map an item error onto the queue. Validation and ambiguity leave the
    /// retry count alone; anything else counts one retry.
    async fn fail(&self, id: QueueItemId, err: SkuflowError) -> ItemOutcome {
        if let SkuflowError::ClaimLost { .. } = err {
            warn!(item_id = id, "claim lost before result was written");
            return ItemOutcome::Lost;
        }

        let kind = err.failure_kind();
        let message = failure_message(&err);
        match kind {
            FailureKind::Validation | FailureKind::Ambiguous => {
                info!(item_id = id, kind = %kind, error = %message, "queue item rejected");
            }
            _ => warn!(item_id = id, kind = %kind, error = %message, "queue item failed"),
        }

        match self
            .ingest
            .mark_failed(id, kind, &message, err.is_retryable())
            .await
        {
            Ok(()) => ItemOutcome::Failed,
            Err(SkuflowError::ClaimLost { .. }) => {
                warn!(item_id = id, "claim lost before failure was recorded");
                ItemOutcome::Lost
            }
            Err(mark_err) => {
                // Left in `processing`; the stale sweep will pick it up.
                error!(item_id = id, error = %mark_err, "could not record queue item failure");
                ItemOutcome::Lost
            }
        }
    }

    /// Requeue or fail claims older than `stale_after`.
    pub async fn sweep_stale(&self) -> Result<StaleSweep, SkuflowError> {
        let sweep = self
            .ingest
            .requeue_stale(self.config.stale_after(), self.config.max_retries)
            .await?;
        if !sweep.requeued.is_empty() || !sweep.failed.is_empty() {
            warn!(
                requeued = sweep.requeued.len(),
                failed = sweep.failed.len(),
                "stale claims swept"
            );
        }
        Ok(sweep)
    }

    /// Explicitly re-submit retryable failures whose `retry_count` has not
    /// exceeded `max_retries`.
    pub async fn resubmit(&self) -> Result<Vec<QueueItemId>, SkuflowError> {
        let ids = self.ingest.resubmit_failed(self.config.max_retries).await?;
        info!(count = ids.len(), "failed items re-submitted");
        Ok(ids)
    }

    /// Failed items whose `retry_count` exceeds `max_retries`, for manual inspection.
    pub async fn exhausted(&self, limit: u32, offset: u32) -> Result<QueuePage, SkuflowError> {
        self.ingest
            .list_items(&QueueFilter {
                status: Some(QueueStatus::Failed),
                min_retries: Some(self.config.max_retries.saturating_add(1)),
                limit,
                offset,
            })
            .await
    }
}

fn tally(report: &mut BatchReport, outcome: ItemOutcome) {
    match outcome {
        ItemOutcome::Completed { matched } => {
            report.completed += 1;
            if !matched {
                report.unmatched += 1;
            }
        }
        ItemOutcome::Failed => report.failed += 1,
        ItemOutcome::Lost => report.lost += 1,
    }
}

/// Text stored in `error_message`: storage failures keep the underlying
/// message, everything else its display form.
fn failure_message(err: &SkuflowError) -> String {
    match err {
        SkuflowError::Storage { source } => source.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skuflow_core::types::MatchMethod;
    use skuflow_test_utils::fixtures::{fold3_catalog, fold3_entry, fold3_payload, without};
    use skuflow_test_utils::MemoryStore;
    use tracing_test::traced_test;

    fn processor(store: &MemoryStore) -> QueueProcessor {
        processor_with(store, QueueConfig::default())
    }

    fn processor_with(store: &MemoryStore, config: QueueConfig) -> QueueProcessor {
        QueueProcessor::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            SkuMatcher::default(),
            Arc::new(ImeiLocks::new()),
            config,
        )
    }

    #[tokio::test]
    async fn enqueue_rejects_non_objects_and_empty_objects() {
        let store = MemoryStore::new();
        let receipt = processor(&store)
            .enqueue(vec![json!({"imei": "1"}), json!({}), json!([1]), json!("x"), json!({"a": 1})])
            .await
            .unwrap();
        assert_eq!(receipt.ids.len(), 2);
        assert_eq!(receipt.rejected, 3);
        assert_eq!(store.queue_counts().await.unwrap().pending, 2);
    }

    #[tokio::test]
    async fn fold3_tmobile_device_falls_back_to_unlocked_sku() {
        let store = MemoryStore::with_catalog(fold3_catalog());
        let processor = processor(&store);
        processor.enqueue(vec![fold3_payload("356938035643809")]).await.unwrap();

        let report = processor.process_batch("w1").await.unwrap();
        assert_eq!(report.completed, 1);

        let record = store.get_inventory("356938035643809").await.unwrap().unwrap();
        assert_eq!(record.sku_code.as_deref(), Some("FOLD3-256-BLK-UNLOCKED"));
        assert_eq!(record.match_method, MatchMethod::UnlockedFallback);
        assert!((record.match_score - 0.875).abs() < 1e-9);
        assert_eq!(record.quantity, 1);
    }

    #[tokio::test]
    async fn missing_brand_fails_validation_without_retry() {
        let store = MemoryStore::with_catalog(fold3_catalog());
        let processor = processor(&store);
        let receipt = processor
            .enqueue(vec![without(fold3_payload("111"), "brand")])
            .await
            .unwrap();

        let report = processor.process_batch("w1").await.unwrap();
        assert_eq!(report.failed, 1);

        let item = store.get_item(receipt.ids[0]).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.error_kind, Some(FailureKind::Validation));
        assert_eq!(item.retry_count, 0);
        assert!(item.error_message.unwrap().contains("brand"));
        assert!(store.get_inventory("111").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn same_imei_twice_yields_one_record_with_quantity_two() {
        let store = MemoryStore::with_catalog(fold3_catalog());
        let processor = processor(&store);
        processor
            .enqueue(vec![fold3_payload("111"), fold3_payload("111")])
            .await
            .unwrap();

        let report = processor.process_batch("w1").await.unwrap();
        assert_eq!(report.completed, 2);
        let record = store.get_inventory("111").await.unwrap().unwrap();
        assert_eq!(record.quantity, 2);
        assert_eq!(store.matches_for("111").await.len(), 2);
    }

    #[tokio::test]
    async fn statuses_are_conserved() {
        let store = MemoryStore::with_catalog(fold3_catalog());
        let processor = processor_with(
            &store,
            QueueConfig {
                batch_size: 3,
                ..QueueConfig::default()
            },
        );
        let payloads = vec![
            fold3_payload("1"),
            without(fold3_payload("2"), "model"),
            fold3_payload("3"),
            json!({"imei": "4", "name": "Pixel", "brand": "Google", "model": "Pixel 7"}),
            fold3_payload("5"),
        ];
        processor.enqueue(payloads).await.unwrap();

        processor.process_batch("w1").await.unwrap();
        let mid = store.queue_counts().await.unwrap();
        assert_eq!(mid.total(), 5);
        assert_eq!(mid.pending, 2);

        processor.process_batch("w1").await.unwrap();
        let end = store.queue_counts().await.unwrap();
        assert_eq!(end.total(), 5);
        assert_eq!(end.completed, 4);
        assert_eq!(end.failed, 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn unmatched_device_completes_with_null_sku() {
        let store = MemoryStore::with_catalog(fold3_catalog());
        let processor = processor(&store);
        processor
            .enqueue(vec![json!({"imei": "9", "name": "Pixel", "brand": "Google", "model": "Pixel 7"})])
            .await
            .unwrap();

        let report = processor.process_batch("w1").await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.unmatched, 1);

        let record = store.get_inventory("9").await.unwrap().unwrap();
        assert_eq!(record.sku_code, None);
        assert_eq!(record.match_method, MatchMethod::Unmatched);
        assert!(logs_contain("no catalog match for IMEI 9"));
    }

    #[tokio::test]
    async fn ambiguous_catalog_fails_without_retry() {
        let mut twin = fold3_entry("FOLD3-DUP", "AT&T", false);
        twin.storage = Some("512GB".into());
        let store = MemoryStore::with_catalog(vec![fold3_entry("FOLD3-DUP", "AT&T", false), twin]);
        let processor = processor(&store);
        let mut payload = without(fold3_payload("7"), "storage");
        payload["carrier"] = json!("ATT");
        let receipt = processor.enqueue(vec![payload]).await.unwrap();

        processor.process_batch("w1").await.unwrap();
        let item = store.get_item(receipt.ids[0]).await.unwrap().unwrap();
        assert_eq!(item.error_kind, Some(FailureKind::Ambiguous));
        assert_eq!(item.retry_count, 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn persistence_failure_counts_retry_and_can_be_resubmitted() {
        let store = MemoryStore::with_catalog(fold3_catalog());
        let processor = processor(&store);
        let receipt = processor.enqueue(vec![fold3_payload("111")]).await.unwrap();
        let id = receipt.ids[0];

        store.fail_writes_for("111").await;
        let report = processor.process_batch("w1").await.unwrap();
        assert_eq!(report.failed, 1);
        let item = store.get_item(id).await.unwrap().unwrap();
        assert_eq!(item.error_kind, Some(FailureKind::Persistence));
        assert_eq!(item.retry_count, 1);
        assert_eq!(
            item.error_message.as_deref(),
            Some("injected write failure for IMEI 111")
        );
        assert!(logs_contain("queue item failed"));

        store.heal().await;
        assert_eq!(processor.resubmit().await.unwrap(), vec![id]);
        processor.process_batch("w1").await.unwrap();
        let item = store.get_item(id).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Completed);
        assert_eq!(item.retry_count, 1);
    }

    #[tokio::test]
    async fn resubmission_stops_at_the_ceiling() {
        let store = MemoryStore::with_catalog(fold3_catalog());
        let processor = processor_with(
            &store,
            QueueConfig {
                max_retries: 2,
                ..QueueConfig::default()
            },
        );
        processor.enqueue(vec![fold3_payload("111")]).await.unwrap();
        store.fail_writes_for("111").await;

        processor.process_batch("w1").await.unwrap();
        assert_eq!(processor.resubmit().await.unwrap().len(), 1);
        processor.process_batch("w1").await.unwrap();

        // Two counted retries sit at the ceiling without exceeding it.
        assert_eq!(processor.exhausted(10, 0).await.unwrap().total, 0);
        assert_eq!(processor.resubmit().await.unwrap().len(), 1);
        processor.process_batch("w1").await.unwrap();
        assert!(processor.resubmit().await.unwrap().is_empty());

        let exhausted = processor.exhausted(10, 0).await.unwrap();
        assert_eq!(exhausted.total, 1);
        assert_eq!(exhausted.items[0].retry_count, 3);
    }

    #[tokio::test]
    async fn sweep_and_resubmit_share_one_ceiling() {
        let store = MemoryStore::with_catalog(fold3_catalog());
        let processor = processor_with(
            &store,
            QueueConfig {
                max_retries: 1,
                stale_after_secs: 60,
                ..QueueConfig::default()
            },
        );
        let swept = processor.enqueue(vec![fold3_payload("111")]).await.unwrap().ids[0];
        store.claim_batch("crashed", 10).await.unwrap();
        store.backdate_claims(120).await;
        assert_eq!(processor.sweep_stale().await.unwrap().requeued, vec![swept]);
        let item = store.get_item(swept).await.unwrap().unwrap();
        assert_eq!((item.status, item.retry_count), (QueueStatus::Pending, 1));

        let failed = processor.enqueue(vec![fold3_payload("222")]).await.unwrap().ids[0];
        store.fail_writes_for("222").await;
        processor.process_batch("w1").await.unwrap();
        let item = store.get_item(failed).await.unwrap().unwrap();
        assert_eq!((item.status, item.retry_count), (QueueStatus::Failed, 1));

        // Same retry count as the swept item, so it is equally eligible.
        assert_eq!(processor.resubmit().await.unwrap(), vec![failed]);
    }

    #[tokio::test]
    async fn stale_claims_return_to_pending_then_fail() {
        let store = MemoryStore::with_catalog(fold3_catalog());
        let processor = processor_with(
            &store,
            QueueConfig {
                max_retries: 1,
                stale_after_secs: 60,
                ..QueueConfig::default()
            },
        );
        let receipt = processor.enqueue(vec![fold3_payload("111")]).await.unwrap();
        let id = receipt.ids[0];

        store.claim_batch("crashed", 10).await.unwrap();
        assert!(processor.sweep_stale().await.unwrap().requeued.is_empty());

        store.backdate_claims(120).await;
        assert_eq!(processor.sweep_stale().await.unwrap().requeued, vec![id]);

        store.claim_batch("crashed-again", 10).await.unwrap();
        store.backdate_claims(120).await;
        let sweep = processor.sweep_stale().await.unwrap();
        assert_eq!(sweep.failed, vec![id]);

        let item = store.get_item(id).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.error_kind, Some(FailureKind::Stale));
        assert_eq!(item.retry_count, 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn result_for_reclaimed_item_is_dropped() {
        let store = MemoryStore::with_catalog(fold3_catalog());
        let processor = processor(&store);
        processor.enqueue(vec![fold3_payload("111")]).await.unwrap();

        // Hold the IMEI lock so the write waits while the claim is swept away.
        let guard = processor.locks().lock("111").await;
        let batch = {
            let processor = &processor;
            async move { processor.process_batch("slow").await }
        };
        let sweep = async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            store.backdate_claims(3600).await;
            processor.sweep_stale().await.unwrap();
            drop(guard);
        };
        let (report, ()) = tokio::join!(batch, sweep);

        assert_eq!(report.unwrap().lost, 1);
        assert!(store.get_inventory("111").await.unwrap().is_none());
        assert_eq!(store.queue_counts().await.unwrap().pending, 1);
        assert!(logs_contain("claim lost"));
    }
}
