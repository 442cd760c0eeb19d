// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue and inventory persistence.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SkuflowError;
use crate::types::{
    DeviceRecord, FailureKind, IngestReceipt, InventoryRecord, MatchResult, QueueCounts,
    QueueFilter, QueueItem, QueueItemId, QueuePage, StaleSweep,
};

/// Queue state machine storage plus upsert-by-IMEI inventory writes.
///
/// Every state change is conditional on the item's current status, so
/// transitions stay monotonic even when callers race.
#[async_trait]
pub trait IngestRepository: Send + Sync {
    /// Insert payloads as `pending` items. Returns ids in input order.
    async fn enqueue_many(
        &self,
        payloads: &[serde_json::Value],
    ) -> Result<Vec<QueueItemId>, SkuflowError>;

    /// Atomically move up to `limit` of the oldest `pending` items to
    /// `processing`, owned by `worker_id`. No item is ever returned to two callers.
    async fn claim_batch(
        &self,
        worker_id: &str,
        limit: usize,
    ) -> Result<Vec<QueueItem>, SkuflowError>;

    /// In one transaction: upsert the inventory row for `device.imei`, record
    /// the match and audit event, and mark the item `completed`.
    ///
    /// Fails with [`SkuflowError::ClaimLost`] if the item is no longer `processing`.
    async fn record_ingestion(
        &self,
        id: QueueItemId,
        device: &DeviceRecord,
        result: &MatchResult,
    ) -> Result<IngestReceipt, SkuflowError>;

    /// Move a `processing` item to `failed`, optionally counting a retry.
    async fn mark_failed(
        &self,
        id: QueueItemId,
        kind: FailureKind,
        message: &str,
        count_retry: bool,
    ) -> Result<(), SkuflowError>;

    /// Return items claimed longer than `older_than` to `pending` with one more
    /// retry; items that would exceed `max_retries` become `failed` instead.
    async fn requeue_stale(
        &self,
        older_than: Duration,
        max_retries: u32,
    ) -> Result<StaleSweep, SkuflowError>;

    /// Explicit re-submission: move retryable `failed` items whose
    /// `retry_count` has not exceeded `max_retries` back to `pending`.
    async fn resubmit_failed(&self, max_retries: u32) -> Result<Vec<QueueItemId>, SkuflowError>;

    async fn get_item(&self, id: QueueItemId) -> Result<Option<QueueItem>, SkuflowError>;

    /// Read-only, paginated listing ordered by id.
    async fn list_items(&self, filter: &QueueFilter) -> Result<QueuePage, SkuflowError>;

    async fn queue_counts(&self) -> Result<QueueCounts, SkuflowError>;

    async fn get_inventory(&self, imei: &str) -> Result<Option<InventoryRecord>, SkuflowError>;
}
