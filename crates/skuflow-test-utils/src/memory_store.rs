// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory repository for deterministic tests.
//!
//! `MemoryStore` implements every repository trait over a single mutex-guarded
//! state. Transitions follow the SQLite backend: conditional on current
//! status, archive generations, latest-generation restore. Writes for IMEIs
//! registered with [`MemoryStore::fail_writes_for`] fail with a storage error,
//! which lets tests drive the persistence-failure and rollback paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use skuflow_core::types::{
    ArchiveReport, ArchiveStats, ArchivedInventory, CanonicalTable, Condition, DeviceRecord,
    FailureKind, IngestReceipt, InventoryEventKind, InventoryRecord, MatchResult, QueueCounts,
    QueueFilter, QueueItem, QueueItemId, QueuePage, QueueStatus, RestoreReport, SkuCatalogEntry,
    StaleSweep, TableCounts, Tristate,
};
use skuflow_core::{
    ArchiveRepository, CatalogRepository, HealthStatus, IngestRepository, PluginAdapter,
    SkuflowError,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

fn now() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// A stored `inventory_matches` row.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRow {
    pub id: i64,
    pub imei: String,
    pub queue_item_id: QueueItemId,
    pub sku_code: Option<String>,
    pub score: f64,
    pub notes: String,
}

/// A stored `inventory_events` row.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub id: i64,
    pub imei: String,
    pub queue_item_id: QueueItemId,
    pub event: InventoryEventKind,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
struct Generation {
    archive_id: i64,
    record: InventoryRecord,
    matches: Vec<MatchRow>,
    events: Vec<EventRow>,
    archived_at: String,
    reason: String,
}

#[derive(Debug, Clone, Default)]
struct State {
    next_item_id: QueueItemId,
    next_row_id: i64,
    next_archive_id: i64,
    items: BTreeMap<QueueItemId, QueueItem>,
    catalog: Vec<SkuCatalogEntry>,
    inventory: BTreeMap<String, InventoryRecord>,
    matches: Vec<MatchRow>,
    events: Vec<EventRow>,
    archive: Vec<Generation>,
    failing: HashSet<String>,
}

impl State {
    fn row_id(&mut self) -> i64 {
        self.next_row_id += 1;
        self.next_row_id
    }

    fn check_writable(&self, imei: &str) -> Result<(), SkuflowError> {
        if self.failing.contains(imei) {
            return Err(SkuflowError::storage(format!("injected write failure for IMEI {imei}")));
        }
        Ok(())
    }

    /// Move one IMEI into a new archive generation. `None` if absent.
    fn archive_one(
        &mut self,
        plan: &[CanonicalTable],
        imei: &str,
        reason: &str,
    ) -> Result<Option<TableCounts>, SkuflowError> {
        if !self.inventory.contains_key(imei) {
            return Ok(None);
        }
        self.check_writable(imei)?;

        let mut rows = TableCounts::default();
        let mut record = None;
        let mut matches = Vec::new();
        let mut events = Vec::new();
        for &table in plan {
            match table {
                CanonicalTable::Inventory => {
                    record = self.inventory.remove(imei);
                    rows.add(table, 1);
                }
                CanonicalTable::InventoryMatches => {
                    let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.matches)
                        .into_iter()
                        .partition(|m| m.imei == imei);
                    self.matches = kept;
                    matches = taken;
                    rows.add(table, matches.len() as u64);
                }
                CanonicalTable::InventoryEvents => {
                    let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.events)
                        .into_iter()
                        .partition(|e| e.imei == imei);
                    self.events = kept;
                    events = taken;
                    rows.add(table, events.len() as u64);
                }
            }
        }
        let record = record.ok_or_else(|| {
            SkuflowError::Internal(format!("inventory row for {imei} vanished mid-archive"))
        })?;

        self.next_archive_id += 1;
        self.archive.push(Generation {
            archive_id: self.next_archive_id,
            record,
            matches,
            events,
            archived_at: now(),
            reason: reason.to_string(),
        });
        Ok(Some(rows))
    }

    /// Archive IMEIs in order; on failure the caller discards this state.
    fn archive_all_of(
        &mut self,
        plan: &[CanonicalTable],
        imeis: &[String],
        reason: &str,
    ) -> Result<ArchiveReport, SkuflowError> {
        let mut report = ArchiveReport::default();
        for imei in imeis {
            if report.archived.contains(imei) || report.not_found.contains(imei) {
                continue;
            }
            match self.archive_one(plan, imei, reason) {
                Ok(Some(rows)) => {
                    report.rows.merge(&rows);
                    report.archived.push(imei.clone());
                }
                Ok(None) => report.not_found.push(imei.clone()),
                Err(err) => {
                    return Err(SkuflowError::ArchiveAborted {
                        imei: imei.clone(),
                        source: Box::new(err),
                    });
                }
            }
        }
        Ok(report)
    }
}

/// In-memory implementation of the Skuflow repository traits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with `catalog`.
    pub fn with_catalog(catalog: Vec<SkuCatalogEntry>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                catalog,
                ..State::default()
            })),
        }
    }

    /// Replace the catalog contents.
    pub async fn set_catalog(&self, catalog: Vec<SkuCatalogEntry>) {
        self.state.lock().await.catalog = catalog;
    }

    /// Make every inventory or archive write for `imei` fail.
    pub async fn fail_writes_for(&self, imei: &str) {
        self.state.lock().await.failing.insert(imei.to_string());
    }

    /// Clear all injected failures.
    pub async fn heal(&self) {
        self.state.lock().await.failing.clear();
    }

    /// Shift every current claim `secs` into the past.
    pub async fn backdate_claims(&self, secs: i64) {
        let mut state = self.state.lock().await;
        let past = (chrono::Utc::now() - chrono::Duration::seconds(secs))
            .format(TIMESTAMP_FORMAT)
            .to_string();
        for item in state.items.values_mut() {
            if item.status == QueueStatus::Processing {
                item.claimed_at = Some(past.clone());
            }
        }
    }

    /// Match rows currently in the canonical table for `imei`.
    pub async fn matches_for(&self, imei: &str) -> Vec<MatchRow> {
        let state = self.state.lock().await;
        state.matches.iter().filter(|m| m.imei == imei).cloned().collect()
    }

    /// Event rows currently in the canonical table for `imei`.
    pub async fn events_for(&self, imei: &str) -> Vec<EventRow> {
        let state = self.state.lock().await;
        state.events.iter().filter(|e| e.imei == imei).cloned().collect()
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, SkuflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SkuflowError> {
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn active_catalog(&self) -> Result<Vec<SkuCatalogEntry>, SkuflowError> {
        let state = self.state.lock().await;
        let mut active: Vec<SkuCatalogEntry> =
            state.catalog.iter().filter(|e| e.is_active).cloned().collect();
        active.sort_by(|a, b| a.sku_code.cmp(&b.sku_code));
        Ok(active)
    }
}

#[async_trait]
impl IngestRepository for MemoryStore {
    async fn enqueue_many(
        &self,
        payloads: &[serde_json::Value],
    ) -> Result<Vec<QueueItemId>, SkuflowError> {
        let mut state = self.state.lock().await;
        let mut ids = Vec::with_capacity(payloads.len());
        for payload in payloads {
            state.next_item_id += 1;
            let id = state.next_item_id;
            let ts = now();
            state.items.insert(
                id,
                QueueItem {
                    id,
                    raw_data: payload.clone(),
                    status: QueueStatus::Pending,
                    retry_count: 0,
                    error_message: None,
                    error_kind: None,
                    claimed_by: None,
                    claimed_at: None,
                    created_at: ts.clone(),
                    updated_at: ts,
                    processed_at: None,
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    async fn claim_batch(
        &self,
        worker_id: &str,
        limit: usize,
    ) -> Result<Vec<QueueItem>, SkuflowError> {
        let mut state = self.state.lock().await;
        let ts = now();
        let mut claimed = Vec::new();
        for item in state.items.values_mut() {
            if claimed.len() >= limit {
                break;
            }
            if item.status != QueueStatus::Pending {
                continue;
            }
            item.status = QueueStatus::Processing;
            item.claimed_by = Some(worker_id.to_string());
            item.claimed_at = Some(ts.clone());
            item.updated_at = ts.clone();
            claimed.push(item.clone());
        }
        Ok(claimed)
    }

    async fn record_ingestion(
        &self,
        id: QueueItemId,
        device: &DeviceRecord,
        result: &MatchResult,
    ) -> Result<IngestReceipt, SkuflowError> {
        let mut state = self.state.lock().await;
        let processing = state
            .items
            .get(&id)
            .is_some_and(|item| item.status == QueueStatus::Processing);
        if !processing {
            return Err(SkuflowError::ClaimLost { id });
        }
        state.check_writable(&device.imei)?;

        let ts = now();
        let (quantity, event) = match state.inventory.get_mut(&device.imei) {
            None => {
                state.inventory.insert(
                    device.imei.clone(),
                    InventoryRecord {
                        imei: device.imei.clone(),
                        name: device.name.clone(),
                        brand: device.brand.clone(),
                        model: device.model.clone(),
                        storage: device.storage.clone(),
                        color: device.color.clone(),
                        carrier: device.carrier.clone(),
                        condition: device.condition.clone(),
                        working: device.working,
                        location: device.location.clone(),
                        notes: device.notes.clone(),
                        sku_code: result.sku_code.clone(),
                        match_score: result.score,
                        match_method: result.method,
                        quantity: 1,
                        created_at: ts.clone(),
                        updated_at: ts.clone(),
                    },
                );
                (1, InventoryEventKind::Created)
            }
            Some(record) => {
                record.name = device.name.clone();
                record.brand = device.brand.clone();
                record.model = device.model.clone();
                refresh(&mut record.storage, &device.storage);
                refresh(&mut record.color, &device.color);
                refresh(&mut record.carrier, &device.carrier);
                refresh(&mut record.location, &device.location);
                refresh(&mut record.notes, &device.notes);
                if device.condition != Condition::Unknown {
                    record.condition = device.condition.clone();
                }
                if device.working != Tristate::Unknown {
                    record.working = device.working;
                }
                if result.sku_code.is_some() || record.sku_code.is_none() {
                    record.match_score = result.score;
                    record.match_method = result.method;
                }
                refresh(&mut record.sku_code, &result.sku_code);
                record.quantity += 1;
                record.updated_at = ts.clone();
                (record.quantity, InventoryEventKind::Updated)
            }
        };

        let match_id = state.row_id();
        state.matches.push(MatchRow {
            id: match_id,
            imei: device.imei.clone(),
            queue_item_id: id,
            sku_code: result.sku_code.clone(),
            score: result.score,
            notes: result.notes.clone(),
        });
        let event_id = state.row_id();
        state.events.push(EventRow {
            id: event_id,
            imei: device.imei.clone(),
            queue_item_id: id,
            event,
            quantity,
        });

        if let Some(item) = state.items.get_mut(&id) {
            item.status = QueueStatus::Completed;
            item.error_kind = None;
            item.error_message = None;
            item.processed_at = Some(ts.clone());
            item.updated_at = ts;
        }

        Ok(IngestReceipt {
            imei: device.imei.clone(),
            quantity,
            created: event == InventoryEventKind::Created,
        })
    }

    async fn mark_failed(
        &self,
        id: QueueItemId,
        kind: FailureKind,
        message: &str,
        count_retry: bool,
    ) -> Result<(), SkuflowError> {
        let mut state = self.state.lock().await;
        let item = state
            .items
            .get_mut(&id)
            .filter(|item| item.status == QueueStatus::Processing)
            .ok_or(SkuflowError::ClaimLost { id })?;
        item.status = QueueStatus::Failed;
        item.error_kind = Some(kind);
        item.error_message = Some(message.to_string());
        if count_retry {
            item.retry_count += 1;
        }
        item.updated_at = now();
        Ok(())
    }

    async fn requeue_stale(
        &self,
        older_than: Duration,
        max_retries: u32,
    ) -> Result<StaleSweep, SkuflowError> {
        let age = chrono::Duration::from_std(older_than).map_err(SkuflowError::storage)?;
        let cutoff = (chrono::Utc::now() - age).format(TIMESTAMP_FORMAT).to_string();
        let ts = now();
        let mut state = self.state.lock().await;
        let mut sweep = StaleSweep::default();
        for item in state.items.values_mut() {
            let stale = item.status == QueueStatus::Processing
                && item.claimed_at.as_deref().is_some_and(|at| at < cutoff.as_str());
            if !stale {
                continue;
            }
            item.retry_count += 1;
            item.updated_at = ts.clone();
            if item.retry_count > max_retries {
                item.status = QueueStatus::Failed;
                item.error_kind = Some(FailureKind::Stale);
                item.error_message = Some(format!(
                    "claim by {} expired; retry limit reached",
                    item.claimed_by.as_deref().unwrap_or("unknown worker")
                ));
                sweep.failed.push(item.id);
            } else {
                item.status = QueueStatus::Pending;
                item.claimed_by = None;
                item.claimed_at = None;
                sweep.requeued.push(item.id);
            }
        }
        Ok(sweep)
    }

    async fn resubmit_failed(&self, max_retries: u32) -> Result<Vec<QueueItemId>, SkuflowError> {
        let mut state = self.state.lock().await;
        let ts = now();
        let mut ids = Vec::new();
        for item in state.items.values_mut() {
            let eligible = item.status == QueueStatus::Failed
                && item.error_kind.is_some_and(FailureKind::is_retryable)
                && item.retry_count <= max_retries;
            if !eligible {
                continue;
            }
            item.status = QueueStatus::Pending;
            item.error_kind = None;
            item.error_message = None;
            item.claimed_by = None;
            item.claimed_at = None;
            item.updated_at = ts.clone();
            ids.push(item.id);
        }
        Ok(ids)
    }

    async fn get_item(&self, id: QueueItemId) -> Result<Option<QueueItem>, SkuflowError> {
        Ok(self.state.lock().await.items.get(&id).cloned())
    }

    async fn list_items(&self, filter: &QueueFilter) -> Result<QueuePage, SkuflowError> {
        let state = self.state.lock().await;
        let matching: Vec<&QueueItem> = state
            .items
            .values()
            .filter(|item| filter.status.is_none_or(|s| item.status == s))
            .filter(|item| filter.min_retries.is_none_or(|n| item.retry_count >= n))
            .collect();
        Ok(QueuePage {
            total: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(filter.offset as usize)
                .take(filter.limit as usize)
                .cloned()
                .collect(),
        })
    }

    async fn queue_counts(&self) -> Result<QueueCounts, SkuflowError> {
        let state = self.state.lock().await;
        let mut counts = QueueCounts::default();
        for item in state.items.values() {
            counts.add(item.status, 1);
        }
        Ok(counts)
    }

    async fn get_inventory(&self, imei: &str) -> Result<Option<InventoryRecord>, SkuflowError> {
        Ok(self.state.lock().await.inventory.get(imei).cloned())
    }
}

fn refresh(stored: &mut Option<String>, incoming: &Option<String>) {
    if incoming.is_some() {
        stored.clone_from(incoming);
    }
}

#[async_trait]
impl ArchiveRepository for MemoryStore {
    async fn archive_imeis(
        &self,
        plan: &[CanonicalTable],
        imeis: &[String],
        reason: &str,
    ) -> Result<ArchiveReport, SkuflowError> {
        CanonicalTable::validate_plan(plan)?;
        let mut state = self.state.lock().await;
        let mut scratch = state.clone();
        let report = scratch.archive_all_of(plan, imeis, reason)?;
        *state = scratch;
        Ok(report)
    }

    async fn archive_everything(
        &self,
        plan: &[CanonicalTable],
        reason: &str,
    ) -> Result<ArchiveReport, SkuflowError> {
        CanonicalTable::validate_plan(plan)?;
        let mut state = self.state.lock().await;
        let mut scratch = state.clone();
        let imeis: Vec<String> = scratch.inventory.keys().cloned().collect();
        let report = scratch.archive_all_of(plan, &imeis, reason)?;
        *state = scratch;
        Ok(report)
    }

    async fn restore_imei(
        &self,
        plan: &[CanonicalTable],
        imei: &str,
    ) -> Result<RestoreReport, SkuflowError> {
        CanonicalTable::validate_plan(plan)?;
        let mut state = self.state.lock().await;
        if state.inventory.contains_key(imei) {
            return Err(SkuflowError::RestoreConflict {
                imei: imei.to_string(),
            });
        }

        let mut rows = TableCounts::default();
        let latest = state
            .archive
            .iter()
            .enumerate()
            .filter(|(_, g)| g.record.imei == imei)
            .max_by_key(|(_, g)| g.archive_id)
            .map(|(idx, _)| idx);
        let Some(idx) = latest else {
            return Ok(RestoreReport {
                imei: imei.to_string(),
                rows,
            });
        };

        let generation = state.archive.remove(idx);
        for &table in plan {
            match table {
                CanonicalTable::Inventory => {
                    state
                        .inventory
                        .insert(imei.to_string(), generation.record.clone());
                    rows.add(table, 1);
                }
                CanonicalTable::InventoryMatches => {
                    rows.add(table, generation.matches.len() as u64);
                    state.matches.extend(generation.matches.iter().cloned());
                }
                CanonicalTable::InventoryEvents => {
                    rows.add(table, generation.events.len() as u64);
                    state.events.extend(generation.events.iter().cloned());
                }
            }
        }
        Ok(RestoreReport {
            imei: imei.to_string(),
            rows,
        })
    }

    async fn get_archived(&self, imei: &str) -> Result<Option<ArchivedInventory>, SkuflowError> {
        let state = self.state.lock().await;
        Ok(state
            .archive
            .iter()
            .filter(|g| g.record.imei == imei)
            .max_by_key(|g| g.archive_id)
            .map(|g| ArchivedInventory {
                record: g.record.clone(),
                archived_at: g.archived_at.clone(),
                archived_reason: g.reason.clone(),
            }))
    }

    async fn archive_stats(&self) -> Result<ArchiveStats, SkuflowError> {
        let state = self.state.lock().await;
        let mut stats = ArchiveStats::default();
        stats.canonical.add(CanonicalTable::Inventory, state.inventory.len() as u64);
        stats.canonical.add(CanonicalTable::InventoryMatches, state.matches.len() as u64);
        stats.canonical.add(CanonicalTable::InventoryEvents, state.events.len() as u64);
        for generation in &state.archive {
            stats.archived.add(CanonicalTable::Inventory, 1);
            stats
                .archived
                .add(CanonicalTable::InventoryMatches, generation.matches.len() as u64);
            stats
                .archived
                .add(CanonicalTable::InventoryEvents, generation.events.len() as u64);
        }
        Ok(stats)
    }
}
