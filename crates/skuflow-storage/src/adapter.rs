// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the repository traits.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use skuflow_config::model::StorageConfig;
use skuflow_core::types::{
    ArchiveReport, ArchiveStats, ArchivedInventory, CanonicalTable, DeviceRecord, FailureKind,
    IngestReceipt, InventoryRecord, MatchResult, QueueCounts, QueueFilter, QueueItem, QueueItemId,
    QueuePage, RestoreReport, SkuCatalogEntry, StaleSweep,
};
use skuflow_core::{
    ArchiveRepository, CatalogRepository, HealthStatus, IngestRepository, PluginAdapter,
    SkuflowError,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed repository.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules. The
/// database is opened on [`SqliteStorage::initialize`]; every other call
/// fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`](Self::initialize) is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the database and run migrations.
    pub async fn initialize(&self) -> Result<(), SkuflowError> {
        let db = Database::open_with(&self.config).await?;
        self.db.set(db).map_err(|_| SkuflowError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    pub fn db(&self) -> Result<&Database, SkuflowError> {
        self.db.get().ok_or_else(|| SkuflowError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Insert or replace catalog entries.
    pub async fn upsert_catalog(&self, entries: &[SkuCatalogEntry]) -> Result<usize, SkuflowError> {
        queries::catalog::upsert_entries(self.db()?, entries).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, SkuflowError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SkuflowError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                    Ok(())
                })
                .await
                .map_err(crate::database::map_tr_err)?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for SqliteStorage {
    async fn active_catalog(&self) -> Result<Vec<SkuCatalogEntry>, SkuflowError> {
        queries::catalog::active_catalog(self.db()?).await
    }
}

#[async_trait]
impl IngestRepository for SqliteStorage {
    async fn enqueue_many(
        &self,
        payloads: &[serde_json::Value],
    ) -> Result<Vec<QueueItemId>, SkuflowError> {
        let encoded = payloads.iter().map(|p| p.to_string()).collect();
        queries::queue::enqueue_many(self.db()?, encoded).await
    }

    async fn claim_batch(
        &self,
        worker_id: &str,
        limit: usize,
    ) -> Result<Vec<QueueItem>, SkuflowError> {
        queries::queue::claim_batch(self.db()?, worker_id, limit).await
    }

    async fn record_ingestion(
        &self,
        id: QueueItemId,
        device: &DeviceRecord,
        result: &MatchResult,
    ) -> Result<IngestReceipt, SkuflowError> {
        queries::inventory::record_ingestion(self.db()?, id, device, result).await
    }

    async fn mark_failed(
        &self,
        id: QueueItemId,
        kind: FailureKind,
        message: &str,
        count_retry: bool,
    ) -> Result<(), SkuflowError> {
        queries::queue::mark_failed(self.db()?, id, kind, message, count_retry).await
    }

    async fn requeue_stale(
        &self,
        older_than: Duration,
        max_retries: u32,
    ) -> Result<StaleSweep, SkuflowError> {
        queries::queue::requeue_stale(self.db()?, older_than, max_retries).await
    }

    async fn resubmit_failed(&self, max_retries: u32) -> Result<Vec<QueueItemId>, SkuflowError> {
        queries::queue::resubmit_failed(self.db()?, max_retries).await
    }

    async fn get_item(&self, id: QueueItemId) -> Result<Option<QueueItem>, SkuflowError> {
        queries::queue::get_item(self.db()?, id).await
    }

    async fn list_items(&self, filter: &QueueFilter) -> Result<QueuePage, SkuflowError> {
        queries::queue::list_items(self.db()?, filter).await
    }

    async fn queue_counts(&self) -> Result<QueueCounts, SkuflowError> {
        queries::queue::queue_counts(self.db()?).await
    }

    async fn get_inventory(&self, imei: &str) -> Result<Option<InventoryRecord>, SkuflowError> {
        queries::inventory::get_inventory(self.db()?, imei).await
    }
}

#[async_trait]
impl ArchiveRepository for SqliteStorage {
    async fn archive_imeis(
        &self,
        plan: &[CanonicalTable],
        imeis: &[String],
        reason: &str,
    ) -> Result<ArchiveReport, SkuflowError> {
        queries::archive::archive_imeis(self.db()?, plan, imeis, reason).await
    }

    async fn archive_everything(
        &self,
        plan: &[CanonicalTable],
        reason: &str,
    ) -> Result<ArchiveReport, SkuflowError> {
        queries::archive::archive_everything(self.db()?, plan, reason).await
    }

    async fn restore_imei(
        &self,
        plan: &[CanonicalTable],
        imei: &str,
    ) -> Result<RestoreReport, SkuflowError> {
        queries::archive::restore_imei(self.db()?, plan, imei).await
    }

    async fn get_archived(&self, imei: &str) -> Result<Option<ArchivedInventory>, SkuflowError> {
        queries::archive::get_archived(self.db()?, imei).await
    }

    async fn archive_stats(&self) -> Result<ArchiveStats, SkuflowError> {
        queries::archive::archive_stats(self.db()?).await
    }
}
