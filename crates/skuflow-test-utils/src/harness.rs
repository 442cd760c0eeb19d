// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness backed by a real SQLite database.
//!
//! `TestHarness` opens a migrated database in a temp directory, seeds the
//! catalog, and hands out the storage as the repository trait objects the
//! pipeline components take.

use std::sync::Arc;

use skuflow_config::model::{QueueConfig, SkuflowConfig, StorageConfig};
use skuflow_core::types::SkuCatalogEntry;
use skuflow_core::SkuflowError;
use skuflow_storage::SqliteStorage;

use crate::fixtures::fold3_catalog;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    catalog: Vec<SkuCatalogEntry>,
    queue: QueueConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            catalog: fold3_catalog(),
            queue: QueueConfig::default(),
        }
    }

    /// Replace the default Fold3 catalog.
    pub fn with_catalog(mut self, catalog: Vec<SkuCatalogEntry>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Override queue settings (batch size, retry ceiling, worker count).
    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    /// Build the harness, creating and migrating the temp database.
    pub async fn build(self) -> Result<TestHarness, SkuflowError> {
        let temp_dir = tempfile::TempDir::new().map_err(SkuflowError::storage)?;
        let db_path = temp_dir.path().join("skuflow-test.db");

        let storage_config = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            ..StorageConfig::default()
        };
        let storage = SqliteStorage::new(storage_config.clone());
        storage.initialize().await?;
        storage.upsert_catalog(&self.catalog).await?;

        let config = SkuflowConfig {
            storage: storage_config,
            queue: self.queue,
            ..SkuflowConfig::default()
        };

        Ok(TestHarness {
            storage: Arc::new(storage),
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A migrated temp database plus the configuration pointing at it.
pub struct TestHarness {
    /// SQLite storage (temp DB, removed on drop).
    pub storage: Arc<SqliteStorage>,
    /// Configuration whose storage section points at the temp DB.
    pub config: SkuflowConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with the Fold3 catalog and default settings.
    pub async fn new() -> Result<Self, SkuflowError> {
        Self::builder().build().await
    }
}
