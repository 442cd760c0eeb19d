// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! `Database` wraps exactly one `tokio_rusqlite::Connection`; query modules
//! accept `&Database` and go through [`Database::connection`]. Do NOT create
//! additional Connection instances for writes.
//!
//! Claims and archival additionally open `BEGIN IMMEDIATE` transactions so a
//! second process sharing the file cannot interleave with them.

use std::path::Path;
use std::time::Duration;

use skuflow_config::model::StorageConfig;
use skuflow_core::SkuflowError;
use tracing::{debug, info};

/// Handle to the Skuflow SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` with default settings.
    pub async fn open(path: &str) -> Result<Self, SkuflowError> {
        Self::open_with(&StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        })
        .await
    }

    /// Open the configured database, apply PRAGMAs and run pending migrations.
    pub async fn open_with(config: &StorageConfig) -> Result<Self, SkuflowError> {
        let path = config.database_path.clone();
        if let Some(parent) = Path::new(&path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(SkuflowError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(SkuflowError::storage)?;

        let wal_mode = config.wal_mode;
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        conn.call(move |conn| -> Result<(), SkuflowError> {
            apply_pragmas(conn, wal_mode, busy_timeout).map_err(SkuflowError::storage)?;
            crate::migrations::run_migrations(conn)
        })
        .await
        .map_err(|e| match e {
            tokio_rusqlite::Error::Error(inner) => inner,
            other => SkuflowError::storage(other.to_string()),
        })?;

        info!(path = %path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The single writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), SkuflowError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(SkuflowError::storage)?;
        debug!("database closed");
        Ok(())
    }
}

fn apply_pragmas(
    conn: &rusqlite::Connection,
    wal_mode: bool,
    busy_timeout: Duration,
) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    if wal_mode {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "journal mode set");
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Convert a tokio-rusqlite error into a storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SkuflowError {
    SkuflowError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema_and_parent_dirs() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("skuflow.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        assert!(db_path.exists());

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                     AND name NOT LIKE 'refinery_%' ORDER BY name",
                )?;
                stmt.query_map([], |row| row.get(0))?.collect()
            })
            .await
            .unwrap();
        assert_eq!(
            tables,
            vec![
                "archived_inventory",
                "archived_inventory_events",
                "archived_inventory_matches",
                "inventory",
                "inventory_events",
                "inventory_matches",
                "queue_items",
                "sku_catalog",
            ]
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn pragmas_are_applied() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("pragmas.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let (mode, fk): (String, i64) = db
            .connection()
            .call(|conn| -> Result<(String, i64), rusqlite::Error> {
                let mode = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
                let fk = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
                Ok((mode, fk))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert_eq!(fk, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reopen.db");
        let path = db_path.to_str().unwrap();
        Database::open(path).await.unwrap().close().await.unwrap();
        Database::open(path).await.unwrap().close().await.unwrap();
    }
}
