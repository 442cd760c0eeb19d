// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-phase archival: copy canonical rows into the archive tables walking
//! the cascade plan forwards, then delete them walking it backwards.
//!
//! Each archival of an IMEI is one archive generation identified by the
//! `archive_id` of its `archived_inventory` row; dependent archive rows carry
//! the same id. Restore always brings back the most recent generation.

use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use skuflow_core::types::{
    ArchiveReport, ArchiveStats, ArchivedInventory, CanonicalTable, RestoreReport, TableCounts,
};
use skuflow_core::SkuflowError;

use crate::database::{map_tr_err, Database};
use crate::queries::inventory::{inventory_from_row, INVENTORY_COLUMNS};

const MATCH_COLUMNS: &str = "id, imei, queue_item_id, sku_code, score, method, notes, matched_at";
const EVENT_COLUMNS: &str = "id, imei, queue_item_id, event, quantity, recorded_at";

fn columns(table: CanonicalTable) -> &'static str {
    match table {
        CanonicalTable::Inventory => INVENTORY_COLUMNS,
        CanonicalTable::InventoryMatches => MATCH_COLUMNS,
        CanonicalTable::InventoryEvents => EVENT_COLUMNS,
    }
}

/// Failure inside an archival transaction.
#[derive(Debug, thiserror::Error)]
enum ArchiveTxError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("archiving IMEI {imei} failed: {source}")]
    Imei {
        imei: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("IMEI {0} already exists in inventory")]
    Conflict(String),
}

fn map_archive_err(e: tokio_rusqlite::Error<ArchiveTxError>) -> SkuflowError {
    match e {
        tokio_rusqlite::Error::Error(ArchiveTxError::Imei { imei, source }) => {
            SkuflowError::ArchiveAborted {
                imei,
                source: Box::new(source),
            }
        }
        tokio_rusqlite::Error::Error(ArchiveTxError::Conflict(imei)) => {
            SkuflowError::RestoreConflict { imei }
        }
        tokio_rusqlite::Error::Error(ArchiveTxError::Sqlite(err)) => SkuflowError::storage(err),
        other => SkuflowError::storage(other.to_string()),
    }
}

/// Copy then delete every canonical row for `imei`. `None` if the IMEI has
/// no inventory row.
fn archive_one(
    tx: &Transaction<'_>,
    plan: &[CanonicalTable],
    imei: &str,
    reason: &str,
) -> rusqlite::Result<Option<TableCounts>> {
    let exists: bool = tx.query_row(
        "SELECT EXISTS (SELECT 1 FROM inventory WHERE imei = ?1)",
        params![imei],
        |row| row.get(0),
    )?;
    if !exists {
        return Ok(None);
    }

    let archived_at: String =
        tx.query_row("SELECT strftime('%Y-%m-%dT%H:%M:%fZ', 'now')", [], |row| row.get(0))?;
    let mut archive_id: Option<i64> = None;
    let mut rows = TableCounts::default();

    for &table in plan {
        let cols = columns(table);
        let copied = match table {
            CanonicalTable::Inventory => {
                let n = tx.execute(
                    &format!(
                        "INSERT INTO {archive} ({cols}, archived_at, archived_reason)
                         SELECT {cols}, ?2, ?3 FROM {canonical} WHERE imei = ?1",
                        archive = table.archive_table_name(),
                        canonical = table.table_name(),
                    ),
                    params![imei, archived_at, reason],
                )?;
                archive_id = Some(tx.last_insert_rowid());
                n
            }
            _ => tx.execute(
                &format!(
                    "INSERT INTO {archive} ({cols}, archive_id, archived_at, archived_reason)
                     SELECT {cols}, ?2, ?3, ?4 FROM {canonical} WHERE imei = ?1",
                    archive = table.archive_table_name(),
                    canonical = table.table_name(),
                ),
                params![imei, archive_id, archived_at, reason],
            )?,
        };
        rows.add(table, copied as u64);
    }

    for &table in plan.iter().rev() {
        tx.execute(
            &format!("DELETE FROM {} WHERE imei = ?1", table.table_name()),
            params![imei],
        )?;
    }

    Ok(Some(rows))
}

/// Archive each IMEI in order inside the caller's transaction. Stops at the
/// first failure, naming the IMEI.
fn archive_all_of(
    tx: &Transaction<'_>,
    plan: &[CanonicalTable],
    imeis: &[String],
    reason: &str,
) -> Result<ArchiveReport, ArchiveTxError> {
    let mut report = ArchiveReport::default();
    for imei in imeis {
        if report.archived.contains(imei) || report.not_found.contains(imei) {
            continue;
        }
        match archive_one(tx, plan, imei, reason) {
            Ok(Some(rows)) => {
                report.rows.merge(&rows);
                report.archived.push(imei.clone());
            }
            Ok(None) => report.not_found.push(imei.clone()),
            Err(source) => {
                return Err(ArchiveTxError::Imei {
                    imei: imei.clone(),
                    source,
                });
            }
        }
    }
    Ok(report)
}

/// Archive and delete the given IMEIs in one all-or-nothing transaction.
pub async fn archive_imeis(
    db: &Database,
    plan: &[CanonicalTable],
    imeis: &[String],
    reason: &str,
) -> Result<ArchiveReport, SkuflowError> {
    CanonicalTable::validate_plan(plan)?;
    let plan = plan.to_vec();
    let imeis = imeis.to_vec();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let report = archive_all_of(&tx, &plan, &imeis, &reason)?;
            tx.commit()?;
            Ok(report)
        })
        .await
        .map_err(map_archive_err)
}

/// Archive and delete every canonical inventory row.
pub async fn archive_everything(
    db: &Database,
    plan: &[CanonicalTable],
    reason: &str,
) -> Result<ArchiveReport, SkuflowError> {
    CanonicalTable::validate_plan(plan)?;
    let plan = plan.to_vec();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let imeis: Vec<String> = {
                let mut stmt = tx.prepare("SELECT imei FROM inventory ORDER BY imei")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            let report = archive_all_of(&tx, &plan, &imeis, &reason)?;
            tx.commit()?;
            Ok(report)
        })
        .await
        .map_err(map_archive_err)
}

/// Restore the latest archive generation of `imei`.
///
/// Older generations stay in the archive tables and keep counting in
/// [`archive_stats`]; restoring one would collide with the restored IMEI.
pub async fn restore_imei(
    db: &Database,
    plan: &[CanonicalTable],
    imei: &str,
) -> Result<RestoreReport, SkuflowError> {
    CanonicalTable::validate_plan(plan)?;
    let plan = plan.to_vec();
    let imei = imei.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS (SELECT 1 FROM inventory WHERE imei = ?1)",
                params![imei],
                |row| row.get(0),
            )?;
            if exists {
                return Err(ArchiveTxError::Conflict(imei));
            }

            let archive_id: Option<i64> = tx.query_row(
                "SELECT MAX(archive_id) FROM archived_inventory WHERE imei = ?1",
                params![imei],
                |row| row.get(0),
            )?;
            let mut rows = TableCounts::default();
            let Some(archive_id) = archive_id else {
                return Ok(RestoreReport { imei, rows });
            };

            for &table in &plan {
                let cols = columns(table);
                let restored = tx.execute(
                    &format!(
                        "INSERT INTO {canonical} ({cols}) SELECT {cols} FROM {archive}
                         WHERE archive_id = ?1",
                        canonical = table.table_name(),
                        archive = table.archive_table_name(),
                    ),
                    params![archive_id],
                )?;
                rows.add(table, restored as u64);
            }
            for &table in plan.iter().rev() {
                tx.execute(
                    &format!("DELETE FROM {} WHERE archive_id = ?1", table.archive_table_name()),
                    params![archive_id],
                )?;
            }

            tx.commit()?;
            Ok(RestoreReport { imei, rows })
        })
        .await
        .map_err(map_archive_err)
}

/// The most recently archived inventory row for `imei`.
pub async fn get_archived(
    db: &Database,
    imei: &str,
) -> Result<Option<ArchivedInventory>, SkuflowError> {
    let imei = imei.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {INVENTORY_COLUMNS}, archived_at, archived_reason
                     FROM archived_inventory WHERE imei = ?1
                     ORDER BY archive_id DESC LIMIT 1"
                ),
                params![imei],
                |row| {
                    Ok(ArchivedInventory {
                        record: inventory_from_row(row, 0)?,
                        archived_at: row.get(17)?,
                        archived_reason: row.get(18)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn archive_stats(db: &Database) -> Result<ArchiveStats, SkuflowError> {
    db.connection()
        .call(|conn| {
            let mut stats = ArchiveStats::default();
            for table in CanonicalTable::CASCADE_ORDER {
                let canonical: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM {}", table.table_name()),
                    [],
                    |row| row.get(0),
                )?;
                let archived: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM {}", table.archive_table_name()),
                    [],
                    |row| row.get(0),
                )?;
                stats.canonical.add(table, canonical as u64);
                stats.archived.add(table, archived as u64);
            }
            Ok(stats)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::inventory::{get_inventory, record_ingestion};
    use crate::queries::queue::{claim_batch, enqueue_many};
    use crate::queries::test_support::{device, matched, setup_db};

    const PLAN: &[CanonicalTable] = &CanonicalTable::CASCADE_ORDER;

    async fn ingest(db: &Database, imei: &str) {
        enqueue_many(db, vec!["{}".into()]).await.unwrap();
        let item = claim_batch(db, "w", 1).await.unwrap().remove(0);
        record_ingestion(db, item.id, &device(imei), &matched("SKU-A"))
            .await
            .unwrap();
    }

    fn imeis(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn archive_moves_parent_and_children() {
        let (db, _dir) = setup_db().await;
        ingest(&db, "111").await;
        ingest(&db, "111").await;
        ingest(&db, "222").await;

        let report = archive_imeis(&db, PLAN, &imeis(&["111"]), "sold").await.unwrap();
        assert_eq!(report.archived, vec!["111"]);
        assert_eq!(
            report.rows,
            TableCounts {
                inventory: 1,
                inventory_matches: 2,
                inventory_events: 2,
            }
        );
        assert_eq!(report.archived_rows(), 5);
        assert!(get_inventory(&db, "111").await.unwrap().is_none());
        assert!(get_inventory(&db, "222").await.unwrap().is_some());

        let archived = get_archived(&db, "111").await.unwrap().unwrap();
        assert_eq!(archived.archived_reason, "sold");
        assert_eq!(archived.record.quantity, 2);

        let stats = archive_stats(&db).await.unwrap();
        assert_eq!(stats.archived.total(), 5);
        assert_eq!(stats.canonical.inventory, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_imei_is_a_no_op() {
        let (db, _dir) = setup_db().await;
        let report = archive_imeis(&db, PLAN, &imeis(&["999"]), "x").await.unwrap();
        assert!(report.archived.is_empty());
        assert_eq!(report.not_found, vec!["999"]);
        assert_eq!(report.archived_rows(), 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn archive_then_restore_round_trips_exactly() {
        let (db, _dir) = setup_db().await;
        ingest(&db, "111").await;
        let before = get_inventory(&db, "111").await.unwrap().unwrap();
        let stats_before = archive_stats(&db).await.unwrap();

        archive_imeis(&db, PLAN, &imeis(&["111"]), "audit").await.unwrap();
        let restored = restore_imei(&db, PLAN, "111").await.unwrap();
        assert_eq!(restored.rows.total(), 3);

        let after = get_inventory(&db, "111").await.unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(archive_stats(&db).await.unwrap(), stats_before);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn restore_refuses_to_overwrite_live_record() {
        let (db, _dir) = setup_db().await;
        ingest(&db, "111").await;
        archive_imeis(&db, PLAN, &imeis(&["111"]), "audit").await.unwrap();
        ingest(&db, "111").await;

        let err = restore_imei(&db, PLAN, "111").await.unwrap_err();
        assert!(matches!(err, SkuflowError::RestoreConflict { ref imei } if imei == "111"));
        assert!(get_archived(&db, "111").await.unwrap().is_some());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn restoring_unarchived_imei_restores_nothing() {
        let (db, _dir) = setup_db().await;
        let report = restore_imei(&db, PLAN, "404").await.unwrap();
        assert_eq!(report.rows.total(), 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn batch_failure_rolls_back_and_names_imei() {
        let (db, _dir) = setup_db().await;
        ingest(&db, "111").await;
        ingest(&db, "222").await;

        // Plant an archive row that collides with 222's match row id.
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO archived_inventory_matches
                     (id, imei, score, method, notes, matched_at, archive_id, archived_at, archived_reason)
                     SELECT id, 'zzz', 0, 'unmatched', '', matched_at, 0, matched_at, 'planted'
                     FROM inventory_matches WHERE imei = '222'",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = archive_imeis(&db, PLAN, &imeis(&["111", "222"]), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, SkuflowError::ArchiveAborted { ref imei, .. } if imei == "222"));

        // 111 was archived first in the same transaction and must be back.
        assert!(get_inventory(&db, "111").await.unwrap().is_some());
        assert!(get_archived(&db, "111").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn archive_everything_empties_canonical_tables() {
        let (db, _dir) = setup_db().await;
        ingest(&db, "111").await;
        ingest(&db, "222").await;

        let report = archive_everything(&db, PLAN, "wipe").await.unwrap();
        assert_eq!(report.archived, vec!["111", "222"]);
        let stats = archive_stats(&db).await.unwrap();
        assert_eq!(stats.canonical.total(), 0);
        assert_eq!(stats.archived.total(), 6);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn restore_picks_latest_generation() {
        let (db, _dir) = setup_db().await;
        ingest(&db, "111").await;
        archive_imeis(&db, PLAN, &imeis(&["111"]), "first").await.unwrap();
        ingest(&db, "111").await;
        ingest(&db, "111").await;
        archive_imeis(&db, PLAN, &imeis(&["111"]), "second").await.unwrap();

        let report = restore_imei(&db, PLAN, "111").await.unwrap();
        assert_eq!(report.rows.inventory_matches, 2);
        assert_eq!(get_inventory(&db, "111").await.unwrap().unwrap().quantity, 2);
        // The older generation stays archived.
        let left = get_archived(&db, "111").await.unwrap().unwrap();
        assert_eq!(left.archived_reason, "first");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_plan_is_rejected_before_touching_rows() {
        let (db, _dir) = setup_db().await;
        ingest(&db, "111").await;
        let plan = [CanonicalTable::InventoryMatches, CanonicalTable::Inventory];
        let err = archive_imeis(&db, &plan, &imeis(&["111"]), "x").await.unwrap_err();
        assert!(matches!(err, SkuflowError::RecursionGuard { .. }));
        assert!(get_inventory(&db, "111").await.unwrap().is_some());
        db.close().await.unwrap();
    }
}
