// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intake queue state machine.
//!
//! Every transition is a conditional `UPDATE ... WHERE status = <expected>`,
//! so a row can never move backwards or be claimed twice.

use std::time::Duration;

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use skuflow_core::types::{
    FailureKind, QueueCounts, QueueFilter, QueueItem, QueueItemId, QueuePage, QueueStatus,
    StaleSweep,
};
use skuflow_core::SkuflowError;

use crate::database::{map_tr_err, Database};
use crate::models::{parse_column, parse_optional_column};

const ITEM_COLUMNS: &str = "id, raw_data, status, retry_count, error_message, error_kind, \
     claimed_by, claimed_at, created_at, updated_at, processed_at";

/// Timestamp format matching `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

fn item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueItem> {
    let raw: String = row.get(1)?;
    let raw_data = serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(QueueItem {
        id: row.get(0)?,
        raw_data,
        status: parse_column(row, 2)?,
        retry_count: row.get(3)?,
        error_message: row.get(4)?,
        error_kind: parse_optional_column(row, 5)?,
        claimed_by: row.get(6)?,
        claimed_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        processed_at: row.get(10)?,
    })
}

fn fetch_item(conn: &rusqlite::Connection, id: QueueItemId) -> rusqlite::Result<Option<QueueItem>> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM queue_items WHERE id = ?1"),
        params![id],
        item_from_row,
    )
    .optional()
}

/// Insert payloads as `pending` items in one transaction. Returns ids in input order.
pub async fn enqueue_many(
    db: &Database,
    payloads: Vec<String>,
) -> Result<Vec<QueueItemId>, SkuflowError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(payloads.len());
            {
                let mut stmt = tx.prepare("INSERT INTO queue_items (raw_data) VALUES (?1)")?;
                for payload in &payloads {
                    stmt.execute(params![payload])?;
                    ids.push(tx.last_insert_rowid());
                }
            }
            tx.commit()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

/// Claim up to `limit` of the oldest `pending` items for `worker_id`.
///
/// Runs under `BEGIN IMMEDIATE` so the select and the conditional updates
/// hold SQLite's write lock together.
pub async fn claim_batch(
    db: &Database,
    worker_id: &str,
    limit: usize,
) -> Result<Vec<QueueItem>, SkuflowError> {
    let worker_id = worker_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let candidates: Vec<QueueItemId> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM queue_items WHERE status = 'pending' ORDER BY id LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };

            let mut claimed = Vec::with_capacity(candidates.len());
            for id in candidates {
                let changed = tx.execute(
                    "UPDATE queue_items SET status = 'processing', claimed_by = ?2,
                     claimed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1 AND status = 'pending'",
                    params![id, worker_id],
                )?;
                if changed == 1
                    && let Some(item) = fetch_item(&tx, id)?
                {
                    claimed.push(item);
                }
            }
            tx.commit()?;
            Ok(claimed)
        })
        .await
        .map_err(map_tr_err)
}

/// Move a `processing` item to `failed`. Returns `ClaimLost` if it was not processing.
pub async fn mark_failed(
    db: &Database,
    id: QueueItemId,
    kind: FailureKind,
    message: &str,
    count_retry: bool,
) -> Result<(), SkuflowError> {
    let kind = kind.to_string();
    let message = message.to_string();
    let increment: i64 = if count_retry { 1 } else { 0 };
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue_items SET status = 'failed', error_kind = ?2, error_message = ?3,
                 retry_count = retry_count + ?4,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'processing'",
                params![id, kind, message, increment],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(SkuflowError::ClaimLost { id });
    }
    Ok(())
}

/// Return claims older than `older_than` to `pending` with one more retry.
/// Items whose incremented count would exceed `max_retries` become `failed`
/// with kind `stale` instead.
pub async fn requeue_stale(
    db: &Database,
    older_than: Duration,
    max_retries: u32,
) -> Result<StaleSweep, SkuflowError> {
    let age = chrono::Duration::from_std(older_than).map_err(SkuflowError::storage)?;
    let cutoff = (chrono::Utc::now() - age)
        .format(TIMESTAMP_FORMAT)
        .to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let failed: Vec<QueueItemId> = {
                let mut stmt = tx.prepare(
                    "UPDATE queue_items SET status = 'failed', error_kind = 'stale',
                     error_message = 'claim by ' || COALESCE(claimed_by, 'unknown worker')
                         || ' expired; retry limit reached',
                     retry_count = retry_count + 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE status = 'processing' AND claimed_at < ?1 AND retry_count + 1 > ?2
                     RETURNING id",
                )?;
                let rows = stmt.query_map(params![cutoff, max_retries], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            let requeued: Vec<QueueItemId> = {
                let mut stmt = tx.prepare(
                    "UPDATE queue_items SET status = 'pending', retry_count = retry_count + 1,
                     claimed_by = NULL, claimed_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE status = 'processing' AND claimed_at < ?1
                     RETURNING id",
                )?;
                let rows = stmt.query_map(params![cutoff], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            tx.commit()?;
            let mut sweep = StaleSweep { requeued, failed };
            sweep.requeued.sort_unstable();
            sweep.failed.sort_unstable();
            Ok(sweep)
        })
        .await
        .map_err(map_tr_err)
}

/// Move retryable `failed` items that have not exceeded the retry ceiling
/// back to `pending`.
pub async fn resubmit_failed(
    db: &Database,
    max_retries: u32,
) -> Result<Vec<QueueItemId>, SkuflowError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "UPDATE queue_items SET status = 'pending', error_kind = NULL,
                 error_message = NULL, claimed_by = NULL, claimed_at = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE status = 'failed' AND error_kind IN ('persistence', 'stale')
                   AND retry_count <= ?1
                 RETURNING id",
            )?;
            let rows = stmt.query_map(params![max_retries], |row| row.get(0))?;
            let mut ids: Vec<QueueItemId> = rows.collect::<Result<_, _>>()?;
            ids.sort_unstable();
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_item(db: &Database, id: QueueItemId) -> Result<Option<QueueItem>, SkuflowError> {
    db.connection()
        .call(move |conn| fetch_item(conn, id))
        .await
        .map_err(map_tr_err)
}

/// Paginated, read-only listing ordered by id.
pub async fn list_items(db: &Database, filter: &QueueFilter) -> Result<QueuePage, SkuflowError> {
    let status = filter.status.map(|s| s.to_string());
    let min_retries = filter.min_retries;
    let limit = filter.limit;
    let offset = filter.offset;
    db.connection()
        .call(move |conn| {
            let predicate = "(?1 IS NULL OR status = ?1) AND (?2 IS NULL OR retry_count >= ?2)";
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM queue_items WHERE {predicate}"),
                params![status, min_retries],
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM queue_items WHERE {predicate}
                 ORDER BY id LIMIT ?3 OFFSET ?4"
            ))?;
            let items = stmt
                .query_map(params![status, min_retries, limit, offset], item_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(QueuePage {
                items,
                total: total as u64,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn queue_counts(db: &Database) -> Result<QueueCounts, SkuflowError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM queue_items GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((parse_column::<QueueStatus>(row, 0)?, row.get::<_, i64>(1)?))
            })?;
            let mut counts = QueueCounts::default();
            for row in rows {
                let (status, n) = row?;
                counts.add(status, n as u64);
            }
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    async fn backdate_claims(db: &Database, secs: i64) {
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE queue_items SET claimed_at =
                     strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1) WHERE status = 'processing'",
                    params![format!("-{secs} seconds")],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn enqueue_and_claim_lifecycle() {
        let (db, _dir) = setup_db().await;

        let ids = enqueue_many(&db, vec![r#"{"imei":"1"}"#.into(), r#"{"imei":"2"}"#.into()])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);

        let claimed = claim_batch(&db, "w1", 10).await.unwrap();
        assert_eq!(claimed.len(), 2);
        assert_eq!(claimed[0].id, ids[0]);
        assert_eq!(claimed[0].status, QueueStatus::Processing);
        assert_eq!(claimed[0].claimed_by.as_deref(), Some("w1"));
        assert_eq!(claimed[0].raw_data["imei"], "1");

        assert!(claim_batch(&db, "w2", 10).await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn claim_respects_limit_and_age_order() {
        let (db, _dir) = setup_db().await;
        let payloads = (0..5).map(|i| format!(r#"{{"n":{i}}}"#)).collect();
        let ids = enqueue_many(&db, payloads).await.unwrap();

        let first = claim_batch(&db, "w1", 2).await.unwrap();
        let got: Vec<_> = first.iter().map(|i| i.id).collect();
        assert_eq!(got, ids[..2]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_claimers_never_share_items() {
        let (db, _dir) = setup_db().await;
        let db = std::sync::Arc::new(db);
        let payloads = (0..40).map(|i| format!(r#"{{"n":{i}}}"#)).collect();
        enqueue_many(&db, payloads).await.unwrap();

        let mut handles = Vec::new();
        for w in 0..4 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let mut mine = Vec::new();
                loop {
                    let batch = claim_batch(&db, &format!("w{w}"), 3).await.unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    mine.extend(batch.into_iter().map(|i| i.id));
                }
                mine
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let claimed = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(claimed, 40);
        assert_eq!(all.len(), 40, "an item was claimed twice");
    }

    #[tokio::test]
    async fn mark_failed_only_counts_retry_when_asked() {
        let (db, _dir) = setup_db().await;
        let ids = enqueue_many(&db, vec!["{}".into(), "{}".into()]).await.unwrap();
        claim_batch(&db, "w1", 10).await.unwrap();

        mark_failed(&db, ids[0], FailureKind::Validation, "missing brand", false)
            .await
            .unwrap();
        mark_failed(&db, ids[1], FailureKind::Persistence, "disk I/O error", true)
            .await
            .unwrap();

        let a = get_item(&db, ids[0]).await.unwrap().unwrap();
        assert_eq!(a.status, QueueStatus::Failed);
        assert_eq!(a.retry_count, 0);
        assert_eq!(a.error_kind, Some(FailureKind::Validation));
        assert_eq!(a.error_message.as_deref(), Some("missing brand"));

        let b = get_item(&db, ids[1]).await.unwrap().unwrap();
        assert_eq!(b.retry_count, 1);

        // Terminal items cannot be failed again.
        let err = mark_failed(&db, ids[0], FailureKind::Persistence, "x", true)
            .await
            .unwrap_err();
        assert!(matches!(err, SkuflowError::ClaimLost { .. }));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stale_claims_are_requeued_then_failed_at_ceiling() {
        let (db, _dir) = setup_db().await;
        let ids = enqueue_many(&db, vec!["{}".into()]).await.unwrap();
        let id = ids[0];

        for round in 1..=2u32 {
            claim_batch(&db, "crashed", 1).await.unwrap();
            // Fresh claims are left alone.
            let sweep = requeue_stale(&db, Duration::from_secs(60), 2).await.unwrap();
            assert!(sweep.requeued.is_empty());

            backdate_claims(&db, 120).await;
            let sweep = requeue_stale(&db, Duration::from_secs(60), 2).await.unwrap();
            assert_eq!(sweep.requeued, vec![id]);
            let item = get_item(&db, id).await.unwrap().unwrap();
            assert_eq!(item.status, QueueStatus::Pending);
            assert_eq!(item.retry_count, round);
            assert_eq!(item.claimed_by, None);
        }

        claim_batch(&db, "crashed", 1).await.unwrap();
        backdate_claims(&db, 120).await;
        let sweep = requeue_stale(&db, Duration::from_secs(60), 2).await.unwrap();
        assert_eq!(sweep.failed, vec![id]);
        let item = get_item(&db, id).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.error_kind, Some(FailureKind::Stale));
        assert_eq!(item.retry_count, 3);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn resubmit_skips_validation_and_exhausted_items() {
        let (db, _dir) = setup_db().await;
        let ids = enqueue_many(&db, vec!["{}".into(), "{}".into(), "{}".into()])
            .await
            .unwrap();
        claim_batch(&db, "w", 10).await.unwrap();
        mark_failed(&db, ids[0], FailureKind::Persistence, "locked", true).await.unwrap();
        mark_failed(&db, ids[1], FailureKind::Validation, "missing imei", false).await.unwrap();
        mark_failed(&db, ids[2], FailureKind::Persistence, "locked", true).await.unwrap();

        // Ceiling of 0: a single counted retry already exceeds the budget.
        assert!(resubmit_failed(&db, 0).await.unwrap().is_empty());

        // A retry count equal to the ceiling has not exceeded it.
        let resubmitted = resubmit_failed(&db, 1).await.unwrap();
        assert_eq!(resubmitted, vec![ids[0], ids[2]]);
        let item = get_item(&db, ids[0]).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.error_kind, None);
        assert_eq!(item.retry_count, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_and_count_by_status() {
        let (db, _dir) = setup_db().await;
        let payloads = (0..5).map(|i| format!(r#"{{"n":{i}}}"#)).collect();
        let ids = enqueue_many(&db, payloads).await.unwrap();
        claim_batch(&db, "w", 2).await.unwrap();
        mark_failed(&db, ids[0], FailureKind::Persistence, "boom", true).await.unwrap();

        let counts = queue_counts(&db).await.unwrap();
        assert_eq!(counts.pending, 3);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total(), 5);

        let page = list_items(
            &db,
            &QueueFilter {
                status: Some(QueueStatus::Pending),
                limit: 2,
                offset: 1,
                ..QueueFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 3);
        let got: Vec<_> = page.items.iter().map(|i| i.id).collect();
        assert_eq!(got, vec![ids[3], ids[4]]);

        let exhausted = list_items(
            &db,
            &QueueFilter {
                min_retries: Some(1),
                ..QueueFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(exhausted.total, 1);
        assert_eq!(exhausted.items[0].id, ids[0]);
        db.close().await.unwrap();
    }
}
