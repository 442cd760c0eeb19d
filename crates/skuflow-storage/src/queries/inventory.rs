// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upsert-by-IMEI inventory writes and reads.

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use skuflow_core::types::{
    Condition, DeviceRecord, IngestReceipt, InventoryEventKind, InventoryRecord, MatchResult,
    QueueItemId,
};
use skuflow_core::SkuflowError;

use crate::database::Database;
use crate::models::parse_column;

pub(crate) const INVENTORY_COLUMNS: &str = "imei, name, brand, model, storage, color, carrier, \
     condition, working, location, notes, sku_code, match_score, match_method, quantity, \
     created_at, updated_at";

/// Decode an inventory row selected with [`INVENTORY_COLUMNS`] starting at `offset`.
pub(crate) fn inventory_from_row(
    row: &rusqlite::Row<'_>,
    offset: usize,
) -> rusqlite::Result<InventoryRecord> {
    let condition: String = row.get(offset + 7)?;
    Ok(InventoryRecord {
        imei: row.get(offset)?,
        name: row.get(offset + 1)?,
        brand: row.get(offset + 2)?,
        model: row.get(offset + 3)?,
        storage: row.get(offset + 4)?,
        color: row.get(offset + 5)?,
        carrier: row.get(offset + 6)?,
        condition: Condition::parse(&condition),
        working: parse_column(row, offset + 8)?,
        location: row.get(offset + 9)?,
        notes: row.get(offset + 10)?,
        sku_code: row.get(offset + 11)?,
        match_score: row.get(offset + 12)?,
        match_method: parse_column(row, offset + 13)?,
        quantity: row.get(offset + 14)?,
        created_at: row.get(offset + 15)?,
        updated_at: row.get(offset + 16)?,
    })
}

/// Failure inside the ingestion transaction.
#[derive(Debug, thiserror::Error)]
enum IngestTxError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("queue item is not processing")]
    ClaimLost,
}

/// Apply one successful ingestion atomically.
///
/// Inserts the IMEI with quantity 1 or bumps the existing row's quantity and
/// refreshes its attributes, appends the match and audit rows, and marks the
/// queue item `completed`. Nothing is written unless the item is still
/// `processing`.
pub async fn record_ingestion(
    db: &Database,
    id: QueueItemId,
    device: &DeviceRecord,
    result: &MatchResult,
) -> Result<IngestReceipt, SkuflowError> {
    let device = device.clone();
    let result = result.clone();
    db.connection()
        .call(move |conn| -> Result<IngestReceipt, IngestTxError> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let status: Option<String> = tx
                .query_row(
                    "SELECT status FROM queue_items WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            if status.as_deref() != Some("processing") {
                return Err(IngestTxError::ClaimLost);
            }

            let existing: Option<u32> = tx
                .query_row(
                    "SELECT quantity FROM inventory WHERE imei = ?1",
                    params![device.imei],
                    |row| row.get(0),
                )
                .optional()?;

            let method = result.method.to_string();
            let (quantity, event) = match existing {
                None => {
                    tx.execute(
                        "INSERT INTO inventory (imei, name, brand, model, storage, color, carrier,
                         condition, working, location, notes, sku_code, match_score, match_method)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                        params![
                            device.imei,
                            device.name,
                            device.brand,
                            device.model,
                            device.storage,
                            device.color,
                            device.carrier,
                            device.condition.as_str(),
                            device.working.to_string(),
                            device.location,
                            device.notes,
                            result.sku_code,
                            result.score,
                            method,
                        ],
                    )?;
                    (1, InventoryEventKind::Created)
                }
                Some(previous) => {
                    // Absent optional attributes keep their stored value; a
                    // null SKU never overwrites an earlier match.
                    tx.execute(
                        "UPDATE inventory SET name = ?2, brand = ?3, model = ?4,
                         storage = COALESCE(?5, storage),
                         color = COALESCE(?6, color),
                         carrier = COALESCE(?7, carrier),
                         condition = CASE WHEN ?8 = 'UNKNOWN' THEN condition ELSE ?8 END,
                         working = CASE WHEN ?9 = 'unknown' THEN working ELSE ?9 END,
                         location = COALESCE(?10, location),
                         notes = COALESCE(?11, notes),
                         match_score = CASE WHEN ?12 IS NOT NULL OR sku_code IS NULL
                                       THEN ?13 ELSE match_score END,
                         match_method = CASE WHEN ?12 IS NOT NULL OR sku_code IS NULL
                                        THEN ?14 ELSE match_method END,
                         sku_code = COALESCE(?12, sku_code),
                         quantity = quantity + 1,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE imei = ?1",
                        params![
                            device.imei,
                            device.name,
                            device.brand,
                            device.model,
                            device.storage,
                            device.color,
                            device.carrier,
                            device.condition.as_str(),
                            device.working.to_string(),
                            device.location,
                            device.notes,
                            result.sku_code,
                            result.score,
                            method,
                        ],
                    )?;
                    (previous + 1, InventoryEventKind::Updated)
                }
            };

            tx.execute(
                "INSERT INTO inventory_matches (imei, queue_item_id, sku_code, score, method, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![device.imei, id, result.sku_code, result.score, method, result.notes],
            )?;
            tx.execute(
                "INSERT INTO inventory_events (imei, queue_item_id, event, quantity)
                 VALUES (?1, ?2, ?3, ?4)",
                params![device.imei, id, event.to_string(), quantity],
            )?;

            let changed = tx.execute(
                "UPDATE queue_items SET status = 'completed', error_kind = NULL, error_message = NULL,
                 processed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'processing'",
                params![id],
            )?;
            if changed != 1 {
                return Err(IngestTxError::ClaimLost);
            }

            tx.commit()?;
            Ok(IngestReceipt {
                imei: device.imei,
                quantity,
                created: event == InventoryEventKind::Created,
            })
        })
        .await
        .map_err(|e| match e {
            tokio_rusqlite::Error::Error(IngestTxError::ClaimLost) => SkuflowError::ClaimLost { id },
            tokio_rusqlite::Error::Error(IngestTxError::Sqlite(err)) => SkuflowError::storage(err),
            other => SkuflowError::storage(other.to_string()),
        })
}

pub async fn get_inventory(
    db: &Database,
    imei: &str,
) -> Result<Option<InventoryRecord>, SkuflowError> {
    let imei = imei.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {INVENTORY_COLUMNS} FROM inventory WHERE imei = ?1"),
                params![imei],
                |row| inventory_from_row(row, 0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
