// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SKU catalog reads.

use rusqlite::params;
use skuflow_core::types::SkuCatalogEntry;
use skuflow_core::SkuflowError;

use crate::database::{map_tr_err, Database};

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SkuCatalogEntry> {
    Ok(SkuCatalogEntry {
        sku_code: row.get(0)?,
        brand: row.get(1)?,
        model: row.get(2)?,
        carrier: row.get(3)?,
        storage: row.get(4)?,
        color: row.get(5)?,
        post_fix: row.get(6)?,
        is_unlocked: row.get(7)?,
        is_active: row.get(8)?,
        source_tab: row.get(9)?,
    })
}

/// All active entries ordered by `sku_code`.
pub async fn active_catalog(db: &Database) -> Result<Vec<SkuCatalogEntry>, SkuflowError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT sku_code, brand, model, carrier, storage, color, post_fix,
                        is_unlocked, is_active, source_tab
                 FROM sku_catalog WHERE is_active = 1 ORDER BY sku_code",
            )?;
            let entries = stmt
                .query_map([], entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace catalog entries. The pipeline itself never calls this;
/// it exists for fixtures and for embedding applications that manage their
/// own catalog import.
pub async fn upsert_entries(
    db: &Database,
    entries: &[SkuCatalogEntry],
) -> Result<usize, SkuflowError> {
    let entries = entries.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO sku_catalog (sku_code, brand, model, carrier, storage, color,
                         post_fix, is_unlocked, is_active, source_tab)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT (sku_code) DO UPDATE SET
                         brand = excluded.brand, model = excluded.model,
                         carrier = excluded.carrier, storage = excluded.storage,
                         color = excluded.color, post_fix = excluded.post_fix,
                         is_unlocked = excluded.is_unlocked, is_active = excluded.is_active,
                         source_tab = excluded.source_tab",
                )?;
                for e in &entries {
                    stmt.execute(params![
                        e.sku_code,
                        e.brand,
                        e.model,
                        e.carrier,
                        e.storage,
                        e.color,
                        e.post_fix,
                        e.is_unlocked,
                        e.is_active,
                        e.source_tab,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(entries.len())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    fn entry(code: &str, active: bool) -> SkuCatalogEntry {
        SkuCatalogEntry {
            sku_code: code.into(),
            brand: "Samsung".into(),
            model: "Galaxy Z Fold3".into(),
            carrier: Some("AT&T".into()),
            storage: Some("256GB".into()),
            color: Some("Black".into()),
            post_fix: None,
            is_unlocked: false,
            is_active: active,
            source_tab: Some("Samsung".into()),
        }
    }

    #[tokio::test]
    async fn only_active_entries_are_returned_in_code_order() {
        let (db, _dir) = setup_db().await;
        upsert_entries(&db, &[entry("B", true), entry("A", true), entry("C", false)])
            .await
            .unwrap();

        let catalog = active_catalog(&db).await.unwrap();
        let codes: Vec<_> = catalog.iter().map(|e| e.sku_code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B"]);
        assert_eq!(catalog[0], entry("A", true));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_replaces_existing_code() {
        let (db, _dir) = setup_db().await;
        upsert_entries(&db, &[entry("A", true)]).await.unwrap();
        upsert_entries(&db, &[entry("A", false)]).await.unwrap();
        assert!(active_catalog(&db).await.unwrap().is_empty());
        db.close().await.unwrap();
    }
}
