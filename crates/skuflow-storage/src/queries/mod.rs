// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the storage entities.

pub mod archive;
pub mod catalog;
pub mod inventory;
pub mod queue;

#[cfg(test)]
pub(crate) mod test_support {
    use skuflow_core::types::{Condition, DeviceRecord, MatchMethod, MatchResult, Tristate};
    use tempfile::TempDir;

    use crate::database::Database;

    pub async fn setup_db() -> (Database, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    pub fn device(imei: &str) -> DeviceRecord {
        DeviceRecord {
            imei: imei.to_string(),
            name: "Galaxy Z Fold3".into(),
            brand: "Samsung".into(),
            model: "Galaxy Z Fold3".into(),
            storage: Some("256GB".into()),
            color: Some("Black".into()),
            carrier: Some("T-Mobile".into()),
            condition: Condition::Two,
            working: Tristate::True,
            location: Some("A-01".into()),
            notes: None,
        }
    }

    pub fn matched(sku: &str) -> MatchResult {
        MatchResult {
            sku_code: Some(sku.to_string()),
            score: 0.875,
            method: MatchMethod::UnlockedFallback,
            notes: "unlocked".into(),
        }
    }
}
