// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared catalog and payload fixtures.

use serde_json::{json, Value};
use skuflow_core::types::SkuCatalogEntry;

/// A catalog entry for a Samsung Galaxy Z Fold3, 256GB, Black.
pub fn fold3_entry(sku_code: &str, carrier: &str, is_unlocked: bool) -> SkuCatalogEntry {
    SkuCatalogEntry {
        sku_code: sku_code.to_string(),
        brand: "Samsung".into(),
        model: "Galaxy Z Fold3".into(),
        carrier: Some(carrier.to_string()),
        storage: Some("256GB".into()),
        color: Some("Black".into()),
        post_fix: None,
        is_unlocked,
        is_active: true,
        source_tab: Some("Samsung".into()),
    }
}

/// Two Fold3 SKUs: an AT&T one and an unlocked one.
pub fn fold3_catalog() -> Vec<SkuCatalogEntry> {
    vec![
        fold3_entry("FOLD3-256-BLK-ATT", "AT&T", false),
        fold3_entry("FOLD3-256-BLK-UNLOCKED", "Unlocked", true),
    ]
}

/// An inspection payload for a T-Mobile Fold3, using canonical key names.
pub fn fold3_payload(imei: &str) -> Value {
    json!({
        "imei": imei,
        "name": "Galaxy Z Fold3",
        "brand": "Samsung",
        "model": "Galaxy Z Fold3",
        "storage": "256GB",
        "color": "Black",
        "carrier": "T-Mobile",
        "condition": "2",
        "working": "pass",
    })
}

/// The same device described with alternate vendor key names.
pub fn fold3_payload_aliased(imei: &str) -> Value {
    json!({
        "serialNumber": imei,
        "deviceName": "Galaxy Z Fold3",
        "manufacturer": "Samsung",
        "modelName": "Galaxy Z Fold3",
        "capacity": "256 GB",
        "colour": "black",
        "network": "TMO",
        "grade": "two",
        "functional": true,
    })
}

/// `payload` with `field` removed.
pub fn without(mut payload: Value, field: &str) -> Value {
    if let Some(map) = payload.as_object_mut() {
        map.remove(field);
    }
    payload
}
