// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw inspection payload to [`DeviceRecord`].
//!
//! Inspection stations disagree on key names, so every field is looked up
//! through a fixed alias list and the first present, non-empty value wins.
//! Strings are trimmed; numbers are rendered in plain decimal. Pure: no I/O,
//! no logging.

use serde_json::{Map, Value};
use skuflow_core::types::{Condition, DeviceRecord, Tristate};
use skuflow_core::ValidationError;

const IMEI: &[&str] = &["imei", "IMEI", "imei1", "serialNumber", "serial_number", "serial"];
const NAME: &[&str] = &["name", "deviceName", "device_name", "productName"];
const BRAND: &[&str] = &["brand", "Brand", "manufacturer", "make"];
const MODEL: &[&str] = &["model", "Model", "modelName", "model_name"];
const STORAGE: &[&str] = &["storage", "capacity", "storageCapacity", "memory"];
const COLOR: &[&str] = &["color", "colour", "Color"];
const CARRIER: &[&str] = &["carrier", "Carrier", "network", "operator"];
const CONDITION: &[&str] = &["condition", "grade", "Condition", "cosmeticGrade"];
const WORKING: &[&str] = &["working", "isWorking", "functional", "passed"];
const LOCATION: &[&str] = &["location", "warehouse", "bin"];
const NOTES: &[&str] = &["notes", "comments", "remarks"];

/// Project a raw payload onto the canonical device fields.
///
/// Fails when the payload is not an object, or when any of `imei`, `name`,
/// `brand`, `model` is absent; the error lists every missing field.
pub fn normalize(raw: &Value) -> Result<DeviceRecord, ValidationError> {
    let map = raw
        .as_object()
        .ok_or_else(|| ValidationError::NotAnObject(json_type(raw)))?;

    let imei = text(map, IMEI);
    let name = text(map, NAME);
    let brand = text(map, BRAND);
    let model = text(map, MODEL);

    let missing: Vec<&'static str> = [
        ("imei", imei.is_none()),
        ("name", name.is_none()),
        ("brand", brand.is_none()),
        ("model", model.is_none()),
    ]
    .into_iter()
    .filter_map(|(field, absent)| absent.then_some(field))
    .collect();

    let (Some(imei), Some(name), Some(brand), Some(model)) = (imei, name, brand, model) else {
        return Err(ValidationError::MissingFields(missing));
    };

    Ok(DeviceRecord {
        imei,
        name,
        brand,
        model,
        storage: text(map, STORAGE),
        color: text(map, COLOR),
        carrier: text(map, CARRIER),
        condition: text(map, CONDITION)
            .map(|raw| Condition::parse(&raw))
            .unwrap_or_default(),
        working: working(map),
        location: text(map, LOCATION),
        notes: text(map, NOTES),
    })
}

/// Parse a tri-state inspection result. Case-insensitive.
pub fn tristate(value: &Value) -> Tristate {
    match value {
        Value::Bool(b) => Tristate::from(*b),
        Value::Number(n) => Tristate::from(n.as_f64() == Some(1.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "pass" | "passed" => Tristate::True,
            "false" | "no" | "fail" | "failed" => Tristate::False,
            _ => Tristate::Unknown,
        },
        _ => Tristate::Unknown,
    }
}

/// First alias holding a non-empty string or a number.
fn text(map: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(plain_number(n)),
        _ => None,
    }
}

/// Decimal rendering without exponent. IMEIs sent as JSON numbers keep every digit.
fn plain_number(n: &serde_json::Number) -> String {
    if let Some(u) = n.as_u64() {
        u.to_string()
    } else if let Some(i) = n.as_i64() {
        i.to_string()
    } else {
        // f64's Display never uses scientific notation.
        n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
    }
}

fn working(map: &Map<String, Value>) -> Tristate {
    WORKING
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
        .map(tristate)
        .unwrap_or_default()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
