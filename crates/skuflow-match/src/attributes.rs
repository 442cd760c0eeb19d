// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attribute canonicalization used when comparing devices with catalog entries.

const KIB: f64 = 1024.0;

/// Lowercase and drop everything but ASCII letters and digits.
///
/// `"Galaxy Z Fold 3"` and `"galaxy-z-fold3"` both become `"galaxyzfold3"`.
pub fn squash(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Canonical model key. A leading brand name is dropped so
/// `"Samsung Galaxy S21"` compares equal to `"Galaxy S21"`.
pub fn model_key(brand: &str, model: &str) -> String {
    let model = squash(model);
    let brand = squash(brand);
    match model.strip_prefix(brand.as_str()) {
        Some(rest) if !brand.is_empty() && !rest.is_empty() => rest.to_string(),
        _ => model,
    }
}

/// How closely two canonical model keys agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelAgreement {
    Exact,
    /// One key is a prefix or substring of the other.
    Partial,
    None,
}

pub fn compare_models(device: &str, candidate: &str) -> ModelAgreement {
    if device.is_empty() || candidate.is_empty() {
        return ModelAgreement::None;
    }
    if device == candidate {
        ModelAgreement::Exact
    } else if device.contains(candidate) || candidate.contains(device) {
        ModelAgreement::Partial
    } else {
        ModelAgreement::None
    }
}

/// Parse a storage capacity into bytes.
///
/// Accepts `KB`, `MB`, `GB` and `TB` (binary multiples, optional `B`,
/// any case, optional whitespace). A bare number is taken as gigabytes.
pub fn storage_bytes(raw: &str) -> Option<u64> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    let split = compact
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(compact.len());
    let (number, unit) = compact.split_at(split);
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    let exponent = match unit.trim_end_matches('B') {
        "K" => 1,
        "M" => 2,
        "" | "G" => 3,
        "T" => 4,
        _ => return None,
    };
    Some((value * KIB.powi(exponent)).round() as u64)
}

/// Whether two storage strings describe the same capacity.
pub fn same_storage(device: &str, candidate: &str) -> bool {
    match (storage_bytes(device), storage_bytes(candidate)) {
        (Some(a), Some(b)) => a == b,
        _ => {
            let (a, b) = (squash(device), squash(candidate));
            !a.is_empty() && a == b
        }
    }
}

pub fn same_color(device: &str, candidate: &str) -> bool {
    let device = device.trim();
    !device.is_empty() && device.eq_ignore_ascii_case(candidate.trim())
}

/// Canonical carrier name: common spellings collapse onto one key.
pub fn carrier_key(raw: &str) -> String {
    let squashed = squash(raw);
    let canonical = match squashed.as_str() {
        "att" | "atandt" | "attwireless" | "cingular" => "att",
        "tmobile" | "tmo" | "tmous" | "tmobileusa" => "tmobile",
        "verizon" | "vzw" | "verizonwireless" => "verizon",
        "sprint" => "sprint",
        "uscellular" | "usc" => "uscellular",
        "cricket" | "cricketwireless" => "cricket",
        "metro" | "metropcs" | "metrobytmobile" => "metropcs",
        "unlocked" | "factoryunlocked" | "simfree" | "openmarket" => "unlocked",
        _ => return squashed,
    };
    canonical.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_units_normalize_to_bytes() {
        assert_eq!(storage_bytes("256GB"), Some(256 * 1024 * 1024 * 1024));
        assert_eq!(storage_bytes("256 gb"), storage_bytes("256"));
        assert_eq!(storage_bytes("1TB"), storage_bytes("1024GB"));
        assert_eq!(storage_bytes("512 MB"), Some(512 * 1024 * 1024));
        assert_eq!(storage_bytes("64K"), Some(64 * 1024));
        assert_eq!(storage_bytes("lots"), None);
        assert_eq!(storage_bytes("0"), None);
        assert_eq!(storage_bytes("12PB"), None);
    }

    #[test]
    fn same_storage_falls_back_to_text() {
        assert!(same_storage("1 TB", "1024GB"));
        assert!(!same_storage("128GB", "256GB"));
        assert!(same_storage("N/A-x", "na x"));
        assert!(!same_storage("", ""));
    }

    #[test]
    fn carrier_aliases_collapse() {
        assert_eq!(carrier_key("AT&T"), "att");
        assert_eq!(carrier_key("ATT"), "att");
        assert_eq!(carrier_key("T-Mobile"), "tmobile");
        assert_eq!(carrier_key("TMO"), "tmobile");
        assert_eq!(carrier_key("Verizon Wireless"), "verizon");
        assert_eq!(carrier_key("VZW"), "verizon");
        assert_eq!(carrier_key("Factory Unlocked"), "unlocked");
        assert_eq!(carrier_key("Telstra"), "telstra");
    }

    #[test]
    fn model_key_drops_brand_prefix() {
        assert_eq!(model_key("Samsung", "Samsung Galaxy Z Fold3"), "galaxyzfold3");
        assert_eq!(model_key("Samsung", "Galaxy Z Fold 3"), "galaxyzfold3");
        // Never reduce a model to nothing.
        assert_eq!(model_key("Pixel", "Pixel"), "pixel");
    }

    #[test]
    fn model_comparison_tiers() {
        assert_eq!(compare_models("iphone13", "iphone13"), ModelAgreement::Exact);
        assert_eq!(compare_models("iphone13pro", "iphone13"), ModelAgreement::Partial);
        assert_eq!(compare_models("iphone13", "iphone13promax"), ModelAgreement::Partial);
        assert_eq!(compare_models("iphone12", "iphone13"), ModelAgreement::None);
        assert_eq!(compare_models("", "iphone13"), ModelAgreement::None);
    }
}
