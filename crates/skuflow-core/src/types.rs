// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the intake pipeline.
//!
//! Timestamps are ISO 8601 UTC strings with millisecond precision
//! (`2026-01-01T00:00:00.000Z`), the same shape SQLite's
//! `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` produces, so they compare
//! lexicographically.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of a persisted queue row.
pub type QueueItemId = i64;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

// --- Queue ---

/// Processing state of a queue item.
///
/// Transitions only move forward: `Pending -> Processing -> {Completed, Failed}`.
/// The stale sweep and explicit re-submission are the only ways back to `Pending`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 4] = [
        QueueStatus::Pending,
        QueueStatus::Processing,
        QueueStatus::Completed,
        QueueStatus::Failed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Failed)
    }
}

/// Why a queue item ended up `failed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Mandatory device fields missing.
    Validation,
    /// Catalog inconsistency the matcher refused to resolve.
    Ambiguous,
    /// Database write failed.
    Persistence,
    /// Claim expired too many times.
    Stale,
}

impl FailureKind {
    /// Only transient failures are eligible for re-submission.
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Persistence | FailureKind::Stale)
    }
}

/// A persisted intake queue row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    /// The raw inspection payload, keys vary by source.
    pub raw_data: serde_json::Value,
    pub status: QueueStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub error_kind: Option<FailureKind>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub processed_at: Option<String>,
}

/// Result of submitting payloads to the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueReceipt {
    /// Generated ids, one per accepted payload, in submission order.
    pub ids: Vec<QueueItemId>,
    /// Number of malformed payloads that were not enqueued.
    pub rejected: usize,
}

/// Filter for read-only queue inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFilter {
    pub status: Option<QueueStatus>,
    /// Only items with at least this many retries (used to surface exhausted items).
    pub min_retries: Option<u32>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for QueueFilter {
    fn default() -> Self {
        Self {
            status: None,
            min_retries: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// One page of queue items plus the total matching the filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueuePage {
    pub items: Vec<QueueItem>,
    pub total: u64,
}

/// Item counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl QueueCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }

    pub fn get(&self, status: QueueStatus) -> u64 {
        match status {
            QueueStatus::Pending => self.pending,
            QueueStatus::Processing => self.processing,
            QueueStatus::Completed => self.completed,
            QueueStatus::Failed => self.failed,
        }
    }

    pub fn add(&mut self, status: QueueStatus, n: u64) {
        match status {
            QueueStatus::Pending => self.pending += n,
            QueueStatus::Processing => self.processing += n,
            QueueStatus::Completed => self.completed += n,
            QueueStatus::Failed => self.failed += n,
        }
    }
}

/// Outcome of a stale-claim sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleSweep {
    /// Items returned to `pending`.
    pub requeued: Vec<QueueItemId>,
    /// Items whose retry budget ran out while stuck, now `failed`.
    pub failed: Vec<QueueItemId>,
}

// --- Device ---

/// A boolean-like inspection result that may be unknown.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Tristate {
    True,
    False,
    #[default]
    Unknown,
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value { Tristate::True } else { Tristate::False }
    }
}

/// Cosmetic/functional grade of a device.
///
/// Unrecognized grades are kept verbatim (uppercased) in [`Condition::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Condition {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    New,
    Used,
    Refurbished,
    Damaged,
    #[default]
    Unknown,
    Other(String),
}

impl Condition {
    /// Map a raw grade string to a condition.
    ///
    /// Digits `1`-`7` and the words `one`-`seven` map to the ordinals; empty
    /// input is `Unknown`; anything unrecognized passes through uppercased.
    pub fn parse(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        match upper.as_str() {
            "" | "UNKNOWN" => Condition::Unknown,
            "1" | "ONE" => Condition::One,
            "2" | "TWO" => Condition::Two,
            "3" | "THREE" => Condition::Three,
            "4" | "FOUR" => Condition::Four,
            "5" | "FIVE" => Condition::Five,
            "6" | "SIX" => Condition::Six,
            "7" | "SEVEN" => Condition::Seven,
            "NEW" => Condition::New,
            "USED" => Condition::Used,
            "REFURBISHED" => Condition::Refurbished,
            "DAMAGED" => Condition::Damaged,
            _ => Condition::Other(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Condition::One => "ONE",
            Condition::Two => "TWO",
            Condition::Three => "THREE",
            Condition::Four => "FOUR",
            Condition::Five => "FIVE",
            Condition::Six => "SIX",
            Condition::Seven => "SEVEN",
            Condition::New => "NEW",
            Condition::Used => "USED",
            Condition::Refurbished => "REFURBISHED",
            Condition::Damaged => "DAMAGED",
            Condition::Unknown => "UNKNOWN",
            Condition::Other(s) => s,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Condition {
    fn from(value: String) -> Self {
        Condition::parse(&value)
    }
}

impl From<Condition> for String {
    fn from(value: Condition) -> Self {
        value.as_str().to_string()
    }
}

/// Canonical projection of a raw inspection payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub imei: String,
    pub name: String,
    pub brand: String,
    pub model: String,
    pub storage: Option<String>,
    pub color: Option<String>,
    pub carrier: Option<String>,
    pub condition: Condition,
    pub working: Tristate,
    pub location: Option<String>,
    pub notes: Option<String>,
}

// --- Catalog & matching ---

/// A sellable configuration in the SKU catalog. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuCatalogEntry {
    pub sku_code: String,
    pub brand: String,
    pub model: String,
    pub carrier: Option<String>,
    pub storage: Option<String>,
    pub color: Option<String>,
    /// Grade/condition suffix appended to the code, e.g. `VG` in `X-VG`.
    pub post_fix: Option<String>,
    pub is_unlocked: bool,
    pub is_active: bool,
    /// Which catalog sheet/tab the entry came from.
    pub source_tab: Option<String>,
}

impl SkuCatalogEntry {
    /// The SKU code with its grade suffix removed.
    pub fn base_code(&self) -> &str {
        let Some(post_fix) = self.post_fix.as_deref().map(str::trim) else {
            return &self.sku_code;
        };
        if post_fix.is_empty() {
            return &self.sku_code;
        }
        let post_fix = post_fix.trim_start_matches('-');
        let code = self.sku_code.as_str();
        if code.len() > post_fix.len() + 1 {
            let split = code.len() - post_fix.len();
            if code.is_char_boundary(split)
                && code[split..].eq_ignore_ascii_case(post_fix)
                && code[..split].ends_with('-')
            {
                return &code[..split - 1];
            }
        }
        code
    }
}

/// Which tier of the matching algorithm produced a result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    UnlockedFallback,
    CarrierMismatchFallback,
    Unmatched,
}

/// Outcome of matching one device against a catalog snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub sku_code: Option<String>,
    /// Weighted score in `[0.0, 1.0]`.
    pub score: f64,
    pub method: MatchMethod,
    /// Human-readable rationale.
    pub notes: String,
}

impl MatchResult {
    pub fn unmatched(score: f64, notes: impl Into<String>) -> Self {
        Self {
            sku_code: None,
            score,
            method: MatchMethod::Unmatched,
            notes: notes.into(),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.sku_code.is_some()
    }

    /// The matched SKU, or a soft [`NoMatchFound`](crate::SkuflowError::NoMatchFound).
    pub fn require_sku(&self, imei: &str) -> Result<&str, crate::SkuflowError> {
        self.sku_code
            .as_deref()
            .ok_or_else(|| crate::SkuflowError::NoMatchFound {
                imei: imei.to_string(),
                notes: self.notes.clone(),
            })
    }
}

// --- Inventory ---

/// The canonical inventory row for one IMEI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub imei: String,
    pub name: String,
    pub brand: String,
    pub model: String,
    pub storage: Option<String>,
    pub color: Option<String>,
    pub carrier: Option<String>,
    pub condition: Condition,
    pub working: Tristate,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub sku_code: Option<String>,
    pub match_score: f64,
    pub match_method: MatchMethod,
    pub quantity: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// What a successful ingestion did to the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub imei: String,
    /// Quantity after this ingestion.
    pub quantity: u32,
    /// `true` when the IMEI was new.
    pub created: bool,
}

/// Audit event kinds written alongside inventory mutations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InventoryEventKind {
    Created,
    Updated,
}

// --- Archive ---

/// Canonical tables that participate in archival, in parent-first order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CanonicalTable {
    Inventory,
    InventoryMatches,
    InventoryEvents,
}

impl CanonicalTable {
    /// Parent-first order: archive copy and restore walk it forwards, cascade
    /// delete walks it backwards.
    pub const CASCADE_ORDER: [CanonicalTable; 3] = [
        CanonicalTable::Inventory,
        CanonicalTable::InventoryMatches,
        CanonicalTable::InventoryEvents,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            CanonicalTable::Inventory => "inventory",
            CanonicalTable::InventoryMatches => "inventory_matches",
            CanonicalTable::InventoryEvents => "inventory_events",
        }
    }

    pub fn archive_table_name(self) -> &'static str {
        match self {
            CanonicalTable::Inventory => "archived_inventory",
            CanonicalTable::InventoryMatches => "archived_inventory_matches",
            CanonicalTable::InventoryEvents => "archived_inventory_events",
        }
    }

    /// Check that `plan` visits every table exactly once with parents before
    /// their children. Anything else would recurse or orphan rows.
    pub fn validate_plan(plan: &[CanonicalTable]) -> Result<(), crate::SkuflowError> {
        let mut seen: Vec<CanonicalTable> = Vec::with_capacity(plan.len());
        for &table in plan {
            if seen.contains(&table) {
                return Err(crate::SkuflowError::RecursionGuard {
                    table: table.to_string(),
                    detail: "table visited twice in cascade plan".into(),
                });
            }
            if let Some(parent) = table.parent()
                && !seen.contains(&parent)
            {
                return Err(crate::SkuflowError::RecursionGuard {
                    table: table.to_string(),
                    detail: format!("child visited before its parent `{parent}`"),
                });
            }
            seen.push(table);
        }
        if let Some(missing) = Self::CASCADE_ORDER.iter().find(|t| !seen.contains(t)) {
            return Err(crate::SkuflowError::RecursionGuard {
                table: missing.to_string(),
                detail: "table missing from cascade plan".into(),
            });
        }
        Ok(())
    }

    /// The table whose `imei` this table references, if any.
    pub fn parent(self) -> Option<CanonicalTable> {
        match self {
            CanonicalTable::Inventory => None,
            CanonicalTable::InventoryMatches | CanonicalTable::InventoryEvents => {
                Some(CanonicalTable::Inventory)
            }
        }
    }
}

/// Row counts per canonical (or archive) table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    pub inventory: u64,
    pub inventory_matches: u64,
    pub inventory_events: u64,
}

impl TableCounts {
    pub fn total(&self) -> u64 {
        self.inventory + self.inventory_matches + self.inventory_events
    }

    pub fn get(&self, table: CanonicalTable) -> u64 {
        match table {
            CanonicalTable::Inventory => self.inventory,
            CanonicalTable::InventoryMatches => self.inventory_matches,
            CanonicalTable::InventoryEvents => self.inventory_events,
        }
    }

    pub fn add(&mut self, table: CanonicalTable, n: u64) {
        match table {
            CanonicalTable::Inventory => self.inventory += n,
            CanonicalTable::InventoryMatches => self.inventory_matches += n,
            CanonicalTable::InventoryEvents => self.inventory_events += n,
        }
    }

    pub fn merge(&mut self, other: &TableCounts) {
        for table in CanonicalTable::CASCADE_ORDER {
            self.add(table, other.get(table));
        }
    }
}

/// Result of an archive-then-delete run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReport {
    /// IMEIs whose rows were archived and deleted.
    pub archived: Vec<String>,
    /// Requested IMEIs with no canonical record (no-op).
    pub not_found: Vec<String>,
    /// Rows archived per table.
    pub rows: TableCounts,
}

impl ArchiveReport {
    pub fn archived_rows(&self) -> u64 {
        self.rows.total()
    }
}

/// Result of restoring one IMEI from the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub imei: String,
    /// Rows restored per table. All zero when the IMEI was not archived.
    pub rows: TableCounts,
}

/// An archived inventory row: the canonical record plus archival metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedInventory {
    pub record: InventoryRecord,
    pub archived_at: String,
    pub archived_reason: String,
}

/// Row counts for operational visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub canonical: TableCounts,
    pub archived: TableCounts,
}

/// Acknowledgement that whole-table archival was requested on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveAllConfirmation {
    Confirmed,
    NotConfirmed,
}

impl From<bool> for ArchiveAllConfirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            ArchiveAllConfirmation::Confirmed
        } else {
            ArchiveAllConfirmation::NotConfirmed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn entry(code: &str, post_fix: Option<&str>) -> SkuCatalogEntry {
        SkuCatalogEntry {
            sku_code: code.to_string(),
            brand: "Apple".into(),
            model: "iPhone 13".into(),
            carrier: None,
            storage: None,
            color: None,
            post_fix: post_fix.map(str::to_string),
            is_unlocked: false,
            is_active: true,
            source_tab: None,
        }
    }

    #[test]
    fn queue_status_round_trips_through_strings() {
        for status in QueueStatus::ALL {
            let parsed = QueueStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
        assert_eq!(QueueStatus::Processing.to_string(), "processing");
    }

    #[test]
    fn match_method_tags_are_snake_case() {
        assert_eq!(MatchMethod::UnlockedFallback.to_string(), "unlocked_fallback");
        assert_eq!(
            MatchMethod::CarrierMismatchFallback.to_string(),
            "carrier_mismatch_fallback"
        );
        let json = serde_json::to_string(&MatchMethod::Unmatched).unwrap();
        assert_eq!(json, "\"unmatched\"");
    }

    #[test]
    fn condition_maps_ordinals_and_passes_through_unknown_grades() {
        assert_eq!(Condition::parse("3"), Condition::Three);
        assert_eq!(Condition::parse("seven"), Condition::Seven);
        assert_eq!(Condition::parse(" Refurbished "), Condition::Refurbished);
        assert_eq!(Condition::parse(""), Condition::Unknown);
        assert_eq!(Condition::parse("very good"), Condition::Other("VERY GOOD".into()));
        assert_eq!(Condition::Other("VG".into()).to_string(), "VG");
    }

    #[test]
    fn condition_serializes_as_plain_string() {
        let json = serde_json::to_string(&Condition::Damaged).unwrap();
        assert_eq!(json, "\"DAMAGED\"");
        let back: Condition = serde_json::from_str("\"b+\"").unwrap();
        assert_eq!(back, Condition::Other("B+".into()));
    }

    #[test]
    fn base_code_strips_grade_suffix() {
        assert_eq!(entry("IP13-128-BLK-VG", Some("VG")).base_code(), "IP13-128-BLK");
        assert_eq!(entry("IP13-128-BLK-new", Some("-NEW")).base_code(), "IP13-128-BLK");
        assert_eq!(entry("IP13-128-BLK", None).base_code(), "IP13-128-BLK");
        // Suffix not actually present on the code.
        assert_eq!(entry("IP13-128-BLK", Some("UL")).base_code(), "IP13-128-BLK");
        // Never strip down to nothing.
        assert_eq!(entry("-VG", Some("VG")).base_code(), "-VG");
    }

    #[test]
    fn cascade_order_starts_with_parent() {
        let order = CanonicalTable::CASCADE_ORDER;
        assert_eq!(order[0].parent(), None);
        for table in &order[1..] {
            assert_eq!(table.parent(), Some(CanonicalTable::Inventory));
        }
    }

    #[test]
    fn cascade_plan_validation() {
        use CanonicalTable::*;
        assert!(CanonicalTable::validate_plan(&CanonicalTable::CASCADE_ORDER).is_ok());
        assert!(CanonicalTable::validate_plan(&[Inventory, InventoryEvents, InventoryMatches]).is_ok());

        let repeated = CanonicalTable::validate_plan(&[Inventory, InventoryMatches, InventoryMatches]);
        assert!(matches!(
            repeated,
            Err(crate::SkuflowError::RecursionGuard { ref table, .. }) if table == "inventory_matches"
        ));
        let inverted = CanonicalTable::validate_plan(&[InventoryMatches, Inventory, InventoryEvents]);
        assert!(matches!(inverted, Err(crate::SkuflowError::RecursionGuard { .. })));
        let partial = CanonicalTable::validate_plan(&[Inventory, InventoryMatches]);
        assert!(matches!(partial, Err(crate::SkuflowError::RecursionGuard { .. })));
    }

    #[test]
    fn counts_totals() {
        let mut counts = QueueCounts::default();
        counts.add(QueueStatus::Pending, 3);
        counts.add(QueueStatus::Failed, 1);
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.get(QueueStatus::Pending), 3);

        let mut rows = TableCounts::default();
        rows.add(CanonicalTable::Inventory, 1);
        rows.merge(&TableCounts {
            inventory: 1,
            inventory_matches: 2,
            inventory_events: 2,
        });
        assert_eq!(rows.total(), 6);
    }

    #[test]
    fn require_sku_surfaces_soft_no_match() {
        let result = MatchResult::unmatched(0.2, "model: no candidate");
        let err = result.require_sku("111").unwrap_err();
        assert!(matches!(err, crate::SkuflowError::NoMatchFound { .. }));
        assert!(!result.is_matched());
    }

    proptest::proptest! {
        #[test]
        fn condition_survives_its_own_rendering(raw in "[ -~]{0,16}") {
            let condition = Condition::parse(&raw);
            proptest::prop_assert_eq!(Condition::parse(condition.as_str()), condition);
        }
    }
}
