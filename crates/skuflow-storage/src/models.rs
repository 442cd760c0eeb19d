// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities, plus row decoding helpers.
//!
//! The canonical types are defined in `skuflow-core::types` for use across
//! repository trait boundaries. This module re-exports them for convenience
//! within the storage crate.

use std::str::FromStr;

use rusqlite::types::Type;

pub use skuflow_core::types::{
    ArchiveReport, ArchiveStats, ArchivedInventory, CanonicalTable, DeviceRecord, FailureKind,
    InventoryRecord, MatchResult, QueueItem, QueueStatus, SkuCatalogEntry, TableCounts,
};

/// Decode a TEXT column through `FromStr`, reporting failures as a column
/// conversion error.
pub(crate) fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Like [`parse_column`] for nullable columns.
pub(crate) fn parse_optional_column<T>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse())
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
