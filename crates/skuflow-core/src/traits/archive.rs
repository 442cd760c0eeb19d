// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archive read-write access.

use async_trait::async_trait;

use crate::error::SkuflowError;
use crate::types::{ArchiveReport, ArchiveStats, ArchivedInventory, CanonicalTable, RestoreReport};

/// Two-phase archival over the canonical tables.
///
/// Implementations copy rows into the archive tables walking `plan`
/// forwards, then delete the canonical rows walking it backwards, all inside
/// one transaction. No database triggers are involved.
#[async_trait]
pub trait ArchiveRepository: Send + Sync {
    /// Archive and delete every row for each IMEI. All-or-nothing: on any
    /// failure nothing is changed and [`SkuflowError::ArchiveAborted`] names the IMEI.
    async fn archive_imeis(
        &self,
        plan: &[CanonicalTable],
        imeis: &[String],
        reason: &str,
    ) -> Result<ArchiveReport, SkuflowError>;

    /// Archive and delete every canonical row.
    async fn archive_everything(
        &self,
        plan: &[CanonicalTable],
        reason: &str,
    ) -> Result<ArchiveReport, SkuflowError>;

    /// Copy archived rows back (walking `plan` forwards) and delete them from
    /// the archive. Fails with [`SkuflowError::RestoreConflict`] when the IMEI
    /// already exists in the canonical tables.
    async fn restore_imei(
        &self,
        plan: &[CanonicalTable],
        imei: &str,
    ) -> Result<RestoreReport, SkuflowError>;

    async fn get_archived(&self, imei: &str) -> Result<Option<ArchivedInventory>, SkuflowError>;

    async fn archive_stats(&self) -> Result<ArchiveStats, SkuflowError>;
}
