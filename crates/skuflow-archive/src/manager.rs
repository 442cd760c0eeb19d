// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archive-then-cascade deletion and restore.
//!
//! Every operation validates the cascade plan, takes the inventory lock for
//! the IMEIs it touches (the global write side for whole-table archival), and
//! hands one transactional call to the [`ArchiveRepository`].

use std::sync::Arc;

use tracing::{info, warn};

use skuflow_config::model::ArchiveConfig;
use skuflow_core::types::{
    ArchiveAllConfirmation, ArchiveReport, ArchiveStats, CanonicalTable, RestoreReport,
};
use skuflow_core::{ArchiveRepository, ImeiLocks, SkuflowError};

/// Coordinates archival with in-flight inventory writers.
pub struct ArchiveManager {
    repo: Arc<dyn ArchiveRepository>,
    locks: Arc<ImeiLocks>,
    plan: Vec<CanonicalTable>,
    default_reason: String,
}

impl ArchiveManager {
    /// A manager using the fixed parent-first table order.
    pub fn new(repo: Arc<dyn ArchiveRepository>, locks: Arc<ImeiLocks>, config: &ArchiveConfig) -> Self {
        Self {
            repo,
            locks,
            plan: CanonicalTable::CASCADE_ORDER.to_vec(),
            default_reason: config.default_reason.clone(),
        }
    }

    /// Replace the cascade plan. Checked before every run, not here.
    pub fn with_plan(mut self, plan: Vec<CanonicalTable>) -> Self {
        self.plan = plan;
        self
    }

    pub fn plan(&self) -> &[CanonicalTable] {
        &self.plan
    }

    fn reason<'a>(&'a self, reason: Option<&'a str>) -> &'a str {
        reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.default_reason)
    }

    /// Archive and delete one IMEI. Returns the number of rows archived; an
    /// unknown IMEI archives nothing and is not an error.
    pub async fn archive_and_delete(
        &self,
        imei: &str,
        reason: Option<&str>,
    ) -> Result<u64, SkuflowError> {
        CanonicalTable::validate_plan(&self.plan)?;
        let _guard = self.locks.lock(imei).await;
        let report = self
            .repo
            .archive_imeis(&self.plan, &[imei.to_string()], self.reason(reason))
            .await?;
        let rows = report.archived_rows();
        if rows == 0 {
            info!(imei, "nothing to archive");
        } else {
            info!(imei, rows, "inventory archived");
        }
        Ok(rows)
    }

    /// Archive and delete several IMEIs in one all-or-nothing transaction.
    ///
    /// On failure nothing is archived and the error names the IMEI that
    /// aborted the batch.
    pub async fn archive_and_delete_many(
        &self,
        imeis: &[String],
        reason: Option<&str>,
    ) -> Result<ArchiveReport, SkuflowError> {
        CanonicalTable::validate_plan(&self.plan)?;
        let _guard = self.locks.lock_many(imeis).await;
        let report = self
            .repo
            .archive_imeis(&self.plan, imeis, self.reason(reason))
            .await
            .inspect_err(|e| warn!(error = %e, "archive batch rolled back"))?;
        info!(
            archived = report.archived.len(),
            not_found = report.not_found.len(),
            rows = report.archived_rows(),
            "inventory batch archived"
        );
        Ok(report)
    }

    /// Archive and delete every canonical row.
    ///
    /// Refuses with [`SkuflowError::ConfirmationRequired`] unless confirmed;
    /// that check happens before any lock or row is touched.
    pub async fn archive_and_delete_all(
        &self,
        confirm: ArchiveAllConfirmation,
        reason: Option<&str>,
    ) -> Result<ArchiveReport, SkuflowError> {
        if confirm != ArchiveAllConfirmation::Confirmed {
            return Err(SkuflowError::ConfirmationRequired {
                operation: "archive_and_delete_all",
            });
        }
        CanonicalTable::validate_plan(&self.plan)?;
        let _guard = self.locks.lock_all().await;
        let report = self
            .repo
            .archive_everything(&self.plan, self.reason(reason))
            .await?;
        warn!(
            archived = report.archived.len(),
            rows = report.archived_rows(),
            "entire inventory archived"
        );
        Ok(report)
    }

    /// Bring the latest archived generation of `imei` back into the canonical
    /// tables. No audit event is added, so the restored rows equal the
    /// archived ones.
    ///
    /// An IMEI archived several times keeps its older generations in the
    /// archive as history. They remain in [`stats`](Self::stats) and are not
    /// reachable through `restore`, since the restored record now owns the IMEI.
    pub async fn restore(&self, imei: &str) -> Result<RestoreReport, SkuflowError> {
        CanonicalTable::validate_plan(&self.plan)?;
        let _guard = self.locks.lock(imei).await;
        let report = self.repo.restore_imei(&self.plan, imei).await?;
        info!(imei, rows = report.rows.total(), "inventory restored");
        Ok(report)
    }

    pub async fn stats(&self) -> Result<ArchiveStats, SkuflowError> {
        self.repo.archive_stats().await
    }
}
