// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `skuflow archive ...`.

use std::sync::Arc;

use serde::Serialize;
use skuflow_archive::ArchiveManager;
use skuflow_config::SkuflowConfig;
use skuflow_core::types::{ArchiveAllConfirmation, ArchiveReport, CanonicalTable, TableCounts};
use skuflow_core::{ImeiLocks, PluginAdapter, SkuflowError};
use skuflow_storage::SqliteStorage;

use crate::{open_storage, print_json};

async fn manager(config: &SkuflowConfig) -> Result<(Arc<SqliteStorage>, ArchiveManager), SkuflowError> {
    let storage = open_storage(config).await?;
    let manager = ArchiveManager::new(storage.clone(), Arc::new(ImeiLocks::new()), &config.archive);
    Ok((storage, manager))
}

/// JSON shape for single-IMEI deletes.
#[derive(Debug, Serialize)]
struct DeleteOne<'a> {
    imei: &'a str,
    archived_rows: u64,
}

pub async fn delete(
    config: &SkuflowConfig,
    imeis: &[String],
    reason: Option<&str>,
    json: bool,
) -> Result<(), SkuflowError> {
    let (storage, manager) = manager(config).await?;

    if let [imei] = imeis {
        let rows = manager.archive_and_delete(imei, reason).await;
        storage.shutdown().await?;
        let rows = rows?;
        if json {
            return print_json(&DeleteOne {
                imei,
                archived_rows: rows,
            });
        }
        if rows == 0 {
            println!("{imei}: not in inventory, nothing archived");
        } else {
            println!("{imei}: archived {rows} row(s)");
        }
        return Ok(());
    }

    let report = manager.archive_and_delete_many(imeis, reason).await;
    storage.shutdown().await?;
    print_report(&report?, json)
}

pub async fn delete_all(
    config: &SkuflowConfig,
    confirm: bool,
    reason: Option<&str>,
    json: bool,
) -> Result<(), SkuflowError> {
    let confirm = ArchiveAllConfirmation::from(confirm);
    if confirm == ArchiveAllConfirmation::NotConfirmed {
        return Err(SkuflowError::ConfirmationRequired {
            operation: "archive delete-all",
        });
    }
    let (storage, manager) = manager(config).await?;
    let report = manager.archive_and_delete_all(confirm, reason).await;
    storage.shutdown().await?;
    print_report(&report?, json)
}

fn print_report(report: &ArchiveReport, json: bool) -> Result<(), SkuflowError> {
    if json {
        return print_json(report);
    }
    println!(
        "archived {} IMEI(s), {} row(s)",
        report.archived.len(),
        report.archived_rows()
    );
    if !report.not_found.is_empty() {
        println!("not in inventory: {}", report.not_found.join(", "));
    }
    print_counts("rows", &report.rows);
    Ok(())
}

pub async fn restore(config: &SkuflowConfig, imei: &str, json: bool) -> Result<(), SkuflowError> {
    let (storage, manager) = manager(config).await?;
    let report = manager.restore(imei).await;
    storage.shutdown().await?;
    let report = report?;

    if json {
        return print_json(&report);
    }
    if report.rows.total() == 0 {
        println!("{imei}: not archived, nothing restored");
    } else {
        println!("{imei}: restored {} row(s)", report.rows.total());
        print_counts("rows", &report.rows);
    }
    Ok(())
}

pub async fn stats(config: &SkuflowConfig, json: bool) -> Result<(), SkuflowError> {
    let (storage, manager) = manager(config).await?;
    let stats = manager.stats().await;
    storage.shutdown().await?;
    let stats = stats?;

    if json {
        return print_json(&stats);
    }
    print_counts("canonical", &stats.canonical);
    print_counts("archived", &stats.archived);
    Ok(())
}

fn print_counts(label: &str, counts: &TableCounts) {
    println!("{label}:");
    for table in CanonicalTable::CASCADE_ORDER {
        println!("  {:<20} {}", table.table_name(), counts.get(table));
    }
}
