// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `skuflow enqueue` and `skuflow queue ...`.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use skuflow_config::SkuflowConfig;
use skuflow_core::types::{QueueFilter, QueuePage, QueueStatus};
use skuflow_core::{ImeiLocks, IngestRepository, PluginAdapter, SkuflowError};

use crate::{build_processor, open_storage, print_json};

/// Read a JSON file into a list of payloads. A top-level array is split into
/// its elements; anything else is a single payload.
pub(crate) fn read_payloads(path: &Path) -> Result<Vec<Value>, SkuflowError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| SkuflowError::Internal(format!("cannot read {}: {e}", path.display())))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| SkuflowError::Internal(format!("{} is not valid JSON: {e}", path.display())))?;
    Ok(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}

pub async fn enqueue(config: &SkuflowConfig, file: &Path, json: bool) -> Result<(), SkuflowError> {
    let payloads = read_payloads(file)?;
    let storage = open_storage(config).await?;
    let processor = build_processor(config, &storage, Arc::new(ImeiLocks::new()));
    let receipt = processor.enqueue(payloads).await?;
    storage.shutdown().await?;

    if json {
        return print_json(&receipt);
    }
    println!("enqueued {} item(s), rejected {}", receipt.ids.len(), receipt.rejected);
    if let (Some(first), Some(last)) = (receipt.ids.first(), receipt.ids.last()) {
        println!("ids {first}..={last}");
    }
    Ok(())
}

pub async fn list(
    config: &SkuflowConfig,
    status: Option<QueueStatus>,
    limit: u32,
    offset: u32,
    exhausted: bool,
    json: bool,
) -> Result<(), SkuflowError> {
    let storage = open_storage(config).await?;
    let page = if exhausted {
        build_processor(config, &storage, Arc::new(ImeiLocks::new()))
            .exhausted(limit, offset)
            .await?
    } else {
        storage
            .list_items(&QueueFilter {
                status,
                min_retries: None,
                limit,
                offset,
            })
            .await?
    };
    storage.shutdown().await?;

    if json {
        return print_json(&page);
    }
    print_page(&page, offset);
    Ok(())
}

fn print_page(page: &QueuePage, offset: u32) {
    println!(
        "{:>8}  {:<10}  {:>5}  {:<11}  {:<24}  error",
        "id", "status", "retry", "kind", "created"
    );
    for item in &page.items {
        println!(
            "{:>8}  {:<10}  {:>5}  {:<11}  {:<24}  {}",
            item.id,
            item.status.to_string(),
            item.retry_count,
            item.error_kind.map(|k| k.to_string()).unwrap_or_default(),
            item.created_at,
            item.error_message.as_deref().unwrap_or(""),
        );
    }
    println!(
        "showing {} of {} (offset {offset})",
        page.items.len(),
        page.total
    );
}

pub async fn counts(config: &SkuflowConfig, json: bool) -> Result<(), SkuflowError> {
    let storage = open_storage(config).await?;
    let counts = storage.queue_counts().await?;
    storage.shutdown().await?;

    if json {
        return print_json(&counts);
    }
    for status in QueueStatus::ALL {
        println!("{:<10} {}", status.to_string(), counts.get(status));
    }
    println!("{:<10} {}", "total", counts.total());
    Ok(())
}

pub async fn sweep(config: &SkuflowConfig, json: bool) -> Result<(), SkuflowError> {
    let storage = open_storage(config).await?;
    let sweep = build_processor(config, &storage, Arc::new(ImeiLocks::new()))
        .sweep_stale()
        .await?;
    storage.shutdown().await?;

    if json {
        return print_json(&sweep);
    }
    println!(
        "requeued {} item(s), failed {} item(s) past the retry limit",
        sweep.requeued.len(),
        sweep.failed.len()
    );
    Ok(())
}

pub async fn resubmit(config: &SkuflowConfig, json: bool) -> Result<(), SkuflowError> {
    let storage = open_storage(config).await?;
    let ids = build_processor(config, &storage, Arc::new(ImeiLocks::new()))
        .resubmit()
        .await?;
    storage.shutdown().await?;

    if json {
        return print_json(&ids);
    }
    println!("re-submitted {} item(s)", ids.len());
    Ok(())
}
