// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `skuflow match <file>`: dry-run normalization and matching.

use std::path::Path;

use serde::Serialize;
use skuflow_config::SkuflowConfig;
use skuflow_core::types::{DeviceRecord, MatchResult};
use skuflow_core::{CatalogRepository, PluginAdapter, SkuflowError};
use skuflow_match::SkuMatcher;
use skuflow_queue::normalize;

use crate::queue::read_payloads;
use crate::{open_storage, print_json};

#[derive(Debug, Serialize)]
struct MatchOutput {
    device: DeviceRecord,
    result: MatchResult,
}

pub async fn match_file(config: &SkuflowConfig, file: &Path, json: bool) -> Result<(), SkuflowError> {
    let mut payloads = read_payloads(file)?;
    if payloads.len() != 1 {
        return Err(SkuflowError::Internal(format!(
            "{} must hold exactly one payload, found {}",
            file.display(),
            payloads.len()
        )));
    }
    let device = normalize(&payloads.remove(0))?;

    let storage = open_storage(config).await?;
    let catalog = storage.active_catalog().await;
    storage.shutdown().await?;
    let catalog = catalog?;

    let result = SkuMatcher::new(&config.matching).match_device(&device, &catalog)?;
    let output = MatchOutput { device, result };
    if json {
        return print_json(&output);
    }

    let d = &output.device;
    println!("imei      {}", d.imei);
    println!("device    {} {} ({})", d.brand, d.model, d.name);
    println!(
        "attrs     storage={} color={} carrier={}",
        d.storage.as_deref().unwrap_or("-"),
        d.color.as_deref().unwrap_or("-"),
        d.carrier.as_deref().unwrap_or("-"),
    );
    println!("sku       {}", output.result.sku_code.as_deref().unwrap_or("(none)"));
    println!("score     {:.3}", output.result.score);
    println!("method    {}", output.result.method);
    println!("notes     {}", output.result.notes);
    Ok(())
}
