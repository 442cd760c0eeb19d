// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only access to the SKU catalog.

use async_trait::async_trait;

use crate::error::SkuflowError;
use crate::types::SkuCatalogEntry;

/// Catalog snapshot provider. The pipeline never writes the catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// All entries with `is_active = true`, ordered by `sku_code`.
    async fn active_catalog(&self) -> Result<Vec<SkuCatalogEntry>, SkuflowError>;
}
