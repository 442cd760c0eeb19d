// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait for storage backends.

use async_trait::async_trait;

use crate::error::SkuflowError;
use crate::types::HealthStatus;

/// Identity, health and lifecycle shared by every storage backend.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this backend.
    fn name(&self) -> &str;

    /// Returns the semantic version of this backend.
    fn version(&self) -> semver::Version;

    /// Performs a health check and returns the backend's current status.
    async fn health_check(&self) -> Result<HealthStatus, SkuflowError>;

    /// Gracefully shuts down the backend, flushing pending writes.
    async fn shutdown(&self) -> Result<(), SkuflowError>;
}
