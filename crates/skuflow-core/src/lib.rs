// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Skuflow device-intake pipeline.
//!
//! Provides the error taxonomy, the domain types shared by the normalizer,
//! matcher, queue processor and archival manager, the repository traits
//! those components are written against, and the per-IMEI lock registry.

pub mod error;
pub mod locks;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{SkuflowError, ValidationError};
pub use locks::{ExclusiveGuard, ImeiGuard, ImeiLocks};
pub use types::HealthStatus;

pub use traits::{ArchiveRepository, CatalogRepository, IngestRepository, PluginAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_traits_are_object_safe() {
        fn _catalog(_: &dyn CatalogRepository) {}
        fn _ingest(_: &dyn IngestRepository) {}
        fn _archive(_: &dyn ArchiveRepository) {}
        fn _adapter(_: &dyn PluginAdapter) {}
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        assert_ne!(HealthStatus::Degraded("slow".into()), healthy);
        assert_ne!(HealthStatus::Unhealthy("down".into()), healthy);
    }
}
