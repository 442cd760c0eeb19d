// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SKU matching engine.
//!
//! Scores a normalized [`DeviceRecord`](skuflow_core::types::DeviceRecord)
//! against a catalog snapshot and picks the best SKU through three carrier
//! tiers: exact carrier, unlocked fallback, carrier-mismatch fallback.
//! Pure and deterministic; no I/O.

pub mod attributes;
pub mod matcher;

pub use matcher::{MatchWeights, SkuMatcher};
