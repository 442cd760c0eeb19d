// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archival-based safe deletion for Skuflow inventory.
//!
//! Rows are never deleted outright: they are copied into the archive tables
//! and only then removed from the canonical tables, in one transaction, and
//! can be restored later.

pub mod manager;

pub use manager::ArchiveManager;
