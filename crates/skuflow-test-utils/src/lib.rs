// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Skuflow integration tests.
//!
//! # Components
//!
//! - [`MemoryStore`] - in-memory implementation of every repository trait, with fault injection
//! - [`TestHarness`] - temp-dir SQLite storage plus a matching configuration
//! - [`fixtures`] - catalog entries and inspection payloads

pub mod fixtures;
pub mod harness;
pub mod memory_store;

pub use harness::TestHarness;
pub use memory_store::MemoryStore;
