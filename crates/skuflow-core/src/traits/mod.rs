// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository trait definitions injected into the pipeline components.
//!
//! Persistence is split along the three concerns the core consumes:
//! catalog reads, queue/inventory read-write, and archive read-write.
//! All traits use `#[async_trait]` so they can be held as trait objects,
//! which lets tests swap the SQLite backend for an in-memory fake.

pub mod adapter;
pub mod archive;
pub mod catalog;
pub mod ingest;

pub use adapter::PluginAdapter;
pub use archive::ArchiveRepository;
pub use catalog::CatalogRepository;
pub use ingest::IngestRepository;
