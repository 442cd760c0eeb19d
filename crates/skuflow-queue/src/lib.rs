// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion queue for the Skuflow intake pipeline.
//!
//! Raw inspection payloads are persisted as `pending` queue items, claimed in
//! batches, normalized into [`DeviceRecord`](skuflow_core::types::DeviceRecord)s,
//! matched against a catalog snapshot and written to inventory. The
//! [`QueueProcessor`] is the single place where failures are mapped onto the
//! queue's `failed` state; [`WorkerPool`] drives it until shutdown.

pub mod normalize;
pub mod processor;
pub mod shutdown;
pub mod worker;

pub use normalize::normalize;
pub use processor::{BatchReport, QueueProcessor};
pub use shutdown::install_signal_handler;
pub use worker::WorkerPool;
