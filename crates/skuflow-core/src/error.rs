// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Skuflow intake pipeline.

use thiserror::Error;

use crate::types::{FailureKind, QueueItemId};

/// A raw inspection payload could not be turned into a device record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// One or more mandatory device fields were absent or empty.
    #[error("missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// The payload was not a JSON object.
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl ValidationError {
    /// Names of the missing mandatory fields, empty for non-object payloads.
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            ValidationError::MissingFields(fields) => fields,
            ValidationError::NotAnObject(_) => &[],
        }
    }
}

/// The primary error type used across Skuflow components.
#[derive(Debug, Error)]
pub enum SkuflowError {
    /// Configuration errors (invalid TOML, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A payload is missing mandatory device fields. Never retried.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No catalog SKU scored above the match threshold. Soft: the item
    /// still completes with a null SKU.
    #[error("no catalog match for IMEI {imei}: {notes}")]
    NoMatchFound { imei: String, notes: String },

    /// Persistence failures (connection, query, transaction). Transient.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Catalog or data inconsistency with more than one equally valid
    /// resolution and no applicable tie-break.
    #[error("ambiguous reference: {detail}")]
    AmbiguousReference { detail: String },

    /// Restore target already exists in the canonical tables.
    #[error("restore conflict: IMEI {imei} already exists in inventory")]
    RestoreConflict { imei: String },

    /// An archive batch was rolled back because one IMEI failed.
    #[error("archive aborted at IMEI {imei}: {source}")]
    ArchiveAborted {
        imei: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A destructive operation was invoked without explicit confirmation.
    #[error("{operation} requires explicit confirmation")]
    ConfirmationRequired { operation: &'static str },

    /// The cascade plan revisited a table. Structurally impossible with the
    /// fixed table order; kept as an assertion.
    #[error("cascade recursion guard tripped at table `{table}`: {detail}")]
    RecursionGuard { table: String, detail: String },

    /// A queue item was no longer held by this worker when its result was
    /// written (typically reclaimed after a stale sweep).
    #[error("queue item {id} is no longer claimed")]
    ClaimLost { id: QueueItemId },

    /// A requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SkuflowError {
    /// Wraps any error as a storage failure.
    pub fn storage(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        SkuflowError::Storage { source: err.into() }
    }

    /// Classifies this error for the queue's `error_kind` column.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            SkuflowError::Validation(_) => FailureKind::Validation,
            SkuflowError::AmbiguousReference { .. } => FailureKind::Ambiguous,
            _ => FailureKind::Persistence,
        }
    }

    /// Whether a failed item with this error should count against the retry budget.
    pub fn is_retryable(&self) -> bool {
        self.failure_kind().is_retryable()
    }
}
