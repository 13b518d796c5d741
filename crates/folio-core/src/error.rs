// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Folio.

use thiserror::Error;

/// Top-level error type for all Folio operations.
#[derive(Debug, Error)]
pub enum FolioError {
    // -- Registration --
    /// The catalog already holds an entry with this file name.
    #[error("output name already registered: {0}")]
    Collision(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    // -- Per-group data handling --
    #[error("data formatting failed: {0}")]
    DataFormatting(String),

    #[error("qualification check failed: {0}")]
    Qualification(String),

    // -- Document assembly --
    #[error("document assembly failed: {0}")]
    Assembly(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- Pagination input --
    #[error("invalid page range: {0}")]
    InvalidRange(String),

    #[error("invalid page map: {0}")]
    InvalidPageMap(String),

    /// A page rotation that is not a whole quarter turn.
    #[error("invalid rotation: {0} degrees is not a quarter turn")]
    InvalidRotation(i64),

    // -- Queue --
    #[error("invalid status transition for file {file_id}: {from} -> {to}")]
    InvalidTransition {
        file_id: i64,
        from: String,
        to: String,
    },

    #[error("file {file_id} is processing in action '{action}'")]
    QueueConflict { file_id: i64, action: String },

    #[error("file {0} not found in catalog")]
    FileNotFound(i64),

    #[error("operation cancelled")]
    Cancelled,

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sidecar lock failed on {path}: {reason}")]
    Lock { path: String, reason: String },

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

impl FolioError {
    /// Whether the error is confined to a single page group and the
    /// remaining groups of the same source may still be processed.
    pub fn is_group_scoped(&self) -> bool {
        matches!(self, Self::DataFormatting(_) | Self::Qualification(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FolioError>;
