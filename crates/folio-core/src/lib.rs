// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folio — Core types, configuration, and error definitions shared across all
// crates.

pub mod cancel;
pub mod config;
pub mod data;
pub mod error;
pub mod ranges;
pub mod traits;
pub mod types;

pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use data::{AttributeNode, DocumentData, RasterZone, SpatialRef};
pub use error::FolioError;
pub use ranges::parse_ranges;
pub use traits::{FileCatalog, LedgerStore, QueueControl, TransitionFlags};
pub use types::*;
