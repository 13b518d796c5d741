// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-engine — Splits, merges and re-orders scanned source documents into
// new registered outputs.
//
// A source document's attribute sidecar suggests page groups. Each group is
// formatted, passed through a qualification gate and, when it qualifies,
// stapled into a new file that is registered in the shared catalog, recorded
// in the pagination ledger and queued for the next workflow action.

pub mod engine;
pub mod gate;
pub mod outcome;
pub mod panel;
pub mod resolver;

pub use engine::{EngineBuilder, PaginationEngine, QueueStore};
pub use gate::{AlwaysQualify, FnGate, QualificationContext, QualificationGate, RequiredAttributesGate};
pub use outcome::{DeferReason, GroupOutcome, GroupReport, ProcessReport};
pub use panel::{FormattingPanel, PanelHandle};
pub use resolver::PageGroupResolver;
