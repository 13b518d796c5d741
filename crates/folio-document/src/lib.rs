// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-document — Document-side work for the Folio pagination engine.
//
// Staples pages into new PDFs, reads and writes the OCR layout and attribute
// sidecars that travel with each document, and re-anchors both into the page
// space of a newly assembled output.

pub mod assemble;
pub mod layout;
pub mod pdf;
pub mod remap;
pub mod sidecar;

pub use assemble::{DocumentAssembler, PageRenderer, PageSource, StagedDocument};
pub use layout::{Bounds, DocumentLayout, PageLayout, TextLine};
pub use pdf::LopdfRenderer;
pub use remap::{PageMap, PageMapping, RemapOutput, remap};
pub use sidecar::{JsonDataStore, JsonLayoutStore, JsonSerializer, LayoutStore, StructuredDataStore};
