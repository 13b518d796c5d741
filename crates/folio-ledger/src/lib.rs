// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-ledger — Pagination history and the guards around it.
//
// Records which source pages went into which output, fingerprints outputs
// with SHA-256, and serialises access to a document's sidecars across
// processes.

pub mod integrity;
pub mod ledger;
pub mod lock;

pub use integrity::{hash_bytes, hash_file};
pub use ledger::{PaginationLedger, RecordedPages};
pub use lock::SidecarLock;
