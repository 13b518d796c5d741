// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-catalog — The shared file catalog seen by every Folio worker.
//
// Provides the SQLite-backed catalog/ledger/queue store, output name
// registration with collision handling, and queue coordination (status
// transitions, rerouting, scoped pause/resume).

pub mod coordinator;
pub mod registrar;
pub mod sqlite;

pub use coordinator::{QueueCoordinator, QueuePause};
pub use registrar::{OutputMetadata, OutputRegistrar, RandomSuffix, SuffixSource};
pub use sqlite::SqliteCatalog;
