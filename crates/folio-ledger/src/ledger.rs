// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagination ledger — append-only history linking source pages to the output
// they went into.
//
// Entries are the only record the resolver trusts to decide whether a page
// group was already handled. An entry is written strictly after its output
// has been committed and registered, so a reader never finds an entry that
// points at a file that does not exist.

use std::collections::HashSet;
use std::sync::Arc;

use folio_core::error::{FolioError, Result};
use folio_core::{FileId, LedgerEntry, LedgerStore, PageKey, SessionId};
use tracing::{debug, info, instrument};

/// Pages of one document already recorded in the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedPages {
    pages: HashSet<PageKey>,
}

impl RecordedPages {
    pub fn contains(&self, page: &PageKey) -> bool {
        self.pages.contains(page)
    }

    /// Whether every page of a non-empty group has been recorded.
    pub fn covers(&self, group: &[PageKey]) -> bool {
        !group.is_empty() && group.iter().all(|p| self.pages.contains(p))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Writes and queries pagination history through a [`LedgerStore`].
#[derive(Clone)]
pub struct PaginationLedger {
    store: Arc<dyn LedgerStore>,
}

impl PaginationLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Append one entry. `destination` is `None` for an all-deleted group.
    #[instrument(skip(self, source_pages, output_hash), fields(pages = source_pages.len()))]
    pub fn record(
        &self,
        source_pages: &[PageKey],
        destination: Option<FileId>,
        session: SessionId,
        output_hash: Option<String>,
    ) -> Result<LedgerEntry> {
        if source_pages.is_empty() {
            return Err(FolioError::InvalidPageMap(
                "ledger entry needs at least one source page".into(),
            ));
        }

        let mut entry = LedgerEntry::new(source_pages.to_vec(), destination, session);
        if let Some(hash) = output_hash {
            entry = entry.with_output_hash(hash);
        }
        self.store.insert_ledger_entry(&entry)?;

        info!(?destination, %session, "pagination recorded");
        Ok(entry)
    }

    /// Every page of `document_name` that appears in any entry.
    #[instrument(skip(self))]
    pub fn recorded_pages(&self, document_name: &str) -> Result<RecordedPages> {
        let pages: HashSet<PageKey> = self
            .store
            .ledger_entries_for(document_name)?
            .into_iter()
            .flat_map(|e| e.source_pages)
            .filter(|p| p.document_name == document_name)
            .collect();
        debug!(count = pages.len(), "recorded pages loaded");
        Ok(RecordedPages { pages })
    }
}
