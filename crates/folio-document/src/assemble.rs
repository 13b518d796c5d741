// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document assembly — staple selected, ordered, optionally rotated pages into
// one physical output document.
//
// Rendering always targets a temporary file next to the final location. The
// caller decides when the staged file becomes visible by committing it, and
// dropping an uncommitted stage removes the temporary file, so a failure at
// any point leaves nothing at the final path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use folio_core::error::{FolioError, Result};
use folio_core::{CancellationToken, PageRef, Rotation};
use tempfile::TempPath;
use tracing::{debug, info, instrument, warn};

/// One page to place in an output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSource {
    pub path: PathBuf,
    pub page_number: u32,
    pub rotation: Rotation,
}

impl From<&PageRef> for PageSource {
    fn from(page: &PageRef) -> Self {
        Self {
            path: PathBuf::from(&page.document_name),
            page_number: page.page_number,
            rotation: page.orientation,
        }
    }
}

/// Page-level document operations supplied by the imaging collaborator.
pub trait PageRenderer: Send + Sync {
    /// Number of pages in `document`.
    fn page_count(&self, document: &Path) -> Result<u32>;

    /// Write `pages`, in the given order, into a new document at `output`.
    ///
    /// Implementations check `cancel` between pages.
    fn staple(&self, pages: &[PageSource], output: &Path, cancel: &CancellationToken) -> Result<()>;
}

/// A fully rendered output waiting to be moved into place.
#[derive(Debug)]
pub struct StagedDocument {
    temp: TempPath,
    page_count: u32,
    file_size: u64,
}

impl StagedDocument {
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Atomically move the staged file to `final_path`.
    ///
    /// Fails without touching anything if a file already exists there.
    #[instrument(skip(self), fields(final_path = %final_path.display()))]
    pub fn commit(self, final_path: &Path) -> Result<PathBuf> {
        self.temp.persist_noclobber(final_path).map_err(|e| {
            FolioError::Assembly(format!(
                "cannot move output into {}: {}",
                final_path.display(),
                e.error
            ))
        })?;
        info!("output committed");
        Ok(final_path.to_path_buf())
    }
}

/// Builds output documents through a [`PageRenderer`].
#[derive(Clone)]
pub struct DocumentAssembler {
    renderer: Arc<dyn PageRenderer>,
}

impl DocumentAssembler {
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &Arc<dyn PageRenderer> {
        &self.renderer
    }

    /// Render the non-deleted `pages` in order into a staged file inside
    /// `output_dir`.
    ///
    /// Pages may come from several source documents. Their order is taken
    /// as given and never re-sorted.
    #[instrument(skip(self, pages, cancel), fields(pages = pages.len(), dir = %output_dir.display()))]
    pub fn assemble(
        &self,
        pages: &[PageRef],
        output_dir: &Path,
        extension: &str,
        cancel: &CancellationToken,
    ) -> Result<StagedDocument> {
        let sources: Vec<PageSource> = pages
            .iter()
            .filter(|p| !p.deleted)
            .map(PageSource::from)
            .collect();

        if sources.is_empty() {
            return Err(FolioError::Assembly("no pages to assemble".into()));
        }
        cancel.check()?;

        let temp = tempfile::Builder::new()
            .prefix(".folio-")
            .suffix(&format!(".{extension}"))
            .tempfile_in(output_dir)
            .map_err(|e| {
                FolioError::Assembly(format!(
                    "cannot stage output in {}: {e}",
                    output_dir.display()
                ))
            })?
            .into_temp_path();

        if let Err(err) = self.renderer.staple(&sources, &temp, cancel) {
            warn!(error = %err, "stapling failed, staged file discarded");
            return Err(match err {
                FolioError::Cancelled => FolioError::Cancelled,
                FolioError::Assembly(msg) => FolioError::Assembly(msg),
                other => FolioError::Assembly(other.to_string()),
            });
        }

        let file_size = std::fs::metadata(&temp)?.len();
        debug!(file_size, "output staged");

        Ok(StagedDocument {
            temp,
            page_count: sources.len() as u32,
            file_size,
        })
    }
}
