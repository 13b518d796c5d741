// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON sidecar stores for attribute trees and OCR layout.
//
// A sidecar shares its document's path plus a suffix (`scan.pdf.data.json`).
// Writes go through a temporary file in the same directory and are renamed
// into place, so a reader sees either the old sidecar or the new one.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use folio_core::DocumentData;
use folio_core::error::{FolioError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::layout::DocumentLayout;

/// Serializer shared by every sidecar store.
///
/// Constructed once by the host and handed to each store, so all sidecars
/// written by one engine use the same format settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    pub fn to_bytes<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(bytes)
    }

    pub fn from_slice<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Read and decode `path`, or `None` when the file does not exist.
    pub fn read_optional<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match std::fs::read(path) {
            Ok(bytes) => self.from_slice(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FolioError::Io(e)),
        }
    }

    /// Encode `value` and atomically replace `path` with it.
    pub fn write_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = self.to_bytes(value)?;
        write_atomic(path, &bytes)
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| FolioError::Io(e.error))?;
    Ok(())
}

/// Load and save a document's attribute tree.
pub trait StructuredDataStore: Send + Sync {
    fn load(&self, sidecar: &Path) -> Result<Option<DocumentData>>;

    fn save(&self, sidecar: &Path, data: &DocumentData) -> Result<()>;
}

/// Load and save a document's OCR layout.
pub trait LayoutStore: Send + Sync {
    fn load(&self, sidecar: &Path) -> Result<Option<DocumentLayout>>;

    fn save(&self, sidecar: &Path, layout: &DocumentLayout) -> Result<()>;
}

/// JSON-backed [`StructuredDataStore`].
#[derive(Debug, Clone)]
pub struct JsonDataStore {
    serializer: Arc<JsonSerializer>,
}

impl JsonDataStore {
    pub fn new(serializer: Arc<JsonSerializer>) -> Self {
        Self { serializer }
    }
}

impl StructuredDataStore for JsonDataStore {
    #[instrument(skip(self), fields(sidecar = %sidecar.display()))]
    fn load(&self, sidecar: &Path) -> Result<Option<DocumentData>> {
        let data: Option<DocumentData> = self.serializer.read_optional(sidecar)?;
        debug!(found = data.is_some(), "attribute sidecar loaded");
        Ok(data)
    }

    #[instrument(skip(self, data), fields(sidecar = %sidecar.display(), nodes = data.attributes.len()))]
    fn save(&self, sidecar: &Path, data: &DocumentData) -> Result<()> {
        self.serializer.write_atomic(sidecar, data)?;
        debug!("attribute sidecar saved");
        Ok(())
    }
}

/// JSON-backed [`LayoutStore`].
#[derive(Debug, Clone)]
pub struct JsonLayoutStore {
    serializer: Arc<JsonSerializer>,
}

impl JsonLayoutStore {
    pub fn new(serializer: Arc<JsonSerializer>) -> Self {
        Self { serializer }
    }
}

impl LayoutStore for JsonLayoutStore {
    #[instrument(skip(self), fields(sidecar = %sidecar.display()))]
    fn load(&self, sidecar: &Path) -> Result<Option<DocumentLayout>> {
        let layout: Option<DocumentLayout> = self.serializer.read_optional(sidecar)?;
        debug!(pages = layout.as_ref().map(|l| l.pages.len()), "layout sidecar loaded");
        Ok(layout)
    }

    #[instrument(skip(self, layout), fields(sidecar = %sidecar.display(), pages = layout.pages.len()))]
    fn save(&self, sidecar: &Path, layout: &DocumentLayout) -> Result<()> {
        self.serializer.write_atomic(sidecar, layout)?;
        debug!("layout sidecar saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::fixtures::layout;
    use folio_core::AttributeNode;

    #[test]
    fn missing_sidecar_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDataStore::new(Arc::new(JsonSerializer::new()));
        assert!(store.load(&dir.path().join("absent.data.json")).unwrap().is_none());
    }

    #[test]
    fn data_sidecar_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf.data.json");
        let store = JsonDataStore::new(Arc::new(JsonSerializer::pretty()));

        let data = DocumentData::new(vec![AttributeNode::container(
            "Document",
            vec![AttributeNode::leaf("Pages", "1-2")],
        )]);
        store.save(&path, &data).unwrap();
        assert_eq!(store.load(&path).unwrap(), Some(data));
    }

    #[test]
    fn layout_sidecar_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf.layout.json");
        let store = JsonLayoutStore::new(Arc::new(JsonSerializer::new()));

        store.save(&path, &layout("scan.pdf", &[1, 2, 3])).unwrap();
        store.save(&path, &layout("scan.pdf", &[1])).unwrap();

        let loaded = store.load(&path).unwrap().unwrap();
        assert_eq!(loaded.pages.len(), 1);
    }

    #[test]
    fn corrupt_sidecar_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.data.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let store = JsonDataStore::new(Arc::new(JsonSerializer::new()));
        assert!(matches!(store.load(&path), Err(FolioError::Serialization(_))));
    }
}
