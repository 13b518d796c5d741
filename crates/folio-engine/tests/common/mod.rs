// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory catalog and renderer fakes shared by the engine tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use folio_core::error::{FolioError, Result};
use folio_core::traits::check_transition;
use folio_core::{
    AttributeNode, CancellationToken, DocumentData, EngineConfig, FileCatalog, FileId,
    FileQueueRecord, FileStatus, LedgerEntry, LedgerStore, QueueControl, TransitionFlags,
};
use folio_document::{PageRenderer, PageSource};

/// One observable call made against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Pause,
    Resume,
    AddFile(String),
    SetStatus {
        file_id: FileId,
        action: String,
        status: FileStatus,
        paused: bool,
    },
    Ledger {
        destination: Option<FileId>,
    },
}

#[derive(Default)]
struct State {
    files: Vec<FileQueueRecord>,
    ledger: Vec<LedgerEntry>,
    pauses: i64,
    events: Vec<Event>,
}

/// Catalog, ledger and queue switch in one, logging every call.
#[derive(Default)]
pub struct RecordingCatalog {
    state: Mutex<State>,
}

impl RecordingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` as a source currently processing in `action`.
    pub fn seed_source(&self, name: &str, page_count: u32, priority: i32, action: &str) -> FileQueueRecord {
        let mut state = self.state.lock().expect("state");
        let record = FileQueueRecord {
            file_id: FileId(state.files.len() as i64 + 1),
            file_name: name.to_owned(),
            current_action: Some(action.to_owned()),
            status: Some(FileStatus::Processing),
            priority,
            workflow_id: "wf".into(),
            file_size: 0,
            page_count,
        };
        state.files.push(record.clone());
        record
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().expect("state").events.clone()
    }

    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.state.lock().expect("state").ledger.clone()
    }

    pub fn files(&self) -> Vec<FileQueueRecord> {
        self.state.lock().expect("state").files.clone()
    }

    pub fn file(&self, id: FileId) -> FileQueueRecord {
        self.get_file(id).expect("get").expect("registered")
    }

    pub fn pause_depth(&self) -> i64 {
        self.state.lock().expect("state").pauses
    }

    pub fn clear_events(&self) {
        self.state.lock().expect("state").events.clear();
    }
}

impl FileCatalog for RecordingCatalog {
    fn add_file_no_queue(
        &self,
        file_name: &str,
        file_size: u64,
        page_count: u32,
        priority: i32,
        workflow_id: &str,
    ) -> Result<FileId> {
        let mut state = self.state.lock().expect("state");
        if state.files.iter().any(|f| f.file_name == file_name) {
            return Err(FolioError::Collision(file_name.to_owned()));
        }
        let file_id = FileId(state.files.len() as i64 + 1);
        state.files.push(FileQueueRecord {
            file_id,
            file_name: file_name.to_owned(),
            current_action: None,
            status: None,
            priority,
            workflow_id: workflow_id.to_owned(),
            file_size,
            page_count,
        });
        state.events.push(Event::AddFile(file_name.to_owned()));
        Ok(file_id)
    }

    fn set_status_for_file(
        &self,
        file_id: FileId,
        action: &str,
        workflow_id: &str,
        status: FileStatus,
        flags: TransitionFlags,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("state");
        let paused = state.pauses > 0;
        let record = state
            .files
            .iter_mut()
            .find(|f| f.file_id == file_id)
            .ok_or(FolioError::FileNotFound(file_id.0))?;
        check_transition(record, action, status, flags)?;
        record.current_action = Some(action.to_owned());
        record.status = Some(status);
        record.workflow_id = workflow_id.to_owned();
        state.events.push(Event::SetStatus {
            file_id,
            action: action.to_owned(),
            status,
            paused,
        });
        Ok(())
    }

    fn get_file_id(&self, file_name: &str) -> Result<Option<FileId>> {
        let state = self.state.lock().expect("state");
        Ok(state
            .files
            .iter()
            .find(|f| f.file_name == file_name)
            .map(|f| f.file_id))
    }

    fn get_file(&self, file_id: FileId) -> Result<Option<FileQueueRecord>> {
        let state = self.state.lock().expect("state");
        Ok(state.files.iter().find(|f| f.file_id == file_id).cloned())
    }

    fn max_priority(&self, file_names: &[String]) -> Result<Option<i32>> {
        let state = self.state.lock().expect("state");
        Ok(state
            .files
            .iter()
            .filter(|f| file_names.contains(&f.file_name))
            .map(|f| f.priority)
            .max())
    }
}

impl LedgerStore for RecordingCatalog {
    fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let mut state = self.state.lock().expect("state");
        state.ledger.push(entry.clone());
        state.events.push(Event::Ledger {
            destination: entry.destination_file_id,
        });
        Ok(())
    }

    fn ledger_entries_for(&self, document_name: &str) -> Result<Vec<LedgerEntry>> {
        let state = self.state.lock().expect("state");
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.source_pages.iter().any(|p| p.document_name == document_name))
            .cloned()
            .collect())
    }
}

impl QueueControl for RecordingCatalog {
    fn pause_queue(&self) -> Result<()> {
        let mut state = self.state.lock().expect("state");
        state.pauses += 1;
        state.events.push(Event::Pause);
        Ok(())
    }

    fn resume_queue(&self) -> Result<()> {
        let mut state = self.state.lock().expect("state");
        state.pauses = (state.pauses - 1).max(0);
        state.events.push(Event::Resume);
        Ok(())
    }

    fn is_queue_paused(&self) -> Result<bool> {
        Ok(self.state.lock().expect("state").pauses > 0)
    }
}

/// Writes one line per stapled page and counts calls.
#[derive(Default)]
pub struct LineRenderer {
    pub staples: AtomicUsize,
    /// Fail every staple call when set.
    pub fail: bool,
}

impl LineRenderer {
    pub fn staple_calls(&self) -> usize {
        self.staples.load(Ordering::SeqCst)
    }
}

impl PageRenderer for LineRenderer {
    fn page_count(&self, _document: &Path) -> Result<u32> {
        Ok(0)
    }

    fn staple(&self, pages: &[PageSource], output: &Path, cancel: &CancellationToken) -> Result<()> {
        cancel.check()?;
        self.staples.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FolioError::PdfError("renderer broke".into()));
        }
        let body: String = pages
            .iter()
            .map(|p| {
                let name = p.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                format!("{name}#{}@{}\n", p.page_number, p.rotation.degrees())
            })
            .collect();
        std::fs::write(output, body)?;
        Ok(())
    }
}

pub fn config(dir: &Path) -> EngineConfig {
    EngineConfig {
        output_directory: Some(dir.join("out")),
        workflow_id: "wf".into(),
        ..EngineConfig::default()
    }
}

/// A `Document` suggestion node.
pub fn document(pages: &str, deleted: Option<&str>, data: Vec<AttributeNode>) -> AttributeNode {
    let mut children = vec![AttributeNode::leaf("Pages", pages)];
    if let Some(d) = deleted {
        children.push(AttributeNode::leaf("DeletedPages", d));
    }
    if !data.is_empty() {
        children.push(AttributeNode::container("DocumentData", data));
    }
    AttributeNode::container("Document", children)
}

/// Write a data sidecar for `source` and return the source path.
pub fn write_suggestions(config: &EngineConfig, source: &Path, nodes: Vec<AttributeNode>) {
    let data = DocumentData::new(nodes);
    let json = serde_json::to_vec(&data).expect("encode");
    std::fs::write(config.data_sidecar(source), json).expect("write sidecar");
}

pub fn source_path(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::create_dir_all(dir.join("out")).expect("out dir");
    path
}
