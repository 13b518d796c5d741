// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Folio pagination engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::DocumentData;
use crate::error::FolioError;

/// Catalog identifier of a registered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub i64);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one engine run (task session), stamped on ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clockwise page rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Clockwise90 => 90,
            Self::Clockwise180 => 180,
            Self::Clockwise270 => 270,
        }
    }

    /// Normalise any multiple of 90 (negative values included).
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Self::None),
            90 => Some(Self::Clockwise90),
            180 => Some(Self::Clockwise180),
            270 => Some(Self::Clockwise270),
            _ => None,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = FolioError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_degrees(i64::from(value)).ok_or(FolioError::InvalidRotation(i64::from(value)))
    }
}

impl From<Rotation> for u16 {
    fn from(value: Rotation) -> Self {
        value.degrees()
    }
}

/// Identity of a source page: `(document name, 1-based page number)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageKey {
    pub document_name: String,
    pub page_number: u32,
}

impl PageKey {
    pub fn new(document_name: impl Into<String>, page_number: u32) -> Self {
        Self {
            document_name: document_name.into(),
            page_number,
        }
    }
}

impl std::fmt::Display for PageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.document_name, self.page_number)
    }
}

/// One page of a source document as seen by a single resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub document_name: String,
    pub page_number: u32,
    pub deleted: bool,
    /// Rotation to apply when the page is re-rendered.
    pub orientation: Rotation,
}

impl PageRef {
    pub fn new(document_name: impl Into<String>, page_number: u32) -> Self {
        Self {
            document_name: document_name.into(),
            page_number,
            deleted: false,
            orientation: Rotation::None,
        }
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub fn rotated(mut self, orientation: Rotation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn key(&self) -> PageKey {
        PageKey::new(self.document_name.clone(), self.page_number)
    }
}

/// How a page group came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupOrigin {
    /// Rule output suggested the group through a `Document` node.
    Suggested,
    /// No rule suggestion: the whole source document as one group.
    Implicit,
    /// Pages that no suggested group claimed.
    Residual,
}

impl GroupOrigin {
    /// Only rule-suggested groups may be emitted without review.
    pub fn is_auto_eligible(self) -> bool {
        matches!(self, Self::Suggested)
    }
}

/// One candidate logical document inside a source document.
#[derive(Debug, Clone, PartialEq)]
pub struct PageGroup {
    pub pages: Vec<PageRef>,
    pub data: Option<DocumentData>,
    pub origin: GroupOrigin,
    /// Set once the qualification gate has been evaluated.
    pub qualified: Option<bool>,
}

impl PageGroup {
    pub fn new(pages: Vec<PageRef>, origin: GroupOrigin) -> Self {
        Self {
            pages,
            data: None,
            origin,
            qualified: None,
        }
    }

    pub fn with_data(mut self, data: DocumentData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_all_deleted(&self) -> bool {
        !self.pages.is_empty() && self.pages.iter().all(|p| p.deleted)
    }

    /// Pages that will appear in the output, in output order.
    pub fn output_pages(&self) -> impl Iterator<Item = &PageRef> {
        self.pages.iter().filter(|p| !p.deleted)
    }

    pub fn keys(&self) -> Vec<PageKey> {
        self.pages.iter().map(PageRef::key).collect()
    }
}

/// Lifecycle states of a file inside one queue action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Pending -> Processing -> {Completed, Failed, Skipped}.
    ///
    /// A pending file may also be skipped before a worker picks it up.
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Skipped)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Processing, Self::Skipped)
        )
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file as tracked by the shared queue store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileQueueRecord {
    pub file_id: FileId,
    pub file_name: String,
    /// `None` until the file is queued to an action.
    pub current_action: Option<String>,
    pub status: Option<FileStatus>,
    pub priority: i32,
    pub workflow_id: String,
    pub file_size: u64,
    pub page_count: u32,
}

/// Outcome of registering a new output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub file_id: FileId,
    /// Final catalog name; differs from the candidate after a collision.
    pub file_name: String,
}

/// A physical output produced from one page group.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDocument {
    pub file_name: String,
    pub source_pages: Vec<PageRef>,
    pub attributes: DocumentData,
    pub assigned_file_id: FileId,
}

/// One append-only row of pagination history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub source_pages: Vec<PageKey>,
    /// Absent when every source page was deleted.
    pub destination_file_id: Option<FileId>,
    pub session_id: SessionId,
    pub recorded_at: DateTime<Utc>,
    /// SHA-256 of the output file, when one was written.
    pub output_hash: Option<String>,
}

impl LedgerEntry {
    pub fn new(
        source_pages: Vec<PageKey>,
        destination_file_id: Option<FileId>,
        session_id: SessionId,
    ) -> Self {
        Self {
            source_pages,
            destination_file_id,
            session_id,
            recorded_at: Utc::now(),
            output_hash: None,
        }
    }

    pub fn with_output_hash(mut self, hash: impl Into<String>) -> Self {
        self.output_hash = Some(hash.into());
        self
    }
}
