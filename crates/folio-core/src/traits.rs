// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage-agnostic trait definitions for the shared queue store.
//
// The engine never touches queue storage directly: it requests transitions
// and inserts through these traits, and the store applies them atomically.

use crate::error::{FolioError, Result};
use crate::types::{FileId, FileQueueRecord, FileStatus, LedgerEntry};

/// Modifiers for a status transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionFlags {
    /// Allow moving a file to another action while it is processing.
    pub allow_queue_change_while_processing: bool,
    /// Skip the state machine check entirely.
    pub allow_status_override: bool,
}

impl TransitionFlags {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn while_processing() -> Self {
        Self {
            allow_queue_change_while_processing: true,
            allow_status_override: false,
        }
    }

    pub fn override_status() -> Self {
        Self {
            allow_queue_change_while_processing: true,
            allow_status_override: true,
        }
    }
}

/// Validate a transition request against the file's current record.
///
/// Stores call this inside their own atomic section so the check and the
/// write cannot interleave with another worker.
pub fn check_transition(
    record: &FileQueueRecord,
    target_action: &str,
    new_status: FileStatus,
    flags: TransitionFlags,
) -> Result<()> {
    let same_action = record.current_action.as_deref() == Some(target_action);

    match (record.status, same_action) {
        (Some(FileStatus::Processing), false) if !flags.allow_queue_change_while_processing => {
            Err(FolioError::QueueConflict {
                file_id: record.file_id.0,
                action: record.current_action.clone().unwrap_or_default(),
            })
        }
        _ if flags.allow_status_override => Ok(()),
        (Some(current), true) if !current.can_transition_to(new_status) => {
            Err(FolioError::InvalidTransition {
                file_id: record.file_id.0,
                from: current.to_string(),
                to: new_status.to_string(),
            })
        }
        (None, true) | (_, false) if new_status != FileStatus::Pending => {
            Err(FolioError::InvalidTransition {
                file_id: record.file_id.0,
                from: record
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unqueued".into()),
                to: new_status.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// The shared catalog of files known to the processing pipeline.
pub trait FileCatalog: Send + Sync {
    /// Register a file without queueing it to any action.
    ///
    /// Returns [`FolioError::Collision`] when the name is already taken; the
    /// existing entry is never overwritten.
    fn add_file_no_queue(
        &self,
        file_name: &str,
        file_size: u64,
        page_count: u32,
        priority: i32,
        workflow_id: &str,
    ) -> Result<FileId>;

    /// Atomically validate and apply a status transition.
    fn set_status_for_file(
        &self,
        file_id: FileId,
        action: &str,
        workflow_id: &str,
        status: FileStatus,
        flags: TransitionFlags,
    ) -> Result<()>;

    fn get_file_id(&self, file_name: &str) -> Result<Option<FileId>>;

    fn get_file(&self, file_id: FileId) -> Result<Option<FileQueueRecord>>;

    /// Highest priority among the named files, if any are registered.
    fn max_priority(&self, file_names: &[String]) -> Result<Option<i32>>;
}

/// Durable, append-only storage for pagination history.
pub trait LedgerStore: Send + Sync {
    fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<()>;

    /// Every entry that references a page of `document_name`.
    fn ledger_entries_for(&self, document_name: &str) -> Result<Vec<LedgerEntry>>;
}

/// Pause switch observed by live queue pollers.
pub trait QueueControl: Send + Sync {
    fn pause_queue(&self) -> Result<()>;

    fn resume_queue(&self) -> Result<()>;

    fn is_queue_paused(&self) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(action: Option<&str>, status: Option<FileStatus>) -> FileQueueRecord {
        FileQueueRecord {
            file_id: FileId(1),
            file_name: "a.pdf".into(),
            current_action: action.map(str::to_owned),
            status,
            priority: 0,
            workflow_id: "wf".into(),
            file_size: 0,
            page_count: 1,
        }
    }

    #[test]
    fn unqueued_file_may_enter_as_pending() {
        let rec = record(None, None);
        assert!(check_transition(&rec, "Index", FileStatus::Pending, TransitionFlags::strict()).is_ok());
        assert!(
            check_transition(&rec, "Index", FileStatus::Completed, TransitionFlags::strict()).is_err()
        );
    }

    #[test]
    fn same_action_follows_state_machine() {
        let rec = record(Some("Paginate"), Some(FileStatus::Processing));
        assert!(
            check_transition(&rec, "Paginate", FileStatus::Completed, TransitionFlags::strict()).is_ok()
        );
        let done = record(Some("Paginate"), Some(FileStatus::Completed));
        assert!(matches!(
            check_transition(&done, "Paginate", FileStatus::Processing, TransitionFlags::strict()),
            Err(FolioError::InvalidTransition { .. })
        ));
        assert!(
            check_transition(&done, "Paginate", FileStatus::Pending, TransitionFlags::override_status())
                .is_ok()
        );
    }

    #[test]
    fn rerouting_a_processing_file_needs_the_flag() {
        let rec = record(Some("Paginate"), Some(FileStatus::Processing));
        assert!(matches!(
            check_transition(&rec, "Archive", FileStatus::Pending, TransitionFlags::strict()),
            Err(FolioError::QueueConflict { .. })
        ));
        assert!(
            check_transition(&rec, "Archive", FileStatus::Pending, TransitionFlags::while_processing())
                .is_ok()
        );
        assert!(
            check_transition(&rec, "Archive", FileStatus::Completed, TransitionFlags::while_processing())
                .is_err()
        );
    }
}
