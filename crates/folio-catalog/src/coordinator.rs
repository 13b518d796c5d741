// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Queue coordination — status transitions, rerouting, and scoped pausing of
// the live polling queue.

use std::sync::Arc;

use folio_core::error::Result;
use folio_core::{FileCatalog, FileId, FileStatus, QueueControl, TransitionFlags};
use tracing::{debug, info, instrument, warn};

/// Requests queue changes from the store; never writes storage directly.
#[derive(Clone)]
pub struct QueueCoordinator {
    catalog: Arc<dyn FileCatalog>,
    control: Arc<dyn QueueControl>,
}

impl QueueCoordinator {
    pub fn new(catalog: Arc<dyn FileCatalog>, control: Arc<dyn QueueControl>) -> Self {
        Self { catalog, control }
    }

    /// Move `file_id` to `target_action` with `new_status`.
    #[instrument(skip(self))]
    pub fn transition(
        &self,
        file_id: FileId,
        target_action: &str,
        workflow_id: &str,
        new_status: FileStatus,
        allow_queue_change_while_processing: bool,
        allow_status_override: bool,
    ) -> Result<()> {
        let flags = TransitionFlags {
            allow_queue_change_while_processing,
            allow_status_override,
        };
        self.catalog
            .set_status_for_file(file_id, target_action, workflow_id, new_status, flags)?;
        debug!("transition applied");
        Ok(())
    }

    /// Send a processing file on to `alternate_action` as Pending without
    /// completing it in its current action.
    #[instrument(skip(self))]
    pub fn reroute(&self, file_id: FileId, alternate_action: &str, workflow_id: &str) -> Result<()> {
        self.catalog.set_status_for_file(
            file_id,
            alternate_action,
            workflow_id,
            FileStatus::Pending,
            TransitionFlags::while_processing(),
        )?;
        info!("file rerouted");
        Ok(())
    }

    /// Pause the queue until the returned guard is dropped.
    pub fn pause(&self) -> Result<QueuePause> {
        self.control.pause_queue()?;
        debug!("queue paused");
        Ok(QueuePause {
            control: Arc::clone(&self.control),
        })
    }
}

/// Keeps the queue paused while alive.
#[must_use = "the queue resumes as soon as the guard is dropped"]
pub struct QueuePause {
    control: Arc<dyn QueueControl>,
}

impl Drop for QueuePause {
    fn drop(&mut self) {
        match self.control.resume_queue() {
            Ok(()) => debug!("queue resumed"),
            Err(err) => warn!(error = %err, "failed to resume queue"),
        }
    }
}
