// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-group results of one document pass.

use folio_core::{FileId, GroupOrigin, SessionId};
use serde::{Deserialize, Serialize};

/// Why a group was left for review instead of being emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DeferReason {
    /// Not a rule-suggested group.
    NotSuggested,
    /// The qualification gate said no.
    NotQualified,
    /// The formatting panel reported a fault for this group.
    FormattingFault(String),
    /// The qualification gate itself failed for this group.
    QualificationFault(String),
}

/// What happened to one page group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GroupOutcome {
    Emitted { file_id: FileId, file_name: String },
    /// Every page was deleted; recorded without an output.
    Deleted,
    /// Recorded by an earlier run.
    AlreadyHandled,
    Deferred(DeferReason),
}

impl GroupOutcome {
    /// Whether the group needs no further attention.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::Deferred(_))
    }
}

/// One group's line in a [`ProcessReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    pub index: usize,
    pub origin: GroupOrigin,
    pub first_page: Option<u32>,
    pub page_count: usize,
    pub outcome: GroupOutcome,
}

/// Result of processing one source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub file_id: FileId,
    pub document: String,
    pub session_id: SessionId,
    pub groups: Vec<GroupReport>,
    /// Every group was emitted, deleted or already handled.
    pub fully_handled: bool,
    /// The source was moved on to the configured source action.
    pub rerouted: bool,
}

impl ProcessReport {
    pub fn emitted(&self) -> impl Iterator<Item = (FileId, &str)> {
        self.groups.iter().filter_map(|g| match &g.outcome {
            GroupOutcome::Emitted { file_id, file_name } => Some((*file_id, file_name.as_str())),
            _ => None,
        })
    }

    pub fn deferred(&self) -> usize {
        self.groups.iter().filter(|g| !g.outcome.is_handled()).count()
    }
}
