// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page group resolution — turn rule-suggested attribute trees into candidate
// page groups for one source document.
//
// A root made only of `Document` containers is a suggestion: each container
// names its pages (`Pages`), optionally some deleted pages (`DeletedPages`),
// and optionally the group's own attributes (`DocumentData`). Anything else
// means there is no suggestion and the whole source is one implicit group.

use std::collections::HashSet;

use folio_core::error::Result;
use folio_core::{
    AttributeNode, DocumentData, GroupOrigin, PageGroup, PageRef, Rotation, parse_ranges,
};
use folio_document::DocumentLayout;
use tracing::{debug, instrument, warn};

const DOCUMENT_NODE: &str = "Document";
const PAGES_NODE: &str = "Pages";
const DELETED_PAGES_NODE: &str = "DeletedPages";
const DOCUMENT_DATA_NODE: &str = "DocumentData";

/// Builds the page groups of a source document.
#[derive(Debug, Clone, Copy)]
pub struct PageGroupResolver {
    auto_rotate: bool,
}

impl PageGroupResolver {
    pub fn new(auto_rotate: bool) -> Self {
        Self { auto_rotate }
    }

    /// Resolve the groups of `document_name`, a source of `page_count`
    /// pages.
    ///
    /// Every page in `1..=page_count` ends up in exactly one group: pages no
    /// suggested group claims are collected into a trailing residual group.
    #[instrument(skip(self, data, layout))]
    pub fn resolve(
        &self,
        document_name: &str,
        page_count: u32,
        data: Option<&DocumentData>,
        layout: Option<&DocumentLayout>,
    ) -> Result<Vec<PageGroup>> {
        let suggestions = data.filter(|d| is_suggestion(d));

        let Some(data) = suggestions else {
            let pages = (1..=page_count)
                .map(|n| self.page_ref(document_name, n, false, layout))
                .collect();
            let mut group = PageGroup::new(pages, GroupOrigin::Implicit);
            group.data = data.cloned();
            debug!("no suggested grouping, using whole document");
            return Ok(vec![group]);
        };

        let mut claimed: HashSet<u32> = HashSet::new();
        let mut groups = Vec::with_capacity(data.attributes.len());

        for (index, node) in data.attributes.iter().enumerate() {
            let Some(numbers) = self.node_pages(node, index, page_count) else {
                continue;
            };

            let mut pages = Vec::with_capacity(numbers.len());
            for (number, deleted) in numbers {
                if !claimed.insert(number) {
                    warn!(group = index, page = number, "page already claimed by an earlier group");
                    continue;
                }
                pages.push(self.page_ref(document_name, number, deleted, layout));
            }
            if pages.is_empty() {
                warn!(group = index, "suggested group has no usable pages");
                continue;
            }

            let mut group = PageGroup::new(pages, GroupOrigin::Suggested);
            group.data = node
                .child(DOCUMENT_DATA_NODE)
                .map(|d| DocumentData::new(d.children().to_vec()));
            groups.push(group);
        }

        let residual: Vec<PageRef> = (1..=page_count)
            .filter(|n| !claimed.contains(n))
            .map(|n| self.page_ref(document_name, n, false, layout))
            .collect();
        if !residual.is_empty() {
            debug!(pages = residual.len(), "unclaimed pages form a residual group");
            groups.push(PageGroup::new(residual, GroupOrigin::Residual));
        }

        debug!(groups = groups.len(), "groups resolved");
        Ok(groups)
    }

    /// Included pages in order, then deleted-only pages, each flagged.
    /// `None` when the node's ranges cannot be read.
    fn node_pages(&self, node: &AttributeNode, index: usize, page_count: u32) -> Option<Vec<(u32, bool)>> {
        let read = |name: &str| -> Option<Vec<u32>> {
            match node.child(name) {
                None => Some(Vec::new()),
                Some(child) => match parse_ranges(child.value(), page_count) {
                    Ok(pages) => Some(pages),
                    Err(err) => {
                        warn!(group = index, node = name, error = %err, "unreadable page range, group skipped");
                        None
                    }
                },
            }
        };

        let included = read(PAGES_NODE)?;
        let deleted = read(DELETED_PAGES_NODE)?;
        let deleted_set: HashSet<u32> = deleted.iter().copied().collect();

        let mut seen = HashSet::new();
        let pages = included
            .into_iter()
            .chain(deleted)
            .filter(|n| seen.insert(*n))
            .filter(|n| {
                let in_range = (1..=page_count).contains(n);
                if !in_range {
                    warn!(group = index, page = *n, page_count, "page out of range, dropped");
                }
                in_range
            })
            .map(|n| (n, deleted_set.contains(&n)))
            .collect();
        Some(pages)
    }

    fn page_ref(
        &self,
        document_name: &str,
        page_number: u32,
        deleted: bool,
        layout: Option<&DocumentLayout>,
    ) -> PageRef {
        let orientation = if self.auto_rotate {
            layout
                .and_then(|l| l.detected_rotation(page_number))
                .unwrap_or(Rotation::None)
        } else {
            Rotation::None
        };
        PageRef {
            document_name: document_name.to_owned(),
            page_number,
            deleted,
            orientation,
        }
    }
}

fn is_suggestion(data: &DocumentData) -> bool {
    !data.is_empty()
        && data
            .attributes
            .iter()
            .all(|n| n.is_container() && n.name().eq_ignore_ascii_case(DOCUMENT_NODE))
}
