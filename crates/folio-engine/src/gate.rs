// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Qualification gates — decide whether a page group is emitted automatically
// or left for human review.

use std::collections::BTreeMap;

use folio_core::error::Result;
use folio_core::{FileId, PageGroup};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Facts about the run a gate may consult besides the group itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualificationContext {
    pub source_document: String,
    pub source_file_id: Option<FileId>,
    pub workflow_id: String,
    /// Free-form values supplied by the host (batch id, operator, ...).
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Predicate run on each formatted group that still has a page to emit.
pub trait QualificationGate: Send + Sync {
    fn qualifies(
        &self,
        group: &PageGroup,
        proposed_output_file_name: &str,
        context: &QualificationContext,
    ) -> Result<bool>;
}

/// Qualifies every group.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysQualify;

impl QualificationGate for AlwaysQualify {
    fn qualifies(&self, _: &PageGroup, _: &str, _: &QualificationContext) -> Result<bool> {
        Ok(true)
    }
}

/// Qualifies a group when each named attribute is present in its data with
/// a non-blank value. Names match case-insensitively at any depth.
#[derive(Debug, Clone, Default)]
pub struct RequiredAttributesGate {
    required: Vec<String>,
}

impl RequiredAttributesGate {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
        }
    }
}

impl QualificationGate for RequiredAttributesGate {
    fn qualifies(&self, group: &PageGroup, proposed: &str, _: &QualificationContext) -> Result<bool> {
        let Some(data) = &group.data else {
            return Ok(self.required.is_empty());
        };
        let missing = self.required.iter().find(|name| {
            data.find(name)
                .map(|node| node.value().trim().is_empty())
                .unwrap_or(true)
        });
        if let Some(name) = missing {
            debug!(attribute = %name, output = proposed, "required attribute missing");
        }
        Ok(missing.is_none())
    }
}

/// Adapts a closure into a gate.
pub struct FnGate<F>(pub F);

impl<F> QualificationGate for FnGate<F>
where
    F: Fn(&PageGroup, &str, &QualificationContext) -> Result<bool> + Send + Sync,
{
    fn qualifies(&self, group: &PageGroup, proposed: &str, context: &QualificationContext) -> Result<bool> {
        (self.0)(group, proposed, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{AttributeNode, DocumentData, FolioError, GroupOrigin, PageRef};

    fn group(data: Option<DocumentData>) -> PageGroup {
        let mut g = PageGroup::new(vec![PageRef::new("a.pdf", 1)], GroupOrigin::Suggested);
        g.data = data;
        g
    }

    #[test]
    fn required_attributes_need_non_blank_values() {
        let gate = RequiredAttributesGate::new(["InvoiceNumber", "Vendor"]);
        let ctx = QualificationContext::default();

        let complete = DocumentData::new(vec![AttributeNode::container(
            "Header",
            vec![
                AttributeNode::leaf("invoicenumber", "INV-7"),
                AttributeNode::leaf("Vendor", "Acme"),
            ],
        )]);
        assert!(gate.qualifies(&group(Some(complete)), "out.pdf", &ctx).unwrap());

        let blank = DocumentData::new(vec![
            AttributeNode::leaf("InvoiceNumber", "INV-7"),
            AttributeNode::leaf("Vendor", "  "),
        ]);
        assert!(!gate.qualifies(&group(Some(blank)), "out.pdf", &ctx).unwrap());
        assert!(!gate.qualifies(&group(None), "out.pdf", &ctx).unwrap());
    }

    #[test]
    fn fn_gate_sees_proposed_name_and_context() {
        let gate = FnGate(|_: &PageGroup, name: &str, ctx: &QualificationContext| {
            if ctx.workflow_id.is_empty() {
                return Err(FolioError::Qualification("no workflow".into()));
            }
            Ok(name.ends_with(".pdf"))
        });
        let ctx = QualificationContext {
            workflow_id: "wf".into(),
            ..Default::default()
        };
        assert!(gate.qualifies(&group(None), "x.pdf", &ctx).unwrap());
        assert!(!gate.qualifies(&group(None), "x.tif", &ctx).unwrap());
        assert!(gate
            .qualifies(&group(None), "x.pdf", &QualificationContext::default())
            .is_err());
    }
}
