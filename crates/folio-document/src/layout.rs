// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR full-text layout — the per-document artifact the OCR collaborator
// writes next to each scanned document.

use folio_core::Rotation;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounds in page pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// One recognised line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub bounds: Bounds,
    /// Mean character confidence, 0-100.
    #[serde(default)]
    pub confidence: u8,
}

/// Layout of a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_number: u32,
    pub width: u32,
    pub height: u32,
    /// Clockwise turn that brings the dominant text upright, as detected by
    /// OCR. `None` when OCR did not report one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_rotation: Option<Rotation>,
    #[serde(default)]
    pub lines: Vec<TextLine>,
}

impl PageLayout {
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Layout of a whole document, pages in ascending order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentLayout {
    pub document_name: String,
    pub pages: Vec<PageLayout>,
}

impl DocumentLayout {
    pub fn new(document_name: impl Into<String>) -> Self {
        Self {
            document_name: document_name.into(),
            pages: Vec::new(),
        }
    }

    pub fn page(&self, page_number: u32) -> Option<&PageLayout> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }

    pub fn detected_rotation(&self, page_number: u32) -> Option<Rotation> {
        self.page(page_number).and_then(|p| p.detected_rotation)
    }

    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(PageLayout::text)
            .collect::<Vec<_>>()
            .join("\n\u{c}\n")
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A layout whose page `n` holds the single line `"page {n}"`.
    pub fn layout(name: &str, pages: &[u32]) -> DocumentLayout {
        DocumentLayout {
            document_name: name.into(),
            pages: pages
                .iter()
                .map(|n| PageLayout {
                    page_number: *n,
                    width: 2550,
                    height: 3300,
                    detected_rotation: None,
                    lines: vec![TextLine {
                        text: format!("{name} page {n}"),
                        bounds: Bounds {
                            left: 100,
                            top: 100 * *n as i32,
                            right: 900,
                            bottom: 100 * *n as i32 + 40,
                        },
                        confidence: 90,
                    }],
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::layout;
    use super::*;

    #[test]
    fn detected_rotation_lookup() {
        let mut doc = layout("a.pdf", &[1, 2]);
        doc.pages[1].detected_rotation = Some(Rotation::Clockwise90);
        assert_eq!(doc.detected_rotation(2), Some(Rotation::Clockwise90));
        assert_eq!(doc.detected_rotation(1), None);
        assert_eq!(doc.detected_rotation(9), None);
    }
}
