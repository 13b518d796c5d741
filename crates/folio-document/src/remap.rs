// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spatial remapping — carry OCR layout and attribute anchors from source page
// space into the page space of a newly assembled output document.
//
// Everything here is a pure function of its inputs: nothing is read from or
// written to disk, and the inputs are never modified.

use std::collections::HashMap;

use folio_core::error::{FolioError, Result};
use folio_core::{DocumentData, PageKey, PageRef, Rotation, SpatialRef};
use tracing::{debug, instrument, trace};

use crate::layout::{DocumentLayout, PageLayout};

/// One source page and the page number it takes in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMapping {
    pub source: PageKey,
    pub destination_page: u32,
    /// Rotation the assembler applied to the page on its way out.
    pub applied_rotation: Rotation,
}

impl PageMapping {
    pub fn new(source: PageKey, destination_page: u32) -> Self {
        Self {
            source,
            destination_page,
            applied_rotation: Rotation::None,
        }
    }
}

/// Ordered mapping from source pages to destination page numbers.
///
/// Sources and destinations are both unique, so the map is a bijection
/// between the listed source pages and the listed destination pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMap {
    destination_document: String,
    mappings: Vec<PageMapping>,
    index: HashMap<PageKey, u32>,
}

impl PageMap {
    /// Build a map from explicit mappings.
    pub fn new(destination_document: impl Into<String>, mappings: Vec<PageMapping>) -> Result<Self> {
        let mut index = HashMap::with_capacity(mappings.len());
        let mut destinations = std::collections::HashSet::with_capacity(mappings.len());

        for m in &mappings {
            if m.destination_page == 0 {
                return Err(FolioError::InvalidPageMap(format!(
                    "{} maps to page 0",
                    m.source
                )));
            }
            if !destinations.insert(m.destination_page) {
                return Err(FolioError::InvalidPageMap(format!(
                    "destination page {} assigned twice",
                    m.destination_page
                )));
            }
            if index.insert(m.source.clone(), m.destination_page).is_some() {
                return Err(FolioError::InvalidPageMap(format!(
                    "source page {} mapped twice",
                    m.source
                )));
            }
        }

        Ok(Self {
            destination_document: destination_document.into(),
            mappings,
            index,
        })
    }

    /// Map the non-deleted pages of a group to destination pages `1..=n` in
    /// group order.
    pub fn from_pages(destination_document: impl Into<String>, pages: &[PageRef]) -> Result<Self> {
        let mappings = pages
            .iter()
            .filter(|p| !p.deleted)
            .enumerate()
            .map(|(i, p)| PageMapping {
                source: p.key(),
                destination_page: i as u32 + 1,
                applied_rotation: p.orientation,
            })
            .collect();
        Self::new(destination_document, mappings)
    }

    /// The identity map over this map's destination pages: every
    /// `(destination document, d)` maps to `d`.
    pub fn identity_on_destination(&self) -> PageMap {
        let mappings = self
            .mappings
            .iter()
            .map(|m| {
                PageMapping::new(
                    PageKey::new(self.destination_document.clone(), m.destination_page),
                    m.destination_page,
                )
            })
            .collect::<Vec<_>>();
        let index = mappings
            .iter()
            .map(|m| (m.source.clone(), m.destination_page))
            .collect();
        PageMap {
            destination_document: self.destination_document.clone(),
            mappings,
            index,
        }
    }

    pub fn destination_document(&self) -> &str {
        &self.destination_document
    }

    pub fn mappings(&self) -> &[PageMapping] {
        &self.mappings
    }

    pub fn destination_of(&self, document_name: &str, page_number: u32) -> Option<u32> {
        self.index
            .get(&PageKey::new(document_name, page_number))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Mappings sorted by destination page.
    fn in_destination_order(&self) -> Vec<&PageMapping> {
        let mut ordered: Vec<&PageMapping> = self.mappings.iter().collect();
        ordered.sort_by_key(|m| m.destination_page);
        ordered
    }
}

/// The two artifacts derived for an output document.
#[derive(Debug, Clone, PartialEq)]
pub struct RemapOutput {
    pub layout: DocumentLayout,
    pub data: DocumentData,
}

/// Re-derive layout and re-anchor attributes through `map`.
///
/// `layouts` holds the source layouts keyed by document name. Source pages
/// without layout are left out of the new layout rather than padded.
#[instrument(skip_all, fields(destination = %map.destination_document(), pages = map.len()))]
pub fn remap(
    map: &PageMap,
    layouts: &HashMap<String, DocumentLayout>,
    data: &DocumentData,
) -> RemapOutput {
    let layout = remap_layout(map, layouts);
    let data = remap_data(map, data);
    debug!(layout_pages = layout.pages.len(), "remap complete");
    RemapOutput { layout, data }
}

/// Build the output layout: each mapped page that has layout, relabelled
/// with its destination number, in destination order.
///
/// A page the assembler rotated is already upright in the output, so its
/// detected rotation is not carried over.
pub fn remap_layout(map: &PageMap, layouts: &HashMap<String, DocumentLayout>) -> DocumentLayout {
    let mut out = DocumentLayout::new(map.destination_document());

    for m in map.in_destination_order() {
        let source_page = layouts
            .get(&m.source.document_name)
            .and_then(|l| l.page(m.source.page_number));

        match source_page {
            Some(page) => out.pages.push(PageLayout {
                page_number: m.destination_page,
                detected_rotation: match m.applied_rotation {
                    Rotation::None => page.detected_rotation,
                    _ => None,
                },
                ..page.clone()
            }),
            None => trace!(source = %m.source, "no layout for page, omitted"),
        }
    }

    out
}

/// Re-anchor every spatial reference of `data` through `map`.
///
/// Geometry is copied unchanged; only the page number and document name
/// move. Zones on unmapped pages are dropped, and an anchor left with no
/// zones is removed while its attribute value is kept.
pub fn remap_data(map: &PageMap, data: &DocumentData) -> DocumentData {
    data.map_spatial(|anchor| remap_anchor(map, anchor))
}

fn remap_anchor(map: &PageMap, anchor: &SpatialRef) -> Option<SpatialRef> {
    let zones: Vec<_> = anchor
        .zones
        .iter()
        .filter_map(|z| {
            map.destination_of(&anchor.document_name, z.page_number)
                .map(|page_number| folio_core::RasterZone { page_number, ..*z })
        })
        .collect();

    if zones.is_empty() {
        return None;
    }

    Some(SpatialRef {
        document_name: map.destination_document().to_owned(),
        zones,
    })
}
