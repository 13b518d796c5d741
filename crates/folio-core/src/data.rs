// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hierarchical attribute tree produced by extraction rules.
//
// Each node owns its children outright; there are no parent links, so the
// tree can be cloned, rewritten and serialised without graph bookkeeping.

use serde::{Deserialize, Serialize};

/// A rectangular (possibly skewed) region on one page.
///
/// The zone runs from `start` to `end` along its centre line and extends
/// `height` pixels perpendicular to it, in page pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RasterZone {
    pub page_number: u32,
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
    pub height: i32,
}

/// Spatial anchor of an attribute value in a document's page space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialRef {
    pub document_name: String,
    pub zones: Vec<RasterZone>,
}

impl SpatialRef {
    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.zones.iter().map(|z| z.page_number)
    }
}

/// One node of the attribute tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum AttributeNode {
    Container {
        name: String,
        #[serde(default)]
        kind: String,
        #[serde(default)]
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spatial: Option<SpatialRef>,
        #[serde(default)]
        children: Vec<AttributeNode>,
    },
    Leaf {
        name: String,
        #[serde(default)]
        kind: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spatial: Option<SpatialRef>,
    },
}

impl AttributeNode {
    pub fn leaf(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Leaf {
            name: name.into(),
            kind: String::new(),
            value: value.into(),
            spatial: None,
        }
    }

    pub fn container(name: impl Into<String>, children: Vec<AttributeNode>) -> Self {
        Self::Container {
            name: name.into(),
            kind: String::new(),
            value: String::new(),
            spatial: None,
            children,
        }
    }

    /// Attach a spatial anchor, replacing any existing one.
    pub fn with_spatial(mut self, anchor: SpatialRef) -> Self {
        match &mut self {
            Self::Container { spatial, .. } | Self::Leaf { spatial, .. } => {
                *spatial = Some(anchor);
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Container { name, .. } | Self::Leaf { name, .. } => name,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Container { value, .. } | Self::Leaf { value, .. } => value,
        }
    }

    pub fn spatial(&self) -> Option<&SpatialRef> {
        match self {
            Self::Container { spatial, .. } | Self::Leaf { spatial, .. } => spatial.as_ref(),
        }
    }

    pub fn children(&self) -> &[AttributeNode] {
        match self {
            Self::Container { children, .. } => children,
            Self::Leaf { .. } => &[],
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container { .. })
    }

    /// First direct child with the given name (case-insensitive).
    pub fn child(&self, name: &str) -> Option<&AttributeNode> {
        self.children()
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Rebuild this node with every spatial anchor passed through `f`.
    ///
    /// The original is left untouched.
    pub fn map_spatial<F>(&self, f: &mut F) -> AttributeNode
    where
        F: FnMut(&SpatialRef) -> Option<SpatialRef>,
    {
        match self {
            Self::Container {
                name,
                kind,
                value,
                spatial,
                children,
            } => Self::Container {
                name: name.clone(),
                kind: kind.clone(),
                value: value.clone(),
                spatial: spatial.as_ref().and_then(|s| f(s)),
                children: children.iter().map(|c| c.map_spatial(&mut *f)).collect(),
            },
            Self::Leaf {
                name,
                kind,
                value,
                spatial,
            } => Self::Leaf {
                name: name.clone(),
                kind: kind.clone(),
                value: value.clone(),
                spatial: spatial.as_ref().and_then(|s| f(s)),
            },
        }
    }
}

/// The root of an attribute tree: an ordered list of top-level nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentData {
    pub attributes: Vec<AttributeNode>,
}

impl DocumentData {
    pub fn new(attributes: Vec<AttributeNode>) -> Self {
        Self { attributes }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Depth-first search for the first node with `name`.
    pub fn find(&self, name: &str) -> Option<&AttributeNode> {
        fn walk<'a>(nodes: &'a [AttributeNode], name: &str) -> Option<&'a AttributeNode> {
            for node in nodes {
                if node.name().eq_ignore_ascii_case(name) {
                    return Some(node);
                }
                if let Some(found) = walk(node.children(), name) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.attributes, name)
    }

    /// Rebuild the tree with every spatial anchor passed through `f`.
    pub fn map_spatial<F>(&self, mut f: F) -> DocumentData
    where
        F: FnMut(&SpatialRef) -> Option<SpatialRef>,
    {
        DocumentData {
            attributes: self
                .attributes
                .iter()
                .map(|a| a.map_spatial(&mut f))
                .collect(),
        }
    }
}
