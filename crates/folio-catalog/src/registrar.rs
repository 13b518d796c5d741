// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output registration — insert a new output file name into the shared
// catalog, resolving a name collision with exactly one suffixed retry.

use std::path::Path;
use std::sync::Arc;

use folio_core::error::{FolioError, Result};
use folio_core::{FileCatalog, Registration};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Supplies the short suffix inserted into a colliding name.
pub trait SuffixSource: Send + Sync {
    fn next_suffix(&self) -> String;
}

/// First eight hex digits of a random v4 UUID.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSuffix;

impl SuffixSource for RandomSuffix {
    fn next_suffix(&self) -> String {
        let mut hex = Uuid::new_v4().simple().to_string();
        hex.truncate(8);
        hex
    }
}

/// Metadata registered alongside an output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputMetadata<'a> {
    pub file_size: u64,
    pub page_count: u32,
    pub priority: i32,
    pub workflow_id: &'a str,
}

/// Registers new outputs in a [`FileCatalog`].
pub struct OutputRegistrar {
    catalog: Arc<dyn FileCatalog>,
    suffixes: Arc<dyn SuffixSource>,
}

impl OutputRegistrar {
    pub fn new(catalog: Arc<dyn FileCatalog>) -> Self {
        Self::with_suffix_source(catalog, Arc::new(RandomSuffix))
    }

    pub fn with_suffix_source(catalog: Arc<dyn FileCatalog>, suffixes: Arc<dyn SuffixSource>) -> Self {
        Self { catalog, suffixes }
    }

    /// Register `candidate`, or a suffixed variant of it if the name is
    /// taken.
    ///
    /// The existing entry is never touched. A second collision is returned
    /// as [`FolioError::Configuration`] and not retried.
    #[instrument(skip(self, meta), fields(workflow = meta.workflow_id))]
    pub fn register(&self, candidate: &str, meta: &OutputMetadata<'_>) -> Result<Registration> {
        match self.try_insert(candidate, meta) {
            Err(FolioError::Collision(_)) => {}
            other => return other,
        }

        let retry = suffixed_name(candidate, &self.suffixes.next_suffix());
        warn!(%candidate, %retry, "output name taken, retrying with suffix");

        match self.try_insert(&retry, meta) {
            Err(FolioError::Collision(_)) => Err(FolioError::Configuration(format!(
                "output name collided twice: '{candidate}' and '{retry}'"
            ))),
            other => other,
        }
    }

    fn try_insert(&self, name: &str, meta: &OutputMetadata<'_>) -> Result<Registration> {
        let file_id = self.catalog.add_file_no_queue(
            name,
            meta.file_size,
            meta.page_count,
            meta.priority,
            meta.workflow_id,
        )?;
        info!(%file_id, file = name, "output registered");
        Ok(Registration {
            file_id,
            file_name: name.to_owned(),
        })
    }
}

/// `dir/stem.ext` becomes `dir/stem_<suffix>.ext`.
pub fn suffixed_name(name: &str, suffix: &str) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = match path.extension() {
        Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join(file).to_string_lossy().into_owned()
        }
        _ => file,
    }
}
