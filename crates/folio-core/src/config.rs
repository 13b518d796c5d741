// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Settings for one pagination task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory for new output documents. `None` writes next to the source.
    pub output_directory: Option<PathBuf>,
    /// Output file name template. Placeholders: `{stem}`, `{group}`,
    /// `{first}`, `{last}`, `{ext}`.
    pub output_name_template: String,
    /// Queue action new output documents are sent to.
    pub output_action: String,
    /// Queue action this engine runs as.
    pub processing_action: String,
    /// Action a fully paginated source is rerouted to (cleanup/archival).
    pub source_action: Option<String>,
    /// Workflow that owns the queue actions above.
    pub workflow_id: String,
    /// Rotate output pages by the OCR-detected orientation.
    pub auto_rotate: bool,
    /// Suffix appended to a document path for its attribute sidecar.
    pub data_sidecar_suffix: String,
    /// Suffix appended to a document path for its OCR layout sidecar.
    pub layout_sidecar_suffix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_directory: None,
            output_name_template: "{stem}_{first}-{last}.{ext}".into(),
            output_action: "Index".into(),
            processing_action: "Paginate".into(),
            source_action: None,
            workflow_id: "default".into(),
            auto_rotate: true,
            data_sidecar_suffix: ".data.json".into(),
            layout_sidecar_suffix: ".layout.json".into(),
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file. Missing keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_name_template.trim().is_empty() {
            return Err(FolioError::Configuration(
                "output_name_template must not be empty".into(),
            ));
        }
        if self.output_action.is_empty() || self.processing_action.is_empty() {
            return Err(FolioError::Configuration(
                "output_action and processing_action are required".into(),
            ));
        }
        if self.source_action.as_deref() == Some(self.processing_action.as_str()) {
            return Err(FolioError::Configuration(
                "source_action must differ from processing_action".into(),
            ));
        }
        if self.data_sidecar_suffix == self.layout_sidecar_suffix {
            return Err(FolioError::Configuration(
                "data and layout sidecars need distinct suffixes".into(),
            ));
        }
        Ok(())
    }

    /// Sidecar path for the attribute tree of `document`.
    pub fn data_sidecar(&self, document: &Path) -> PathBuf {
        append_suffix(document, &self.data_sidecar_suffix)
    }

    /// Sidecar path for the OCR layout of `document`.
    pub fn layout_sidecar(&self, document: &Path) -> PathBuf {
        append_suffix(document, &self.layout_sidecar_suffix)
    }

    /// Expand the output name template for one group.
    pub fn output_name(&self, source: &Path, group: usize, first: u32, last: u32) -> String {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".into());
        let ext = source
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pdf".into());

        self.output_name_template
            .replace("{stem}", &stem)
            .replace("{group}", &group.to_string())
            .replace("{first}", &first.to_string())
            .replace("{last}", &last.to_string())
            .replace("{ext}", &ext)
    }
}

fn append_suffix(document: &Path, suffix: &str) -> PathBuf {
    let mut name = document.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
