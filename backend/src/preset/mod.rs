//! `.elablite` preset container.
//!
//! A preset bundles the whole working set of a session into one binary
//! file (MessagePack, fields by name):
//!
//! ```text
//! {
//!   "@context":           "http://example.org/elablite/v1.0/",
//!   "metadata_base":      ExperimentBaseMetadata,
//!   "form_data":          CollectedFormData,
//!   "template_metadata":  TemplateMetadata,
//!   "dataframe_metadata": RowTable
//! }
//! ```
//!
//! The context tag is compared verbatim on read; any mismatch or decoding
//! failure is a corruption error, never a partial recovery.

use serde::{Deserialize, Serialize};

use crate::config::ELABLITE_CONTEXT;
use crate::error::{PresetError, PresetResult};
use crate::models::{CollectedFormData, ExperimentBaseMetadata, RowTable, TemplateMetadata};

/// MIME type of a preset download.
pub const ELABLITE_MIME: &str = "application/octet-stream";

/// File extension of presets.
pub const ELABLITE_EXTENSION: &str = "elablite";

/// The serialized working set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetContainer {
    #[serde(rename = "@context")]
    pub context: String,
    pub metadata_base: ExperimentBaseMetadata,
    pub form_data: CollectedFormData,
    pub template_metadata: TemplateMetadata,
    pub dataframe_metadata: RowTable,
}

impl PresetContainer {
    /// Wrap the four artifacts with the current context tag.
    pub fn new(
        metadata_base: ExperimentBaseMetadata,
        form_data: CollectedFormData,
        template_metadata: TemplateMetadata,
        dataframe_metadata: RowTable,
    ) -> Self {
        Self {
            context: ELABLITE_CONTEXT.to_string(),
            metadata_base,
            form_data,
            template_metadata,
            dataframe_metadata,
        }
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> PresetResult<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| PresetError::Encode(e.to_string()))
    }

    /// Deserialize and check the context tag.
    pub fn from_bytes(bytes: &[u8]) -> PresetResult<Self> {
        let container: Self = rmp_serde::from_slice(bytes).map_err(|e| PresetError::Corrupted(e.to_string()))?;
        if container.context != ELABLITE_CONTEXT {
            return Err(PresetError::Corrupted(format!("unexpected context '{}'", container.context)));
        }
        Ok(container)
    }
}

/// Serialize a session's working set into `.elablite` bytes.
pub fn create_elablite(
    metadata_base: &ExperimentBaseMetadata,
    form_data: &CollectedFormData,
    template_metadata: &TemplateMetadata,
    dataframe_metadata: &RowTable,
) -> PresetResult<Vec<u8>> {
    PresetContainer::new(
        metadata_base.clone(),
        form_data.clone(),
        template_metadata.clone(),
        dataframe_metadata.clone(),
    )
    .to_bytes()
}

/// Parse `.elablite` bytes.
pub fn read_elablite(bytes: &[u8]) -> PresetResult<PresetContainer> {
    PresetContainer::from_bytes(bytes)
}

/// Suggested download name: `<YYYYMMDD>_<title>.elablite`.
pub fn preset_filename(metadata_base: &ExperimentBaseMetadata) -> String {
    let title: String = metadata_base
        .title
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let date = metadata_base.date.format("%Y%m%d");
    if title.is_empty() {
        format!("{}.{}", date, ELABLITE_EXTENSION)
    } else {
        format!("{}_{}.{}", date, title, ELABLITE_EXTENSION)
    }
}
