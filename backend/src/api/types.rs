//! REST API types for frontend integration.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::form::{FormItem, FormOutcome};
use crate::models::{CollectedFormData, ExperimentBaseMetadata, RowTable, TemplateMetadata};
use crate::parser::TemplateFormat;
use crate::session::{Session, WorkingSet};

/// Response to a template or preset upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    pub request_id: String,
    pub file_name: String,
    pub format: Option<TemplateFormat>,
    pub template_metadata: TemplateMetadata,
    /// Restored from a preset
    pub metadata_base: Option<ExperimentBaseMetadata>,
    pub form_data: CollectedFormData,
    pub dataframe_metadata: Option<RowTable>,
    pub field_count: usize,
}

impl TemplateResponse {
    /// Snapshot of a freshly loaded session.
    pub fn from_session(file_name: impl Into<String>, session: &Session) -> Option<Self> {
        let template = session.template().ok()?;
        Some(Self {
            request_id: Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            format: session.template_format(),
            template_metadata: template.clone(),
            metadata_base: session.base().ok().cloned(),
            form_data: session.form_data().clone(),
            dataframe_metadata: session.table().cloned(),
            field_count: template.extra_fields.len(),
        })
    }
}

/// Form generation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRequest {
    pub template_metadata: TemplateMetadata,
    #[serde(default)]
    pub form_data: CollectedFormData,
    #[serde(default)]
    pub disabled: bool,
}

/// Generated form: ordered layout plus committed values.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse {
    pub items: Vec<FormItem>,
    pub form_data: CollectedFormData,
    pub valid: bool,
    pub missing_required: Vec<String>,
    pub invalid_fields: Vec<String>,
}

impl FormResponse {
    pub fn new(outcome: FormOutcome, form_data: CollectedFormData, invalid_fields: Vec<String>) -> Self {
        let missing_required = outcome.missing_required().into_iter().map(str::to_string).collect();
        Self {
            valid: outcome.is_valid() && invalid_fields.is_empty(),
            items: outcome.items,
            form_data,
            missing_required,
            invalid_fields,
        }
    }
}

/// New technique for the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechniqueRequest {
    pub code: String,
    #[serde(default)]
    pub french_name: String,
    pub english_name: String,
}

/// `session` part of an export upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(flatten)]
    pub working_set: WorkingSet,
    #[serde(default)]
    pub grouped: bool,
    /// Columns for generated filenames; original names when absent
    #[serde(default)]
    pub filename_columns: Option<Vec<String>>,
    /// Map uploads onto rows by identifier/sample instead of trusting `Filename`
    #[serde(default = "default_true")]
    pub match_files: bool,
}

fn default_true() -> bool {
    true
}

/// Query of `GET /api/templates`.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreQuery {
    #[serde(default = "default_kind")]
    pub kind: crate::cache::StoreKind,
}

fn default_kind() -> crate::cache::StoreKind {
    crate::cache::StoreKind::Templates
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "requestId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}
