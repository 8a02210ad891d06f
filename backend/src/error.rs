//! Error types for the ElabLite metadata pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`TemplateError`] - Template/preset file reading errors
//! - [`SchemaError`] - Field schema errors (fatal, the form cannot render)
//! - [`ExportError`] - CSV generation, file grouping and archive errors
//! - [`PresetError`] - `.elablite` container errors
//! - [`CatalogError`] - Technique catalog errors
//! - [`StoreError`] - Temporary template store errors
//! - [`SessionError`] - Top-level session orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::session::Step;

// =============================================================================
// Template Reading Errors
// =============================================================================

/// Errors while detecting or parsing a template file.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// File extension is not one of json/csv/eln/elablite.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// File could be read but its content is invalid.
    #[error("The file is invalid or corrupted: {0}")]
    Corrupted(String),

    /// Format is recognised but reading it is not implemented.
    #[error("{0} format not yet available")]
    NotAvailable(&'static str),

    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Preset container error.
    #[error(transparent)]
    Preset(#[from] PresetError),
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors in a template's field schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// `type` is not one of the supported field types.
    #[error("Unknown type '{kind}' for field '{field}'")]
    UnknownFieldType { field: String, kind: String },

    /// Field name collides with a reserved row table column.
    #[error("Field name '{0}' is reserved")]
    ReservedName(String),

    /// A raw config key needed to render the field is missing.
    #[error("Field '{field}' is missing '{key}'")]
    MissingKey { field: String, key: &'static str },
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors during CSV generation, renaming and archiving.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Row table lacks a column the operation needs.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Column reserved for export bookkeeping was selected for filenames.
    #[error("Column cannot be used in a filename: {0}")]
    ExcludedColumn(String),

    /// Template schema error.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// IO error.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Zip writer error.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Preset Errors
// =============================================================================

/// Errors from the `.elablite` container.
#[derive(Debug, Error)]
pub enum PresetError {
    /// Tag mismatch or undecodable content.
    #[error("The file is invalid or corrupted: {0}")]
    Corrupted(String),

    /// Serialization failed.
    #[error("Failed to encode preset: {0}")]
    Encode(String),
}

// =============================================================================
// Catalog Errors
// =============================================================================

/// Errors from the technique catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Code already registered.
    #[error("Technique code already exists: {0}")]
    DuplicateCode(String),

    /// Required input missing.
    #[error("Please fill in the technique {0}")]
    MissingField(&'static str),
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from the temporary template store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entry not found.
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Name would escape the store directory.
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// IO error.
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Session Errors (top-level)
// =============================================================================

/// Top-level session orchestration errors.
///
/// Wraps every lower-level error and adds workflow-specific variants.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Template reading error.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Schema error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Preset error.
    #[error("Preset error: {0}")]
    Preset(#[from] PresetError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// No template selected yet.
    #[error("Please select or upload a preset/template metadata")]
    NoTemplate,

    /// Current step is not complete.
    #[error("Step '{0}' is not complete")]
    StepBlocked(Step),

    /// Operation needs data that earlier steps did not produce.
    #[error("Missing {0}")]
    Missing(&'static str),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for template reading.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for preset operations.
pub type PresetResult<T> = Result<T, PresetError>;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
