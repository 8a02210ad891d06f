//! # ElabLite - experiment metadata templates, forms and export bundles
//!
//! ElabLite reads laboratory metadata templates, drives a typed form from
//! their field schema, and exports the collected values together with a
//! per-analysis table as `experiences.csv` plus renamed data files in a zip.
//! The whole working set round-trips through `.elablite` presets.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Template   │────▶│   Parser    │────▶│    Form     │────▶│   Export    │
//! │ json/csv/.. │     │ (by ext.)   │     │ (typed UI)  │     │ (csv + zip) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                            ▲                                       │
//!                            └──────────── .elablite preset ◀────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use elablite::{Session, DefaultRenderer, ExperimentBaseMetadata, technique};
//!
//! let mut session = Session::new();
//! session.load_template("templates/xrf.json")?;
//! session.set_base(ExperimentBaseMetadata::new("T1", today, "Ada").with_technique(technique("XRF").unwrap()));
//! session.generate_form(&mut DefaultRenderer, false)?;
//! let bundle = session.export(None)?;
//! std::fs::write(&bundle.file_name, &bundle.bytes)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Environment configuration and fixed names
//! - [`models`] - Field schema, form values, base metadata, techniques, row table
//! - [`parser`] - Template readers (json, csv, eln, elablite)
//! - [`form`] - Form generation engine
//! - [`validation`] - Email and URL checks
//! - [`export`] - CSV generation, naming, file grouping, archive
//! - [`preset`] - `.elablite` container
//! - [`cache`] - Temporary template store with retention
//! - [`session`] - Session state and step navigation
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Reading
pub mod parser;

// Form
pub mod form;
pub mod validation;

// Output
pub mod export;
pub mod preset;

// Storage and workflow
pub mod cache;
pub mod session;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CatalogError, ExportError, PresetError, SchemaError, ServerError, SessionError, StoreError, TemplateError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::Config;

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    register_technique, technique, techniques, CollectedFormData, ExperimentBaseMetadata, FieldConfig,
    FieldDescriptor, FieldType, FormValue, RowTable, TechniqueOption, TemplateMetadata,
};

// =============================================================================
// Re-exports - Template reading
// =============================================================================

pub use parser::{detect_delimiter, detect_encoding, TemplateFormat, TemplateReader, TemplateSource};

// =============================================================================
// Re-exports - Form
// =============================================================================

pub use form::{generate_form, DefaultRenderer, FieldRenderer, FormItem, FormOutcome};
pub use validation::{is_valid_email, is_valid_url, ValidationState};

// =============================================================================
// Re-exports - Export and presets
// =============================================================================

pub use export::{export_experiment, generate_csv, ExportBundle, ExportOptions, UploadedFiles};
pub use preset::{create_elablite, read_elablite, PresetContainer};

// =============================================================================
// Re-exports - Store and session
// =============================================================================

pub use cache::{StoreKind, StoredTemplate, TemplateStore};
pub use session::{Session, Step, WorkingSet};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
