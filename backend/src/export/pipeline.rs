//! High-level export API.
//!
//! Combines every step: titles, optional filename validation, CSV
//! generation, file grouping and zipping.
//!
//! # Example
//!
//! ```rust,ignore
//! use elablite::export::{export_experiment, ExportOptions};
//!
//! let bundle = export_experiment(&base, &template, &table, &uploaded, &ExportOptions {
//!     grouped: false,
//!     filename_columns: Some(vec!["IdentifierAnalysis".into()]),
//!     ..Default::default()
//! })?;
//! std::fs::write(&bundle.file_name, &bundle.bytes)?;
//! ```

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::archive::zip_experience;
use super::experiences::{generate_csv, write_csv};
use super::files::{files_management, UploadedFiles};
use super::naming::{assign_filenames, assign_titles, export_filename};
use crate::api::logs::{log_info, log_info_indent, log_success};
use crate::error::ExportResult;
use crate::models::{ExperimentBaseMetadata, RowTable, TemplateMetadata};

/// Options for the export pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// One experiment for all analyses instead of one per row
    pub grouped: bool,

    /// Columns for `new_Filename`; `None` keeps original names
    pub filename_columns: Option<Vec<String>>,

    /// Add the `logs_process.csv` snapshot
    pub include_logs: bool,

    /// Directory for the temporary CSV (system temp dir when unset)
    pub work_dir: Option<PathBuf>,

    /// Date used in the archive name (today when unset)
    pub today: Option<NaiveDate>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            grouped: false,
            filename_columns: None,
            include_logs: true,
            work_dir: None,
            today: None,
        }
    }
}

/// Result of an export
#[derive(Debug, Clone, Serialize)]
pub struct ExportBundle {
    /// Suggested download name
    pub file_name: String,

    /// Zip content
    #[serde(skip)]
    pub bytes: Vec<u8>,

    /// Row table with `new_title` (and `new_Filename`) filled in
    pub table: RowTable,

    /// Data rows in `experiences.csv`
    pub csv_rows: usize,

    /// Data files in the archive
    pub file_count: usize,
}

/// Export an experiment as a zip bundle.
pub fn export_experiment(
    base: &ExperimentBaseMetadata,
    template: &TemplateMetadata,
    table: &RowTable,
    uploaded: &UploadedFiles,
    options: &ExportOptions,
) -> ExportResult<ExportBundle> {
    let mut table = table.clone();
    assign_titles(&mut table, &base.title);

    if let Some(columns) = &options.filename_columns {
        log_info("Generating filenames...");
        if let Some(example) = assign_filenames(&mut table, columns, base)? {
            log_info_indent(format!("Example: {}", example), 1);
        }
    }

    log_info("Generating CSV...");
    let csv = generate_csv(base, template, &table, options.grouped)?;
    let csv_rows = if options.grouped { 1 } else { table.len().max(1) };
    log_success(format!("{} experiment row(s)", csv_rows));
    let csv_path = write_csv(&csv, options.work_dir.as_deref())?;

    log_info("Renaming files...");
    let groups = files_management(uploaded, &table, options.grouped);
    let file_count = groups.values().map(|files| files.len()).sum();

    log_info("Zipping...");
    let snapshot = if options.include_logs { Some(table.to_csv()?) } else { None };
    let bytes = zip_experience(&csv_path, &groups, snapshot.as_deref())?;

    let today = options.today.unwrap_or_else(|| chrono::Local::now().date_naive());
    let file_name = export_filename(today);
    log_success(format!("Process complete: {} ({} bytes)", file_name, bytes.len()));

    Ok(ExportBundle {
        file_name,
        bytes,
        table,
        csv_rows,
        file_count,
    })
}
