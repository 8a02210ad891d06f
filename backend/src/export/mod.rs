//! Export pipeline: `experiences.csv`, renamed data files and the zip bundle.
//!
//! # Architecture
//!
//! ```text
//! RowTable ──▶ naming (new_title, new_Filename)
//!    │                    │
//!    ├──▶ experiences ────┼──▶ experiences.csv ─┐
//!    │   (template/row)   │                     ├──▶ archive ──▶ .zip
//!    └──▶ files ◀─────────┘──▶ folder/file ─────┘
//!         (uploads)
//! ```

pub mod archive;
pub mod experiences;
pub mod files;
pub mod naming;
pub mod pipeline;

pub use archive::{zip_experience, ZIP_MIME};
pub use experiences::{generate_csv, specialize_template, write_csv, CSV_HEADERS};
pub use files::{files_management, find_filename, sanitize_segment, FileGroups, UploadedFiles};
pub use naming::{
    assign_filenames, assign_titles, export_filename, generate_filename, generate_newtitle, selectable_columns,
    EXCLUDED_FILENAME_COLUMNS,
};
pub use pipeline::{export_experiment, ExportBundle, ExportOptions};
