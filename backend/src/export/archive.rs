//! Export archive assembly.
//!
//! ```text
//! <YYYYMMDD>_experiences.zip
//! ├── experiences.csv
//! ├── logs_process.csv          (optional row table snapshot)
//! └── <folder>/
//!     ├── <file>...
//!     └── DATAFILE.txt          (one "<folder>/<file>" per line)
//! ```

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::files::FileGroups;
use crate::config::{DATAFILE_MANIFEST, EXPERIENCES_CSV, LOGS_PROCESS_CSV};
use crate::error::ExportResult;

/// MIME type of the export download.
pub const ZIP_MIME: &str = "application/zip";

/// Build the export archive in memory; `csv_path` is deleted once added.
pub fn zip_experience(csv_path: &Path, groups: &FileGroups<'_>, logs_process: Option<&str>) -> ExportResult<Vec<u8>> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    let csv = fs::read(csv_path)?;
    writer.start_file(EXPERIENCES_CSV, options)?;
    writer.write_all(&csv)?;

    if let Some(snapshot) = logs_process {
        writer.start_file(LOGS_PROCESS_CSV, options)?;
        writer.write_all(snapshot.as_bytes())?;
    }

    for (folder, files) in groups {
        let mut manifest = String::new();
        for (name, content) in files {
            let entry = format!("{}/{}", folder, name);
            writer.start_file(entry.as_str(), options)?;
            writer.write_all(content)?;
            manifest.push_str(&entry);
            manifest.push('\n');
        }
        writer.start_file(format!("{}/{}", folder, DATAFILE_MANIFEST), options)?;
        writer.write_all(manifest.as_bytes())?;
    }

    let buffer = writer.finish()?.into_inner();
    fs::remove_file(csv_path)?;
    Ok(buffer)
}
