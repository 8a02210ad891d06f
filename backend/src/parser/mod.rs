//! Template reader with format detection.
//!
//! Picks a reader from the file extension and exposes the same capability
//! set for every format:
//!
//! | Format      | `read_metadata`         | `read_preset`  | `read_dataframe` |
//! |-------------|-------------------------|----------------|------------------|
//! | `.json`     | re-parsed `metadata`    | none           | none             |
//! | `.csv`      | empty schema            | none           | parsed rows      |
//! | `.eln`      | "not yet available"     | none           | none             |
//! | `.elablite` | stored template         | base + form    | stored table     |
//!
//! # Example
//!
//! ```rust,ignore
//! use elablite::parser::TemplateReader;
//!
//! let reader = TemplateReader::open("templates/xrf.json")?;
//! let template = reader.read_metadata()?;
//! println!("{} fields", template.extra_fields.len());
//! ```

pub mod elablite;
pub mod eln;
pub mod json;
pub mod tabular;

pub use elablite::ElabLiteTemplateReader;
pub use eln::ElnTemplateReader;
pub use json::JsonTemplateReader;
pub use tabular::{decode_content, detect_delimiter, detect_encoding, CsvTemplateReader};

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{TemplateError, TemplateResult};
use crate::models::{CollectedFormData, ExperimentBaseMetadata, RowTable, TemplateMetadata};

/// Supported template/preset formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    Json,
    Csv,
    Eln,
    ElabLite,
}

impl TemplateFormat {
    /// Detect the format from a file name's extension.
    pub fn detect(path: impl AsRef<Path>) -> TemplateResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "eln" => Ok(Self::Eln),
            "elablite" => Ok(Self::ElabLite),
            _ => Err(TemplateError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Eln => "eln",
            Self::ElabLite => "elablite",
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Capabilities of a format-specific reader.
pub trait TemplateSource {
    /// Parse raw file content.
    fn parse(bytes: &[u8]) -> TemplateResult<Self>
    where
        Self: Sized;

    fn format(&self) -> TemplateFormat;

    /// Normalized field schema.
    fn read_metadata(&self) -> TemplateResult<TemplateMetadata>;

    /// Saved base metadata and form values (presets only).
    fn read_preset(&self) -> (Option<ExperimentBaseMetadata>, Option<CollectedFormData>) {
        (None, None)
    }

    /// Saved row table (presets only).
    fn read_dataframe(&self) -> Option<RowTable> {
        None
    }
}

/// Reader dispatching to the format detected from the file name.
pub struct TemplateReader {
    path: PathBuf,
    source: Box<dyn TemplateSource + Send + Sync>,
}

impl fmt::Debug for TemplateReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateReader")
            .field("path", &self.path)
            .field("format", &self.source.format())
            .finish()
    }
}

impl TemplateReader {
    /// Read and parse a file from disk.
    pub fn open(path: impl AsRef<Path>) -> TemplateResult<Self> {
        let path = path.as_ref();
        let format = TemplateFormat::detect(path)?;
        let bytes = std::fs::read(path)?;
        Self::parse_as(format, path.to_path_buf(), &bytes)
    }

    /// Parse uploaded content; `file_name` only drives format detection.
    pub fn from_bytes(file_name: &str, bytes: &[u8]) -> TemplateResult<Self> {
        let format = TemplateFormat::detect(file_name)?;
        Self::parse_as(format, PathBuf::from(file_name), bytes)
    }

    fn parse_as(format: TemplateFormat, path: PathBuf, bytes: &[u8]) -> TemplateResult<Self> {
        let source: Box<dyn TemplateSource + Send + Sync> = match format {
            TemplateFormat::Json => Box::new(JsonTemplateReader::parse(bytes)?),
            TemplateFormat::Csv => Box::new(CsvTemplateReader::parse(bytes)?),
            TemplateFormat::Eln => Box::new(ElnTemplateReader::parse(bytes)?),
            TemplateFormat::ElabLite => Box::new(ElabLiteTemplateReader::parse(bytes)?),
        };
        Ok(Self { path, source })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> TemplateFormat {
        self.source.format()
    }

    pub fn read_metadata(&self) -> TemplateResult<TemplateMetadata> {
        self.source.read_metadata()
    }

    pub fn read_preset(&self) -> (Option<ExperimentBaseMetadata>, Option<CollectedFormData>) {
        self.source.read_preset()
    }

    pub fn read_dataframe(&self) -> Option<RowTable> {
        self.source.read_dataframe()
    }
}
