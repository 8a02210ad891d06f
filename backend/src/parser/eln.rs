//! `.eln` (RO-Crate zip) reader.
//!
//! The archive is opened and its `ro-crate-metadata.json` located, but
//! mapping RO-Crate entities to a field schema is not implemented yet.

use std::io::{Cursor, Read};

use serde_json::Value;
use zip::ZipArchive;

use super::{TemplateFormat, TemplateSource};
use crate::api::logs::log_warning;
use crate::error::{TemplateError, TemplateResult};
use crate::models::TemplateMetadata;

const CRATE_METADATA: &str = "ro-crate-metadata.json";

#[derive(Debug, Clone)]
pub struct ElnTemplateReader {
    root: String,
    crate_metadata: Value,
}

impl ElnTemplateReader {
    /// Top-level folder holding the crate.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn crate_metadata(&self) -> &Value {
        &self.crate_metadata
    }
}

impl TemplateSource for ElnTemplateReader {
    fn parse(bytes: &[u8]) -> TemplateResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| TemplateError::Corrupted(e.to_string()))?;

        let mut roots: Vec<String> = archive
            .file_names()
            .filter_map(|name| name.split_once('/').map(|(root, _)| root.to_string()))
            .filter(|root| !root.is_empty())
            .collect();
        roots.sort();
        roots.dedup();
        let root = roots
            .into_iter()
            .next()
            .ok_or_else(|| TemplateError::Corrupted("no top-level folder in archive".into()))?;

        let mut content = String::new();
        archive
            .by_name(&format!("{}/{}", root, CRATE_METADATA))
            .map_err(|e| TemplateError::Corrupted(format!("{}: {}", CRATE_METADATA, e)))?
            .read_to_string(&mut content)?;
        let crate_metadata = serde_json::from_str(&content).map_err(|e| TemplateError::Corrupted(e.to_string()))?;

        log_warning("ELN templates are read but not yet supported");
        Ok(Self { root, crate_metadata })
    }

    fn format(&self) -> TemplateFormat {
        TemplateFormat::Eln
    }

    fn read_metadata(&self) -> TemplateResult<TemplateMetadata> {
        Err(TemplateError::NotAvailable("ELN"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn eln_archive() -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("export-2024/ro-crate-metadata.json", options).unwrap();
        writer.write_all(br#"{"@context": "https://w3id.org/ro/crate/1.1/context", "@graph": []}"#).unwrap();
        writer.start_file("export-2024/experiment/data.csv", options).unwrap();
        writer.write_all(b"a,b\n").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_locates_crate_metadata() {
        let reader = ElnTemplateReader::parse(&eln_archive()).unwrap();
        assert_eq!(reader.root(), "export-2024");
        assert!(reader.crate_metadata()["@graph"].is_array());
    }

    #[test]
    fn test_metadata_not_available() {
        let reader = ElnTemplateReader::parse(&eln_archive()).unwrap();
        let err = reader.read_metadata().unwrap_err();
        assert!(matches!(err, TemplateError::NotAvailable("ELN")));
        assert_eq!(err.to_string(), "ELN format not yet available");
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(ElnTemplateReader::parse(b"plain text"), Err(TemplateError::Corrupted(_))));
    }
}
