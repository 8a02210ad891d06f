//! eLabFTW JSON template reader.
//!
//! The exported template is an object whose `metadata` entry holds the
//! field schema as a JSON-encoded string.

use serde_json::Value;

use super::{TemplateFormat, TemplateSource};
use crate::error::{TemplateError, TemplateResult};
use crate::models::TemplateMetadata;

#[derive(Debug, Clone)]
pub struct JsonTemplateReader {
    template: Value,
}

impl JsonTemplateReader {
    /// The whole exported template.
    pub fn template(&self) -> &Value {
        &self.template
    }

    /// Template title, when exported.
    pub fn title(&self) -> Option<&str> {
        self.template.get("title").and_then(Value::as_str)
    }
}

impl TemplateSource for JsonTemplateReader {
    fn parse(bytes: &[u8]) -> TemplateResult<Self> {
        let template: Value = serde_json::from_slice(bytes).map_err(|e| TemplateError::Corrupted(e.to_string()))?;
        if !template.is_object() {
            return Err(TemplateError::Corrupted("template must be a JSON object".into()));
        }
        Ok(Self { template })
    }

    fn format(&self) -> TemplateFormat {
        TemplateFormat::Json
    }

    fn read_metadata(&self) -> TemplateResult<TemplateMetadata> {
        let metadata = match self.template.get("metadata") {
            Some(Value::String(encoded)) => {
                serde_json::from_str(encoded).map_err(|e| TemplateError::Corrupted(format!("metadata: {}", e)))?
            }
            // Some exports inline the object.
            Some(obj @ Value::Object(_)) => {
                serde_json::from_value(obj.clone()).map_err(|e| TemplateError::Corrupted(format!("metadata: {}", e)))?
            }
            Some(Value::Null) | None => TemplateMetadata::default(),
            Some(other) => {
                return Err(TemplateError::Corrupted(format!("unexpected metadata value: {}", other)));
            }
        };
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn export(metadata: Value) -> Vec<u8> {
        json!({ "title": "XRF", "metadata": metadata }).to_string().into_bytes()
    }

    #[test]
    fn test_metadata_string_is_reparsed() {
        let metadata = json!({
            "extra_fields": {
                "voltage": { "type": "number", "value": "30", "units": ["kV"], "position": "2" },
                "lens": { "type": "select", "options": ["x10", "x50"], "value": "x10", "position": 1 }
            }
        });
        let reader = JsonTemplateReader::parse(&export(Value::String(metadata.to_string()))).unwrap();
        assert_eq!(reader.title(), Some("XRF"));

        let template = reader.read_metadata().unwrap();
        let names: Vec<_> = template.extra_fields.keys().cloned().collect();
        assert_eq!(names, ["voltage", "lens"]);
        assert_eq!(template.extra_fields["voltage"].sort_position(), 2);
    }

    #[test]
    fn test_inline_metadata_object() {
        let reader = JsonTemplateReader::parse(&export(json!({ "extra_fields": { "a": { "type": "text" } } }))).unwrap();
        assert_eq!(reader.read_metadata().unwrap().extra_fields.len(), 1);
    }

    #[test]
    fn test_missing_metadata_is_empty() {
        let reader = JsonTemplateReader::parse(br#"{"title": "bare"}"#).unwrap();
        assert!(reader.read_metadata().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_is_corrupted() {
        assert!(matches!(JsonTemplateReader::parse(b"{ not json"), Err(TemplateError::Corrupted(_))));
        assert!(matches!(JsonTemplateReader::parse(b"[1, 2]"), Err(TemplateError::Corrupted(_))));

        let reader = JsonTemplateReader::parse(&export(json!("{ broken"))).unwrap();
        assert!(matches!(reader.read_metadata(), Err(TemplateError::Corrupted(_))));
    }
}
