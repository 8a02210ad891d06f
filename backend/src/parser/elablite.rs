//! `.elablite` preset reader.

use super::{TemplateFormat, TemplateSource};
use crate::error::TemplateResult;
use crate::models::{CollectedFormData, ExperimentBaseMetadata, RowTable, TemplateMetadata};
use crate::preset::PresetContainer;

#[derive(Debug, Clone)]
pub struct ElabLiteTemplateReader {
    container: PresetContainer,
}

impl TemplateSource for ElabLiteTemplateReader {
    fn parse(bytes: &[u8]) -> TemplateResult<Self> {
        Ok(Self {
            container: PresetContainer::from_bytes(bytes)?,
        })
    }

    fn format(&self) -> TemplateFormat {
        TemplateFormat::ElabLite
    }

    fn read_metadata(&self) -> TemplateResult<TemplateMetadata> {
        Ok(self.container.template_metadata.clone())
    }

    fn read_preset(&self) -> (Option<ExperimentBaseMetadata>, Option<CollectedFormData>) {
        (
            Some(self.container.metadata_base.clone()),
            Some(self.container.form_data.clone()),
        )
    }

    fn read_dataframe(&self) -> Option<RowTable> {
        Some(self.container.dataframe_metadata.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PresetError, TemplateError};
    use crate::models::FormValue;
    use crate::preset::create_elablite;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_reads_all_artifacts() {
        let base = ExperimentBaseMetadata::new("T1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "A");
        let mut form = CollectedFormData::new();
        form.insert("lens".into(), FormValue::Text("x10".into()));
        let template: TemplateMetadata =
            serde_json::from_value(json!({ "extra_fields": { "lens": { "type": "text" } } })).unwrap();
        let table = RowTable::for_template(&template).unwrap();

        let bytes = create_elablite(&base, &form, &template, &table).unwrap();
        let reader = ElabLiteTemplateReader::parse(&bytes).unwrap();

        assert_eq!(reader.read_metadata().unwrap(), template);
        assert_eq!(reader.read_preset(), (Some(base), Some(form)));
        assert_eq!(reader.read_dataframe(), Some(table));
    }

    #[test]
    fn test_corrupted_preset() {
        let err = ElabLiteTemplateReader::parse(b"\x00\x01garbage").unwrap_err();
        assert!(matches!(err, TemplateError::Preset(PresetError::Corrupted(_))));
    }
}
