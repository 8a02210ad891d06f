//! `experiences.csv` generation.
//!
//! Each CSV row carries the base metadata plus a copy of the template whose
//! field values were overwritten from one row table row.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::api::logs::log_warning;
use crate::error::ExportResult;
use crate::models::{cell_to_string, ExperimentBaseMetadata, FieldType, Row, RowTable, TemplateMetadata};

/// Fixed output columns.
pub const CSV_HEADERS: [&str; 6] = ["date", "title", "body", "rating", "metadata", "tags"];

/// Separator of the `tags` column.
pub const TAG_SEPARATOR: &str = "|";

#[derive(Debug, Serialize)]
struct ExperienceRecord<'a> {
    date: String,
    title: &'a str,
    body: &'a str,
    rating: u8,
    metadata: String,
    tags: String,
}

/// Copy of `template` with every field value taken from `row`.
///
/// Number cells are split into value and unit. Any run of whitespace
/// separates the two, so `"30\tkV"` and `"30  kV"` read like `"30 kV"`. A
/// cell that is not exactly one `value unit` pair keeps its whole text as the
/// value and a warning is logged.
pub fn specialize_template(template: &TemplateMetadata, row: &Row<'_>) -> ExportResult<TemplateMetadata> {
    let mut specialized = template.clone();
    for (name, config) in specialized.extra_fields.iter_mut() {
        let Some(cell) = row.get(name) else {
            continue;
        };
        if config.field_type(name)? != FieldType::Number {
            config.value = cell.clone();
            continue;
        }

        let text = cell_to_string(cell);
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.as_slice() {
            [value, unit] => {
                config.value = Value::String(value.to_string());
                config.unit = Some(unit.to_string());
            }
            [] => config.value = Value::String(String::new()),
            _ => {
                log_warning(format!(
                    "Row {}: cannot split '{}' into value and unit for '{}'",
                    row.index(),
                    text,
                    name
                ));
                config.value = Value::String(text.clone());
            }
        }
    }
    Ok(specialized)
}

/// Render the experiences CSV.
///
/// Grouped: one row built from the first table row. Ungrouped: one row per
/// table row, in table order.
pub fn generate_csv(
    base: &ExperimentBaseMetadata,
    template: &TemplateMetadata,
    table: &RowTable,
    grouped: bool,
) -> ExportResult<String> {
    // Header comes from the first serialized record.
    let mut writer = csv::Writer::from_writer(Vec::new());

    let rows: Vec<Row<'_>> = if grouped {
        table.row(0).into_iter().collect()
    } else {
        table.rows().collect()
    };

    let date = base.date.format("%Y-%m-%d").to_string();
    let tags = base.tags.join(TAG_SEPARATOR);

    if rows.is_empty() {
        // Template defaults only.
        writer.serialize(record(base, &date, &tags, template)?)?;
    }
    for row in rows {
        let specialized = specialize_template(template, &row)?;
        writer.serialize(record(base, &date, &tags, &specialized)?)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn record<'a>(
    base: &'a ExperimentBaseMetadata,
    date: &str,
    tags: &str,
    template: &TemplateMetadata,
) -> ExportResult<ExperienceRecord<'a>> {
    Ok(ExperienceRecord {
        date: date.to_string(),
        title: &base.title,
        body: &base.commentary,
        rating: base.rating,
        metadata: serde_json::to_string(template)?,
        tags: tags.to_string(),
    })
}

/// Write the CSV to a named temporary file that outlives this call.
///
/// The archive step deletes it once added.
pub fn write_csv(content: &str, dir: Option<&Path>) -> ExportResult<PathBuf> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("experiences_").suffix(".csv");
    let file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    std::fs::write(file.path(), content)?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IDENTIFIER_ANALYSIS, OBJECT_SAMPLE};
    use chrono::NaiveDate;
    use serde_json::json;

    fn base() -> ExperimentBaseMetadata {
        let mut base = ExperimentBaseMetadata::new("T1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "A");
        base.commentary = "notes".into();
        base.tags = vec!["x".into(), "y".into()];
        base.set_rating(3);
        base
    }

    fn template() -> TemplateMetadata {
        serde_json::from_value(json!({
            "extra_fields": {
                "voltage": { "type": "number", "value": "0", "units": ["kV", "V"], "unit": "V" },
                "lens": { "type": "text", "value": "none" }
            }
        }))
        .unwrap()
    }

    fn table() -> RowTable {
        let mut table = RowTable::new([IDENTIFIER_ANALYSIS, OBJECT_SAMPLE, "voltage", "lens"]);
        table.push_row([
            (IDENTIFIER_ANALYSIS, json!("XRF0001")),
            (OBJECT_SAMPLE, json!("S1")),
            ("voltage", json!("30 kV")),
            ("lens", json!("x10")),
        ]);
        table.push_row([
            (IDENTIFIER_ANALYSIS, json!("XRF0002")),
            (OBJECT_SAMPLE, json!("S2")),
            ("voltage", json!("12 V")),
            ("lens", json!("x50")),
        ]);
        table.push_row([(IDENTIFIER_ANALYSIS, json!("XRF0003")), ("voltage", json!("7"))]);
        table
    }

    fn parse(csv: &str) -> Vec<csv::StringRecord> {
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        assert_eq!(reader.headers().unwrap(), &csv::StringRecord::from(CSV_HEADERS.to_vec()));
        reader.records().map(|r| r.unwrap()).collect()
    }

    fn metadata(record: &csv::StringRecord) -> Value {
        serde_json::from_str(&record[4]).unwrap()
    }

    #[test]
    fn test_grouped_emits_one_row() {
        let csv = generate_csv(&base(), &template(), &table(), true).unwrap();
        let records = parse(&csv);
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][0], "2024-01-01");
        assert_eq!(&records[0][1], "T1");
        assert_eq!(&records[0][2], "notes");
        assert_eq!(&records[0][3], "3");
        assert_eq!(&records[0][5], "x|y");

        let meta = metadata(&records[0]);
        assert_eq!(meta["extra_fields"]["voltage"]["value"], "30");
        assert_eq!(meta["extra_fields"]["voltage"]["unit"], "kV");
        assert_eq!(meta["extra_fields"]["lens"]["value"], "x10");
    }

    #[test]
    fn test_ungrouped_one_row_per_analysis_without_leakage() {
        let csv = generate_csv(&base(), &template(), &table(), false).unwrap();
        let records = parse(&csv);
        assert_eq!(records.len(), 3);

        let second = metadata(&records[1]);
        assert_eq!(second["extra_fields"]["voltage"]["value"], "12");
        assert_eq!(second["extra_fields"]["voltage"]["unit"], "V");
        assert_eq!(second["extra_fields"]["lens"]["value"], "x50");

        // Row 3 has no lens and an unsplittable voltage.
        let third = metadata(&records[2]);
        assert_eq!(third["extra_fields"]["lens"]["value"], Value::Null);
        assert_eq!(third["extra_fields"]["voltage"]["value"], "7");
        assert_eq!(third["extra_fields"]["voltage"]["unit"], "V");
    }

    #[test]
    fn test_columns_outside_template_are_ignored() {
        let csv = generate_csv(&base(), &template(), &table(), false).unwrap();
        let meta = metadata(&parse(&csv)[0]);
        assert!(meta["extra_fields"].get(IDENTIFIER_ANALYSIS).is_none());
    }

    #[test]
    fn test_empty_table_emits_template_defaults() {
        let csv = generate_csv(&base(), &template(), &RowTable::default(), false).unwrap();
        let records = parse(&csv);
        assert_eq!(records.len(), 1);
        assert_eq!(metadata(&records[0])["extra_fields"]["lens"]["value"], "none");
    }

    #[test]
    fn test_write_csv_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv("a,b\n", Some(dir.path())).unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n");
    }
}
