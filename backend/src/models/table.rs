//! Per-analysis row table.
//!
//! One row per analysis/data file. Columns are ordered; cells are JSON
//! scalars so text, numbers and missing values (`null`) all survive a
//! preset round trip.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TemplateMetadata;
use crate::error::{SchemaError, SchemaResult};

pub const IDENTIFIER_ANALYSIS: &str = "IdentifierAnalysis";
pub const OBJECT_SAMPLE: &str = "Object/Sample";
/// Older tables name the sample column `Object`.
pub const OBJECT: &str = "Object";
pub const LOCALISATION_ANALYSIS: &str = "LocalisationAnalysis";
pub const FILENAME: &str = "Filename";
pub const NEW_TITLE: &str = "new_title";
pub const NEW_FILENAME: &str = "new_Filename";

/// Columns a template field may never be named after.
pub const RESERVED_COLUMNS: &[&str] = &[
    IDENTIFIER_ANALYSIS,
    OBJECT_SAMPLE,
    OBJECT,
    LOCALISATION_ANALYSIS,
    FILENAME,
    NEW_TITLE,
    NEW_FILENAME,
];

/// Ordered table of JSON cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a RowTable,
    index: usize,
}

impl<'a> Row<'a> {
    /// Position of the row in the table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Cell of a column; `None` when the column does not exist.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.table.get(self.index, column)
    }

    /// Cell rendered as text; missing cells and `null` are empty.
    pub fn text(&self, column: &str) -> String {
        self.get(column).map(cell_to_string).unwrap_or_default()
    }

    /// Cell is present and not `null`/empty.
    pub fn is_set(&self, column: &str) -> bool {
        !matches!(self.get(column), None | Some(Value::Null)) && !self.text(column).is_empty()
    }

    /// Sample cell, accepting both column names.
    pub fn sample(&self) -> Option<&'a Value> {
        self.get(OBJECT_SAMPLE).or_else(|| self.get(OBJECT))
    }
}

/// Render a cell the way it appears in filenames and CSV.
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RowTable {
    /// Empty table with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Empty table with the reserved columns followed by one column per
    /// template field.
    pub fn for_template(template: &TemplateMetadata) -> SchemaResult<Self> {
        let mut columns: Vec<String> = vec![
            IDENTIFIER_ANALYSIS.to_string(),
            OBJECT_SAMPLE.to_string(),
            LOCALISATION_ANALYSIS.to_string(),
            FILENAME.to_string(),
        ];
        for name in template.extra_fields.keys() {
            if RESERVED_COLUMNS.contains(&name.as_str()) {
                return Err(SchemaError::ReservedName(name.clone()));
            }
            columns.push(name.clone());
        }
        Ok(Self::new(columns))
    }

    /// Build a table from JSON objects (one per row).
    ///
    /// Columns appear in first-seen order.
    pub fn from_records(records: &[Value]) -> Self {
        let mut table = Self::default();
        for record in records {
            if let Value::Object(map) = record {
                for key in map.keys() {
                    table.ensure_column(key);
                }
                let row = table
                    .columns
                    .iter()
                    .map(|c| map.get(c).cloned().unwrap_or(Value::Null))
                    .collect();
                table.rows.push(row);
            }
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Add a column filled with `null` if it does not exist yet.
    pub fn ensure_column(&mut self, column: &str) -> usize {
        match self.column_index(column) {
            Some(idx) => idx,
            None => {
                self.columns.push(column.to_string());
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
                self.columns.len() - 1
            }
        }
    }

    /// Move a column to the front.
    pub fn move_to_front(&mut self, column: &str) {
        if let Some(idx) = self.column_index(column) {
            let name = self.columns.remove(idx);
            self.columns.insert(0, name);
            for row in &mut self.rows {
                let cell = row.remove(idx);
                row.insert(0, cell);
            }
        }
    }

    /// Append a row given as `(column, value)` pairs; unknown columns are added.
    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let mut row = vec![Value::Null; self.columns.len()];
        for (column, value) in cells {
            let idx = self.ensure_column(column.as_ref());
            if idx >= row.len() {
                row.resize(self.columns.len(), Value::Null);
            }
            row[idx] = value;
        }
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Set a cell, adding the column when needed. Out-of-range rows are ignored.
    pub fn set(&mut self, row: usize, column: &str, value: Value) {
        if row >= self.rows.len() {
            return;
        }
        let idx = self.ensure_column(column);
        self.rows[row][idx] = value;
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.rows.len()).then_some(Row { table: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.rows.len()).map(move |index| Row { table: self, index })
    }

    /// Render the table as CSV (header + rows).
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(cell_to_string))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_table() -> RowTable {
        let mut table = RowTable::new([IDENTIFIER_ANALYSIS, OBJECT_SAMPLE, FILENAME]);
        table.push_row([
            (IDENTIFIER_ANALYSIS, json!("XRF0001")),
            (OBJECT_SAMPLE, json!("Sample1")),
            (FILENAME, json!("a.png")),
        ]);
        table.push_row([(IDENTIFIER_ANALYSIS, json!("XRF0002")), (FILENAME, json!("b.png"))]);
        table
    }

    #[test]
    fn test_get_and_text() {
        let table = sample_table();
        let row = table.row(1).unwrap();
        assert_eq!(row.text(IDENTIFIER_ANALYSIS), "XRF0002");
        assert_eq!(row.get(OBJECT_SAMPLE), Some(&Value::Null));
        assert!(!row.is_set(OBJECT_SAMPLE));
        assert!(row.get("nope").is_none());
    }

    #[test]
    fn test_push_row_adds_columns() {
        let mut table = sample_table();
        table.push_row([("voltage", json!(30))]);
        assert_eq!(table.columns().last().map(String::as_str), Some("voltage"));
        assert_eq!(table.get(0, "voltage"), Some(&Value::Null));
        assert_eq!(table.get(2, "voltage"), Some(&json!(30)));
    }

    #[test]
    fn test_move_to_front() {
        let mut table = sample_table();
        table.move_to_front(FILENAME);
        assert_eq!(table.columns()[0], FILENAME);
        assert_eq!(table.get(0, FILENAME), Some(&json!("a.png")));
        assert_eq!(table.get(0, IDENTIFIER_ANALYSIS), Some(&json!("XRF0001")));
    }

    #[test]
    fn test_for_template_rejects_reserved_names() {
        let template: TemplateMetadata = serde_json::from_value(json!({
            "extra_fields": { "Filename": { "type": "text" } }
        }))
        .unwrap();
        assert!(matches!(RowTable::for_template(&template), Err(SchemaError::ReservedName(_))));
    }

    #[test]
    fn test_for_template_columns() {
        let template: TemplateMetadata = serde_json::from_value(json!({
            "extra_fields": { "voltage": { "type": "number" }, "lens": { "type": "text" } }
        }))
        .unwrap();
        let table = RowTable::for_template(&template).unwrap();
        assert_eq!(table.columns().len(), 6);
        assert_eq!(table.columns()[4], "voltage");
    }

    #[test]
    fn test_from_records() {
        let table = RowTable::from_records(&[json!({"a": "1"}), json!({"b": 2})]);
        assert_eq!(table.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.get(0, "b"), Some(&Value::Null));
        assert_eq!(table.get(1, "b"), Some(&json!(2)));
    }

    #[test]
    fn test_to_csv() {
        let csv = sample_table().to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("IdentifierAnalysis,Object/Sample,Filename"));
        assert_eq!(lines.next(), Some("XRF0001,Sample1,a.png"));
        assert_eq!(lines.next(), Some("XRF0002,,b.png"));
    }
}
