//! Derived titles and export filenames.

use std::path::Path;

use chrono::NaiveDate;

use crate::error::{ExportError, ExportResult};
use crate::models::{
    cell_to_string, ExperimentBaseMetadata, Row, RowTable, FILENAME, IDENTIFIER_ANALYSIS, NEW_FILENAME, NEW_TITLE,
    OBJECT_SAMPLE,
};

/// Columns that cannot be part of a generated filename.
pub const EXCLUDED_FILENAME_COLUMNS: [&str; 3] = [FILENAME, NEW_TITLE, NEW_FILENAME];

/// Columns offered for filename generation, in table order.
pub fn selectable_columns(table: &RowTable) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| !EXCLUDED_FILENAME_COLUMNS.contains(&c.as_str()))
        .cloned()
        .collect()
}

/// `<YYYYMMDD>[_<technique>]_<col1>_<col2>...<.ext>`
///
/// Parts follow `selected_columns` order; the extension comes from the
/// row's `Filename`. Runs of `_` left by empty parts collapse to one.
pub fn generate_filename(
    row: &Row<'_>,
    selected_columns: &[String],
    base: &ExperimentBaseMetadata,
) -> ExportResult<String> {
    let mut parts = vec![base.date.format("%Y%m%d").to_string()];
    if let Some(code) = base.technique_code() {
        parts.push(code.to_string());
    }
    for column in selected_columns {
        let cell = row.get(column).ok_or_else(|| ExportError::MissingColumn(column.clone()))?;
        parts.push(cell_to_string(cell));
    }

    let mut stem = parts.join("_");
    while stem.contains("__") {
        stem = stem.replace("__", "_");
    }
    let stem = stem.trim_end_matches('_');

    let original = row.text(FILENAME);
    let extension = Path::new(&original)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    Ok(format!("{}{}", stem, extension))
}

/// `"<title> -- <IdentifierAnalysis>_<Object/Sample>"`, or
/// `"<title> -- <row index>"` when both cells are empty.
pub fn generate_newtitle(row: &Row<'_>, title: &str) -> String {
    let identifier = row.get(IDENTIFIER_ANALYSIS).map(cell_to_string).unwrap_or_default();
    let sample = row.sample().map(cell_to_string).unwrap_or_default();
    if identifier.is_empty() && sample.is_empty() {
        format!("{} -- {}", title, row.index())
    } else {
        format!("{} -- {}_{}", title, identifier, sample)
    }
}

/// Fill `new_title` for every row.
pub fn assign_titles(table: &mut RowTable, title: &str) {
    let titles: Vec<String> = table.rows().map(|row| generate_newtitle(&row, title)).collect();
    table.ensure_column(NEW_TITLE);
    for (idx, title) in titles.into_iter().enumerate() {
        table.set(idx, NEW_TITLE, title.into());
    }
}

/// Fill `new_Filename` for every row; returns the first name as an example.
pub fn assign_filenames(
    table: &mut RowTable,
    selected_columns: &[String],
    base: &ExperimentBaseMetadata,
) -> ExportResult<Option<String>> {
    if let Some(column) = selected_columns
        .iter()
        .find(|c| EXCLUDED_FILENAME_COLUMNS.contains(&c.as_str()))
    {
        return Err(ExportError::ExcludedColumn(column.clone()));
    }
    let names = table
        .rows()
        .map(|row| generate_filename(&row, selected_columns, base))
        .collect::<ExportResult<Vec<_>>>()?;
    table.ensure_column(NEW_FILENAME);
    for (idx, name) in names.iter().enumerate() {
        table.set(idx, NEW_FILENAME, name.clone().into());
    }
    Ok(names.into_iter().next())
}

/// Archive download name: `<YYYYMMDD>_experiences.zip`.
pub fn export_filename(today: NaiveDate) -> String {
    format!("{}_experiences.zip", today.format("%Y%m%d"))
}
