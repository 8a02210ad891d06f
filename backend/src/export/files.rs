//! Mapping of uploaded data files to archive folders.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::api::logs::{log_info, log_warning};
use crate::config::{DATAFILE_MANIFEST, GROUPED_FOLDER};
use crate::models::{cell_to_string, RowTable, FILENAME, IDENTIFIER_ANALYSIS, NEW_FILENAME, NEW_TITLE};

/// Uploaded files by original name.
pub type UploadedFiles = IndexMap<String, Vec<u8>>;

/// Archive folder -> (file name -> content).
pub type FileGroups<'a> = IndexMap<String, IndexMap<String, &'a [u8]>>;

/// Set each row's `Filename` to the first uploaded name containing both
/// its identifier and its sample (empty when none matches), then move
/// `Filename` to the front.
pub fn find_filename<S: AsRef<str>>(table: &mut RowTable, filenames: &[S]) {
    let matches: Vec<String> = table
        .rows()
        .map(|row| {
            let identifier = row.text(IDENTIFIER_ANALYSIS);
            let sample = row.sample().map(cell_to_string).unwrap_or_default();
            if identifier.is_empty() && sample.is_empty() {
                return String::new();
            }
            filenames
                .iter()
                .map(AsRef::<str>::as_ref)
                .find(|name| name.contains(&identifier) && name.contains(&sample))
                .map(str::to_string)
                .unwrap_or_default()
        })
        .collect();

    table.ensure_column(FILENAME);
    for (idx, name) in matches.into_iter().enumerate() {
        table.set(idx, FILENAME, Value::String(name));
    }
    table.move_to_front(FILENAME);
}

/// Archive-safe path segment.
pub fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name.trim().chars().map(|c| if matches!(c, '/' | '\\') { '_' } else { c }).collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Name not yet used in `files`, adding `_1`, `_2`... before the extension.
/// The folder manifest name is never handed out.
fn unique_name(files: &IndexMap<String, &[u8]>, name: &str) -> String {
    let taken = |candidate: &str| candidate == DATAFILE_MANIFEST || files.contains_key(candidate);
    if !taken(name) {
        return name.to_string();
    }
    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (name, None),
    };
    (1..)
        .map(|i| match extension {
            Some(extension) => format!("{}_{}.{}", stem, i, extension),
            None => format!("{}_{}", stem, i),
        })
        .find(|candidate| !taken(candidate))
        .unwrap_or_default()
}

/// Place uploaded files into archive folders.
///
/// Grouped: every mapped file under `data/`. Ungrouped: one folder per row,
/// named after the row's `new_title`. Files are renamed to `new_Filename`
/// when it is set. Uploaded files that no row references are left out, and
/// a file referenced by several rows is placed once. Two files landing on
/// the same name in one folder keep both, the later one suffixed `_1`, `_2`...
pub fn files_management<'a>(uploaded: &'a UploadedFiles, table: &RowTable, grouped: bool) -> FileGroups<'a> {
    let mut groups: FileGroups<'a> = IndexMap::new();
    let mut placed: IndexSet<&str> = IndexSet::new();

    for row in table.rows() {
        let original = row.text(FILENAME);
        let Some((key, content)) = uploaded.get_key_value(original.as_str()) else {
            continue;
        };
        if !placed.insert(key.as_str()) {
            continue;
        }

        let target = if row.is_set(NEW_FILENAME) {
            row.text(NEW_FILENAME)
        } else {
            original.clone()
        };
        let folder = if grouped {
            GROUPED_FOLDER.to_string()
        } else if row.is_set(NEW_TITLE) {
            sanitize_segment(&row.text(NEW_TITLE))
        } else {
            row.index().to_string()
        };

        let wanted = sanitize_segment(&target);
        let files = groups.entry(folder).or_default();
        let name = unique_name(files, &wanted);
        if name != wanted {
            log_warning(format!("'{}' already used for row {}, stored as '{}'", wanted, row.index(), name));
        }
        files.insert(name, content.as_slice());
    }

    let skipped: Vec<&str> = uploaded
        .keys()
        .map(String::as_str)
        .filter(|name| !placed.contains(name))
        .collect();
    if !skipped.is_empty() {
        log_warning(format!("{} uploaded file(s) not referenced by any row: {}", skipped.len(), skipped.join(", ")));
    }
    log_info(format!("{} file(s) in {} folder(s)", placed.len(), groups.len()));

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OBJECT_SAMPLE;
    use serde_json::json;

    fn uploaded() -> UploadedFiles {
        let mut files = UploadedFiles::new();
        files.insert("XRF0001_Sample1.png".into(), b"one".to_vec());
        files.insert("XRF0002_Sample2.png".into(), b"two".to_vec());
        files.insert("stray.txt".into(), b"stray".to_vec());
        files
    }

    fn table() -> RowTable {
        let mut table = RowTable::new([IDENTIFIER_ANALYSIS, OBJECT_SAMPLE]);
        table.push_row([(IDENTIFIER_ANALYSIS, json!("XRF0001")), (OBJECT_SAMPLE, json!("Sample1"))]);
        table.push_row([(IDENTIFIER_ANALYSIS, json!("XRF0002")), (OBJECT_SAMPLE, json!("Sample2"))]);
        table.push_row([(IDENTIFIER_ANALYSIS, json!("XRF0003")), (OBJECT_SAMPLE, json!("Sample3"))]);
        table
    }

    fn mapped_table() -> RowTable {
        let mut table = table();
        let names: Vec<String> = uploaded().keys().cloned().collect();
        find_filename(&mut table, &names);
        table
    }

    #[test]
    fn test_find_filename() {
        let table = mapped_table();
        assert_eq!(table.columns()[0], FILENAME);
        assert_eq!(table.get(0, FILENAME), Some(&json!("XRF0001_Sample1.png")));
        assert_eq!(table.get(1, FILENAME), Some(&json!("XRF0002_Sample2.png")));
        assert_eq!(table.get(2, FILENAME), Some(&json!("")));
    }

    #[test]
    fn test_grouped_single_folder() {
        let files = uploaded();
        let mut table = mapped_table();
        table.set(0, NEW_FILENAME, json!("20240101_XRF_XRF0001.png"));

        let groups = files_management(&files, &table, true);
        assert_eq!(groups.len(), 1);
        let data = &groups[GROUPED_FOLDER];
        assert_eq!(data.len(), 2);
        assert_eq!(data["20240101_XRF_XRF0001.png"], b"one");
        // Second row has no new name yet.
        assert_eq!(data["XRF0002_Sample2.png"], b"two");
    }

    #[test]
    fn test_ungrouped_folder_per_title() {
        let files = uploaded();
        let mut table = mapped_table();
        table.set(0, NEW_TITLE, json!("T1 -- XRF0001_Sample1"));
        table.set(1, NEW_TITLE, json!("T1 -- XRF0002/Sample2"));

        let groups = files_management(&files, &table, false);
        let folders: Vec<&str> = groups.keys().map(String::as_str).collect();
        assert_eq!(folders, ["T1 -- XRF0001_Sample1", "T1 -- XRF0002_Sample2"]);
        assert_eq!(groups["T1 -- XRF0001_Sample1"]["XRF0001_Sample1.png"], b"one");
    }

    #[test]
    fn test_unmapped_files_are_excluded() {
        let files = uploaded();
        let groups = files_management(&files, &mapped_table(), true);
        let all: Vec<&String> = groups.values().flat_map(|f| f.keys()).collect();
        assert_eq!(all.len(), 2);
        assert!(!all.iter().any(|name| name.as_str() == "stray.txt"));
    }

    #[test]
    fn test_file_placed_once() {
        let files = uploaded();
        let mut table = mapped_table();
        table.set(2, FILENAME, json!("XRF0001_Sample1.png"));
        let groups = files_management(&files, &table, false);
        let count = groups
            .values()
            .flat_map(|f| f.values())
            .filter(|content| **content == b"one")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_grouped_name_collision_keeps_both() {
        let files = uploaded();
        let mut table = mapped_table();
        table.set(0, NEW_FILENAME, json!("20240101_XRF_S1.png"));
        table.set(1, NEW_FILENAME, json!("20240101_XRF_S1.png"));

        let groups = files_management(&files, &table, true);
        let data = &groups[GROUPED_FOLDER];
        assert_eq!(data.len(), 2);
        assert_eq!(data["20240101_XRF_S1.png"], b"one");
        assert_eq!(data["20240101_XRF_S1_1.png"], b"two");
    }

    #[test]
    fn test_ungrouped_name_collision_keeps_both() {
        let files = uploaded();
        let mut table = mapped_table();
        for row in 0..2 {
            table.set(row, NEW_TITLE, json!("T1 -- S1"));
            table.set(row, NEW_FILENAME, json!("scan"));
        }

        let groups = files_management(&files, &table, false);
        assert_eq!(groups.len(), 1);
        let folder = &groups["T1 -- S1"];
        assert_eq!(folder["scan"], b"one");
        assert_eq!(folder["scan_1"], b"two");
    }

    #[test]
    fn test_manifest_name_is_reserved() {
        let mut files = UploadedFiles::new();
        files.insert(DATAFILE_MANIFEST.to_string(), b"data".to_vec());
        let mut table = RowTable::new([FILENAME]);
        table.push_row([(FILENAME, json!(DATAFILE_MANIFEST))]);

        let groups = files_management(&files, &table, true);
        let data = &groups[GROUPED_FOLDER];
        assert!(!data.contains_key(DATAFILE_MANIFEST));
        assert_eq!(data["DATAFILE_1.txt"], b"data");
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_segment(".."), "_");
        assert_eq!(sanitize_segment("  ok "), "ok");
    }
}
