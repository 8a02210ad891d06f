//! CSV template reader.
//!
//! A CSV carries rows, not a field schema: `read_metadata` yields an empty
//! template and the records come back as the row table.

use csv::ReaderBuilder;
use serde_json::{Map, Value};

use super::{TemplateFormat, TemplateSource};
use crate::error::{TemplateError, TemplateResult};
use crate::models::{RowTable, TemplateMetadata};

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8, ASCII and anything unknown
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line.
/// Defaults to `,` when the header has a single column.
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = b',';
    let mut best_count = 0;
    for sep in [b',', b';', b'\t', b'|'] {
        let count = first_line.bytes().filter(|&b| b == sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

/// Parsed CSV rows.
#[derive(Debug, Clone)]
pub struct CsvTemplateReader {
    headers: Vec<String>,
    records: Vec<Value>,
    encoding: String,
    delimiter: u8,
}

impl CsvTemplateReader {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// One JSON object per non-empty line, keyed by header.
    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn delimiter(&self) -> char {
        self.delimiter as char
    }

    /// Records as a row table, columns in header order.
    pub fn to_table(&self) -> RowTable {
        let mut table = RowTable::new(self.headers.iter().cloned());
        for record in &self.records {
            if let Value::Object(map) = record {
                table.push_row(map.iter().map(|(k, v)| (k, v.clone())));
            }
        }
        table
    }
}

impl TemplateSource for CsvTemplateReader {
    fn parse(bytes: &[u8]) -> TemplateResult<Self> {
        let encoding = detect_encoding(bytes);
        let content = decode_content(bytes, &encoding);
        let content = content.trim_start_matches('\u{feff}');
        if content.trim().is_empty() {
            return Err(TemplateError::Corrupted("Empty CSV file".into()));
        }
        let delimiter = detect_delimiter(content);

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| TemplateError::Corrupted(format!("Cannot read header: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut records = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result.map_err(|e| TemplateError::Corrupted(format!("Line {}: {}", idx + 2, e)))?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            let obj: Map<String, Value> = headers
                .iter()
                .enumerate()
                .map(|(i, header)| (header.clone(), Value::String(record.get(i).unwrap_or("").to_string())))
                .collect();
            records.push(Value::Object(obj));
        }

        Ok(Self {
            headers,
            records,
            encoding,
            delimiter,
        })
    }

    fn format(&self) -> TemplateFormat {
        TemplateFormat::Csv
    }

    fn read_metadata(&self) -> TemplateResult<TemplateMetadata> {
        Ok(TemplateMetadata::default())
    }

    /// Rows become the per-analysis table.
    fn read_dataframe(&self) -> Option<RowTable> {
        Some(self.to_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let reader = CsvTemplateReader::parse(b"name;age\nAlice;30\nBob;25").unwrap();
        assert_eq!(reader.delimiter(), ';');
        assert_eq!(reader.headers(), ["name", "age"]);
        assert_eq!(reader.records().len(), 2);
        assert_eq!(reader.records()[0]["name"], "Alice");
        assert_eq!(reader.records()[1]["age"], "25");
    }

    #[test]
    fn test_quoted_values() {
        let reader = CsvTemplateReader::parse(b"a,b\n\"x, y\",2\n").unwrap();
        assert_eq!(reader.records()[0]["a"], "x, y");
    }

    #[test]
    fn test_empty_lines_and_missing_values() {
        let reader = CsvTemplateReader::parse(b"a,b,c\n1,2\n\n4,5,6\n").unwrap();
        assert_eq!(reader.records().len(), 2);
        assert_eq!(reader.records()[0]["c"], "");
    }

    #[test]
    fn test_empty_csv_is_corrupted() {
        assert!(matches!(CsvTemplateReader::parse(b""), Err(TemplateError::Corrupted(_))));
        assert!(matches!(CsvTemplateReader::parse(b"  \n"), Err(TemplateError::Corrupted(_))));
    }

    #[test]
    fn test_metadata_is_empty() {
        let reader = CsvTemplateReader::parse(b"a\n1\n").unwrap();
        assert!(reader.read_metadata().unwrap().is_empty());
        let table = reader.read_dataframe().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.columns(), ["a"]);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c"), b';');
        assert_eq!(detect_delimiter("a,b,c"), b',');
        assert_eq!(detect_delimiter("a\tb\tc"), b'\t');
        assert_eq!(detect_delimiter("a|b|c"), b'|');
        assert_eq!(detect_delimiter("single"), b',');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }
}
