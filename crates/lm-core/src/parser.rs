//! File parsing: CSV and Excel workbooks into a [`TabularSource`]
//!
//! The first row holds the headers. Empty cells are left out of the row
//! rather than stored as nulls, and rows with no values at all are skipped.

use crate::error::{Error, Result};
use crate::table::{CellValue, Row, TabularSource};
use calamine::{open_workbook_auto, Data, Reader};
use indexmap::IndexSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

/// Placeholder name for a blank header cell
const EMPTY_HEADER: &str = "__EMPTY";

/// Parse a file, choosing the format from its extension
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<TabularSource> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => parse_csv(path),
        "xlsx" | "xls" => parse_workbook(path),
        _ => Err(Error::UnsupportedFormat(ext)),
    }
}

/// Parse a CSV file
pub fn parse_csv<P: AsRef<Path>>(path: P) -> Result<TabularSource> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    read_csv(BufReader::new(file), path)
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<TabularSource> {
    read_csv(content.as_bytes(), Path::new(source_name))
}

fn read_csv<R: Read>(reader: R, path: &Path) -> Result<TabularSource> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records: Vec<Vec<Option<CellValue>>> = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        records.push(record.iter().map(CellValue::parse).collect());
    }

    build_source(path, headers, records)
}

/// Parse the first worksheet of an Excel workbook
pub fn parse_workbook<P: AsRef<Path>>(path: P) -> Result<TabularSource> {
    let path = path.as_ref();
    let workbook_error = |message: String| Error::Workbook {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| workbook_error("workbook has no worksheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| workbook_error(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| match cell {
                Data::Empty => String::new(),
                other => other.to_string(),
            })
            .collect(),
        None => Vec::new(),
    };

    let records: Vec<Vec<Option<CellValue>>> = rows
        .map(|data_row| data_row.iter().map(workbook_cell).collect())
        .collect();

    build_source(path, headers, records)
}

fn workbook_cell(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Empty => None,
        Data::Int(i) => Some(CellValue::Integer(*i)),
        Data::Float(f) => Some(CellValue::Float(*f)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| CellValue::String(trimmed.to_string()))
        }
        // Dates and error cells go through their display form
        other => CellValue::parse(&other.to_string()),
    }
}

fn build_source(
    path: &Path,
    raw_headers: Vec<String>,
    records: Vec<Vec<Option<CellValue>>>,
) -> Result<TabularSource> {
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    if raw_headers.iter().all(|h| h.trim().is_empty()) {
        return Err(Error::NoHeaders { id });
    }
    let headers = normalize_headers(&raw_headers);

    let mut rows: Vec<Row> = Vec::with_capacity(records.len());
    for (row_idx, cells) in records.into_iter().enumerate() {
        if cells.len() > headers.len() && cells[headers.len()..].iter().any(Option::is_some) {
            warn!(
                source = %id,
                row = row_idx + 1,
                "row has more cells than headers, truncating"
            );
        }

        let row: Row = headers
            .iter()
            .zip(cells)
            .filter_map(|(name, cell)| cell.map(|value| (name.clone(), value)))
            .collect();

        if !row.is_empty() {
            rows.push(row);
        }
    }

    let source = TabularSource::new(id, headers, rows)?;
    info!(
        source = source.id(),
        columns = source.column_count(),
        rows = source.row_count(),
        "parsed source"
    );
    Ok(source)
}

/// Trim headers, name blank ones `__EMPTY`, and suffix repeats with `_1`, `_2`...
fn normalize_headers(raw: &[String]) -> Vec<String> {
    let mut used: IndexSet<String> = IndexSet::with_capacity(raw.len());

    for header in raw {
        let trimmed = header.trim();
        let base = if trimmed.is_empty() {
            EMPTY_HEADER
        } else {
            trimmed
        };

        let mut name = base.to_string();
        let mut n = 1;
        while used.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        used.insert(name);
    }

    used.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_simple_csv() {
        let csv = "ID,Name,Value\n1,foo,100\n2,bar,200\n";
        let source = parse_csv_str(csv, "test.csv").unwrap();

        assert_eq!(source.id(), "test.csv");
        assert_eq!(source.headers(), &["ID", "Name", "Value"]);
        assert_eq!(source.row_count(), 2);
        assert_eq!(source.rows()[0]["ID"], CellValue::Integer(1));
        assert_eq!(source.rows()[1]["Name"], CellValue::from("bar"));
    }

    #[test]
    fn test_parse_keeps_id_text_that_is_not_a_plain_integer() {
        let csv = "ID,V\n12345678901234567890,1\n12345678901234567891,2\n007,3\n7,4\n";
        let source = parse_csv_str(csv, "ids.csv").unwrap();

        let ids: Vec<&CellValue> = source.rows().iter().map(|r| &r["ID"]).collect();
        assert_eq!(
            ids,
            vec![
                &CellValue::from("12345678901234567890"),
                &CellValue::from("12345678901234567891"),
                &CellValue::from("007"),
                &CellValue::Integer(7),
            ]
        );
    }

    #[test]
    fn test_parse_with_empty_cells() {
        let csv = "ID,Name,Value\n1,,100\n2,bar,\n";
        let source = parse_csv_str(csv, "test.csv").unwrap();

        assert!(!source.rows()[0].contains_key("Name"));
        assert!(!source.rows()[1].contains_key("Value"));
        assert_eq!(source.rows()[1]["Name"], CellValue::from("bar"));
    }

    #[test]
    fn test_parse_skips_blank_rows() {
        let csv = "ID,Name\n1,foo\n,\n2,bar\n";
        let source = parse_csv_str(csv, "test.csv").unwrap();
        assert_eq!(source.row_count(), 2);
    }

    #[test]
    fn test_parse_header_only_is_empty_source() {
        let err = parse_csv_str("ID,Name\n", "empty.csv").unwrap_err();
        assert!(matches!(err, Error::EmptySource { ref id } if id == "empty.csv"));
    }

    #[test]
    fn test_parse_no_headers() {
        let err = parse_csv_str("", "blank.csv").unwrap_err();
        assert!(matches!(err, Error::NoHeaders { .. }));
    }

    #[test]
    fn test_parse_short_and_long_rows() {
        let csv = "ID,Name\n1\n2,bar,extra\n";
        let source = parse_csv_str(csv, "test.csv").unwrap();

        assert_eq!(source.rows()[0].len(), 1);
        assert_eq!(source.rows()[1].len(), 2);
    }

    #[test]
    fn test_normalize_headers() {
        let raw: Vec<String> = ["ID", " Name ", "", "Name", "Name", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(
            normalize_headers(&raw),
            vec!["ID", "Name", "__EMPTY", "Name_1", "Name_2", "__EMPTY_1"]
        );
    }

    #[test]
    fn test_parse_file_csv() {
        let mut temp_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "Code,Weight").unwrap();
        writeln!(temp_file, "A1,2.5").unwrap();
        temp_file.flush().unwrap();

        let source = parse_file(temp_file.path()).unwrap();
        assert_eq!(source.headers(), &["Code", "Weight"]);
        assert_eq!(source.rows()[0]["Weight"], CellValue::Float(2.5));
    }

    #[test]
    fn test_parse_file_unsupported_extension() {
        let err = parse_file("notes.txt").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(ref ext) if ext == "txt"));
    }

    #[test]
    fn test_parse_missing_workbook() {
        let err = parse_file("/nonexistent/dir/book.xlsx").unwrap_err();
        assert!(matches!(err, Error::Workbook { .. }));
    }

    #[test]
    fn test_parse_missing_csv() {
        let err = parse_file("/nonexistent/dir/list.csv").unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
