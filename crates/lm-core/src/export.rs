//! Export of merged tables to an XLSX workbook, CSV or JSON

use crate::error::{Error, Result};
use crate::projector::MergedTable;
use crate::table::CellValue;
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// File name used when the caller does not pick one
pub const DEFAULT_EXPORT_NAME: &str = "merged.xlsx";

/// Name of the single worksheet in exported workbooks
pub const SHEET_NAME: &str = "Merged";

/// Largest integer an XLSX number cell holds exactly (2^53)
const MAX_EXACT_NUMBER: u64 = 1 << 53;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
    Json,
}

impl ExportFormat {
    /// Guess the format from a file extension, defaulting to XLSX
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Xlsx,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "xlsx" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// Write the table as CSV: a header row, then one line per row.
///
/// Null cells are written as empty fields.
pub fn write_csv<W: Write>(table: &MergedTable, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(&table.columns)?;
    for row in &table.rows {
        csv_writer.write_record(
            table
                .columns
                .iter()
                .map(|name| row.get(name).map(|v| v.to_string_value()).unwrap_or_default()),
        )?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write the table as a one-sheet XLSX workbook.
///
/// The header row comes first. Numbers and booleans keep their cell types,
/// integers too large for an exact spreadsheet number are written as text,
/// and null cells are left blank.
pub fn write_xlsx<W: Write>(table: &MergedTable, mut writer: W) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in table.columns.iter().enumerate() {
        sheet.write_string(0, column_number(col), name.as_str())?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(row_idx + 1).unwrap_or(u32::MAX);
        for (col, name) in table.columns.iter().enumerate() {
            let col_num = column_number(col);
            match row.get(name) {
                Some(CellValue::Integer(i)) if i.unsigned_abs() <= MAX_EXACT_NUMBER => {
                    sheet.write_number(row_num, col_num, *i as f64)?;
                }
                Some(CellValue::Integer(i)) => {
                    sheet.write_string(row_num, col_num, i.to_string().as_str())?;
                }
                Some(CellValue::Float(f)) => {
                    sheet.write_number(row_num, col_num, *f)?;
                }
                Some(CellValue::Bool(b)) => {
                    sheet.write_boolean(row_num, col_num, *b)?;
                }
                Some(CellValue::String(s)) => {
                    sheet.write_string(row_num, col_num, s.as_str())?;
                }
                Some(CellValue::Null) | None => {}
            }
        }
    }

    let buffer = workbook.save_to_buffer()?;
    writer.write_all(&buffer)?;
    Ok(())
}

// Out-of-range indices saturate so the writer reports the sheet limit
fn column_number(col: usize) -> u16 {
    u16::try_from(col).unwrap_or(u16::MAX)
}

/// Write the table as a pretty-printed JSON array of objects
pub fn write_json<W: Write>(table: &MergedTable, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, &table.rows)?;
    Ok(())
}

/// Export the table to a file in the given format
pub fn export_table<P: AsRef<Path>>(
    table: &MergedTable,
    path: P,
    format: ExportFormat,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        ExportFormat::Xlsx => write_xlsx(table, &mut writer)?,
        ExportFormat::Csv => write_csv(table, &mut writer)?,
        ExportFormat::Json => {
            write_json(table, &mut writer)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;

    info!(
        rows = table.row_count(),
        columns = table.column_count(),
        path = %path.display(),
        "exported merged table"
    );
    Ok(())
}
