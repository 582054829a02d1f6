//! Error types for lm-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lm-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// CSV writing error
    #[error("CSV write error: {0}")]
    CsvWrite(#[from] csv::Error),

    /// Workbook could not be opened or read
    #[error("failed to read workbook '{path}': {message}")]
    Workbook { path: PathBuf, message: String },

    /// File extension is not one we can parse
    #[error("unsupported file format '{0}' (expected .csv, .xlsx or .xls)")]
    UnsupportedFormat(String),

    /// A loaded file produced no data rows
    #[error("source '{id}' is empty or has no data rows")]
    EmptySource { id: String },

    /// A loaded file has no header row
    #[error("source '{id}' has no header row")]
    NoHeaders { id: String },

    /// Slot index outside 0..MAX_SOURCES
    #[error("slot {slot} is out of range (at most {max} sources)")]
    SlotOutOfRange { slot: usize, max: usize },

    /// Merge configuration failed validation; the merge did not run
    #[error("invalid merge configuration: {0}")]
    InvalidMergeConfig(String),

    /// Unknown export format name
    #[error("unknown export format '{0}' (expected xlsx, csv or json)")]
    UnknownFormat(String),

    /// Workbook writing error
    #[error("XLSX write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Error::InvalidMergeConfig(reason.into())
    }
}
