//! lm-core: Core library for merging up to four tabular files on a shared key
//!
//! This library provides functionality to:
//! - Parse CSV and Excel files into tagged sources
//! - Find candidate key columns (common headers) and output columns (all headers)
//! - Outer-join sources on a key column, keeping one measure column per source
//!   under a disambiguated name (`Score_1`, `Score_2`, ...)
//! - Project the merged rows onto a selection of output columns
//! - Export the result as an XLSX workbook, CSV or JSON

pub mod error;
pub mod export;
pub mod headers;
pub mod merger;
pub mod parser;
pub mod plan;
pub mod projector;
pub mod session;
pub mod table;

pub use error::{Error, Result};
pub use export::{
    export_table, write_csv, write_json, write_xlsx, ExportFormat, DEFAULT_EXPORT_NAME, SHEET_NAME,
};
pub use headers::{all_headers, common_headers};
pub use merger::{
    measure_column_name, merge_sources, validate_config, MeasureSelection, MergeOutcome,
    MAX_SOURCES,
};
pub use parser::{parse_csv, parse_csv_str, parse_file, parse_workbook};
pub use plan::MergePlan;
pub use projector::{project, project_outcome, resolve_columns, MergedTable, OutputSelection};
pub use session::{MergeSession, Phase, SlotState};
pub use table::{row, CellValue, MergedRow, Row, RowKey, TabularSource};
