//! Output projection: choose, order and fill the merged table's columns

use crate::merger::{measure_column_name, MeasureSelection, MergeOutcome};
use crate::table::{CellValue, MergedRow};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Which columns to include in the output, in display order.
///
/// Keys are raw header names or disambiguated measure names. Entries are
/// only ever added by [`OutputSelection::sync_headers`], so user choices
/// survive later loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSelection {
    columns: IndexMap<String, bool>,
}

impl OutputSelection {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a selection with every given column included
    pub fn all<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        columns.into_iter().map(|c| (c.into(), true)).collect()
    }

    /// Include or exclude a column, appending it if unknown
    pub fn set(&mut self, name: impl Into<String>, include: bool) {
        self.columns.insert(name.into(), include);
    }

    /// Check whether a column is included
    pub fn is_selected(&self, name: &str) -> bool {
        self.columns.get(name).copied().unwrap_or(false)
    }

    /// Add headers not seen before as included; existing choices are kept.
    ///
    /// Returns the number of headers added.
    pub fn sync_headers<S: AsRef<str>>(&mut self, headers: &[S]) -> usize {
        let before = self.columns.len();
        for header in headers {
            let header = header.as_ref();
            if !self.columns.contains_key(header) {
                self.columns.insert(header.to_string(), true);
            }
        }
        self.columns.len() - before
    }

    /// Included column names, in selection order
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, include)| **include)
            .map(|(name, _)| name.as_str())
    }

    /// All known columns with their flags
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.columns.iter().map(|(name, include)| (name.as_str(), *include))
    }

    /// Get the number of known columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if no columns are known
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for OutputSelection {
    fn from_iter<T: IntoIterator<Item = (S, bool)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// The final merged table handed to display and export
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedTable {
    /// Output column names, in order
    pub columns: Vec<String>,
    /// Rows, each holding exactly `columns`
    pub rows: Vec<MergedRow>,
    /// Input rows skipped for lack of a key value
    pub skipped_rows: usize,
}

impl MergedTable {
    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get a cell by row index and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

/// Turn the selection into the ordered list of output columns.
///
/// A selected name that is the measure column of any slot expands to that
/// slot's disambiguated name (one per slot using it) and the bare name is not
/// emitted. Any other name is emitted as-is.
pub fn resolve_columns(selection: &OutputSelection, measures: &MeasureSelection) -> Vec<String> {
    let mut columns: IndexSet<String> = IndexSet::new();

    for name in selection.selected() {
        let mut is_measure = false;
        for (slot, measure) in measures {
            if measure == name {
                is_measure = true;
                columns.insert(measure_column_name(measure, *slot));
            }
        }
        if !is_measure {
            columns.insert(name.to_string());
        }
    }

    columns.into_iter().collect()
}

/// Keep only `columns` on every row, in that order, null where missing.
///
/// Rows are neither dropped nor reordered.
pub fn project<'a, I>(rows: I, columns: &[String]) -> Vec<MergedRow>
where
    I: IntoIterator<Item = &'a MergedRow>,
{
    rows.into_iter()
        .map(|row| {
            columns
                .iter()
                .map(|name| {
                    let value = row.get(name).cloned().unwrap_or(CellValue::Null);
                    (name.clone(), value)
                })
                .collect()
        })
        .collect()
}

/// Resolve the selection and project a merge outcome into a table
pub fn project_outcome(
    outcome: &MergeOutcome,
    selection: &OutputSelection,
    measures: &MeasureSelection,
) -> MergedTable {
    let columns = resolve_columns(selection, measures);
    let rows = project(outcome.rows.values(), &columns);

    MergedTable {
        columns,
        rows,
        skipped_rows: outcome.skipped_rows,
    }
}
