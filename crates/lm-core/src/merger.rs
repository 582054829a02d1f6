//! Merge engine: keyed outer join of tagged sources
//!
//! Every occupied slot contributes one "measure" column, which is renamed to
//! `<header>_<slot number>` so sources measuring the same thing do not
//! collide. All other columns are shared, first writer wins.

use crate::error::{Error, Result};
use crate::headers::common_headers;
use crate::table::{CellValue, MergedRow, RowKey, TabularSource};
use indexmap::map::Entry;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Maximum number of sources that can be loaded at once
pub const MAX_SOURCES: usize = 4;

/// Measure column chosen per slot index
pub type MeasureSelection = BTreeMap<usize, String>;

/// Disambiguated name of a measure column: `<header>_<slot + 1>`
pub fn measure_column_name(header: &str, slot: usize) -> String {
    format!("{}_{}", header, slot + 1)
}

/// Result of a merge, before output projection
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Merged rows keyed by key-column value, in first-insertion order
    pub rows: IndexMap<RowKey, MergedRow>,
    /// Rows skipped because their key value was missing
    pub skipped_rows: usize,
}

impl MergeOutcome {
    /// Get the number of merged rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Find a merged row by key value
    pub fn find_row(&self, key: &CellValue) -> Option<&MergedRow> {
        RowKey::from_cell(key).and_then(|k| self.rows.get(&k))
    }
}

/// A source paired with its measure column, after validation
struct Contribution<'a> {
    slot: usize,
    source: &'a TabularSource,
    measure: &'a str,
}

/// Check merge preconditions without running the merge.
///
/// Requires at least two occupied slots, a key present in every source, and a
/// measure column for each slot that exists in that slot's source.
pub fn validate_config(
    sources: &[(usize, &TabularSource)],
    key: &str,
    measures: &MeasureSelection,
) -> Result<()> {
    resolve(sources, key, measures).map(|_| ())
}

fn resolve<'a>(
    sources: &[(usize, &'a TabularSource)],
    key: &str,
    measures: &'a MeasureSelection,
) -> Result<Vec<Contribution<'a>>> {
    if sources.len() < 2 {
        return Err(Error::invalid_config(format!(
            "at least two sources are required, {} loaded",
            sources.len()
        )));
    }

    let mut previous: Option<usize> = None;
    for (slot, _) in sources {
        if *slot >= MAX_SOURCES {
            return Err(Error::SlotOutOfRange {
                slot: *slot,
                max: MAX_SOURCES,
            });
        }
        if previous.is_some_and(|p| p >= *slot) {
            return Err(Error::invalid_config(
                "sources must be given once each, in slot order",
            ));
        }
        previous = Some(*slot);
    }

    if key.is_empty() {
        return Err(Error::invalid_config("no key column selected"));
    }
    let loaded: Vec<&TabularSource> = sources.iter().map(|(_, s)| *s).collect();
    if !common_headers(&loaded).iter().any(|h| h == key) {
        return Err(Error::invalid_config(format!(
            "key column '{}' is not present in every source",
            key
        )));
    }

    sources
        .iter()
        .map(|(slot, source)| {
            let measure = measures
                .get(slot)
                .map(String::as_str)
                .filter(|m| !m.is_empty())
                .ok_or_else(|| {
                    Error::invalid_config(format!("no measure column selected for file {}", slot + 1))
                })?;
            if !source.has_header(measure) {
                return Err(Error::invalid_config(format!(
                    "measure column '{}' does not exist in file {} ({})",
                    measure,
                    slot + 1,
                    source.id()
                )));
            }
            Ok(Contribution {
                slot: *slot,
                source: *source,
                measure,
            })
        })
        .collect()
}

/// Merge tagged sources on `key`.
///
/// `sources` holds `(slot index, source)` for occupied slots in slot order.
/// Configuration problems are reported as [`Error::InvalidMergeConfig`]
/// before any row is touched.
pub fn merge_sources(
    sources: &[(usize, &TabularSource)],
    key: &str,
    measures: &MeasureSelection,
) -> Result<MergeOutcome> {
    let contributions = resolve(sources, key, measures)?;
    let outcome = merge_rows(&contributions, key);

    info!(
        sources = contributions.len(),
        rows = outcome.rows.len(),
        skipped = outcome.skipped_rows,
        key,
        "merged sources"
    );

    Ok(outcome)
}

fn merge_rows(contributions: &[Contribution<'_>], key: &str) -> MergeOutcome {
    let measure_names: Vec<String> = contributions
        .iter()
        .map(|c| measure_column_name(c.measure, c.slot))
        .collect();

    let mut rows: IndexMap<RowKey, MergedRow> = IndexMap::new();
    let mut skipped_rows = 0;

    for (contribution, target) in contributions.iter().zip(&measure_names) {
        let measure = contribution.measure;

        for (row_idx, row) in contribution.source.rows().iter().enumerate() {
            let Some(row_key) = row.get(key).and_then(RowKey::from_cell) else {
                debug!(
                    source = contribution.source.id(),
                    row = row_idx + 1,
                    "skipping row without key value"
                );
                skipped_rows += 1;
                continue;
            };

            let value = row.get(measure).cloned().unwrap_or(CellValue::Null);

            match rows.entry(row_key) {
                Entry::Occupied(mut entry) => {
                    let merged = entry.get_mut();
                    merged.insert(target.clone(), value);
                    for (name, cell) in row {
                        if name != measure && !merged.contains_key(name) {
                            merged.insert(name.clone(), cell.clone());
                        }
                    }
                }
                Entry::Vacant(entry) => {
                    let mut merged = row.clone();
                    merged.shift_remove(measure);
                    for name in &measure_names {
                        merged.insert(name.clone(), CellValue::Null);
                    }
                    merged.insert(target.clone(), value);
                    entry.insert(merged);
                }
            }
        }
    }

    MergeOutcome { rows, skipped_rows }
}
