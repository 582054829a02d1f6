//! Merge plan files: a saved merge configuration in JSON
//!
//! ```json
//! {
//!   "files": ["north.xlsx", "south.csv"],
//!   "key": "ID",
//!   "measures": { "1": "Score", "2": "Score" },
//!   "output": { "ID": true, "Name": true, "Score": true },
//!   "format": "xlsx",
//!   "output_path": "merged.xlsx"
//! }
//! ```
//!
//! `measures` is keyed by file number (1-based), matching the suffix of the
//! disambiguated column names.

use crate::error::{Error, Result};
use crate::export::ExportFormat;
use crate::merger::{MeasureSelection, MAX_SOURCES};
use crate::projector::OutputSelection;
use crate::session::MergeSession;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A saved merge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergePlan {
    /// Files to load, one per slot in order
    pub files: Vec<PathBuf>,
    /// Key column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Measure column by file number (1-based)
    pub measures: BTreeMap<usize, String>,
    /// Output columns; columns not listed keep their session defaults
    pub output: OutputSelection,
    /// Export format
    pub format: ExportFormat,
    /// Export destination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl MergePlan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a plan file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        let plan: MergePlan = serde_json::from_str(&content)?;
        plan.measure_selection()?;
        Ok(plan)
    }

    /// Save the plan file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Measures keyed by slot index (0-based)
    pub fn measure_selection(&self) -> Result<MeasureSelection> {
        self.measures
            .iter()
            .map(|(number, header)| match number.checked_sub(1) {
                Some(slot) if slot < MAX_SOURCES => Ok((slot, header.clone())),
                _ => Err(Error::SlotOutOfRange {
                    slot: *number,
                    max: MAX_SOURCES,
                }),
            })
            .collect()
    }

    /// Load the plan's files and apply its selections to a session.
    ///
    /// Files go into slots 1.. in order; selections are applied after all
    /// files are loaded so they override the load-time defaults.
    pub fn apply_to(&self, session: &mut MergeSession) -> Result<()> {
        if self.files.len() > MAX_SOURCES {
            return Err(Error::SlotOutOfRange {
                slot: self.files.len(),
                max: MAX_SOURCES,
            });
        }

        for (slot, path) in self.files.iter().enumerate() {
            session.load_file(slot, path)?;
        }

        if let Some(key) = &self.key {
            session.set_key(key.clone());
        }
        for (slot, header) in self.measure_selection()? {
            session.set_measure(slot, header)?;
        }
        for (name, include) in self.output.iter() {
            session.set_output(name, include);
        }

        Ok(())
    }
}
