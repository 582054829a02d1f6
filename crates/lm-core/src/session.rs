//! Merge session: slots, selections and the last merge result
//!
//! The session only stores inputs. Header views are recomputed from the
//! loaded sources on every call, and a merge runs the pure pipeline
//! `validate -> merge -> project` over a snapshot of the current inputs.

use crate::error::{Error, Result};
use crate::headers;
use crate::merger::{merge_sources, MeasureSelection, MAX_SOURCES};
use crate::parser::parse_file;
use crate::projector::{project_outcome, MergedTable, OutputSelection};
use crate::table::TabularSource;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Load state of a single slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotState {
    Empty,
    Loading,
    Loaded,
}

/// Overall state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Phase {
    /// Inputs changed since the last successful merge, or no merge yet
    #[default]
    Configuring,
    /// The stored result matches the current inputs
    Merged,
}

/// An in-memory merge session over up to [`MAX_SOURCES`] slots
#[derive(Debug, Clone, Default)]
pub struct MergeSession {
    slots: [Option<TabularSource>; MAX_SOURCES],
    loading: [bool; MAX_SOURCES],
    key: Option<String>,
    measures: MeasureSelection,
    output: OutputSelection,
    result: Option<MergedTable>,
    phase: Phase,
}

fn check_slot(slot: usize) -> Result<()> {
    if slot < MAX_SOURCES {
        Ok(())
    } else {
        Err(Error::SlotOutOfRange {
            slot,
            max: MAX_SOURCES,
        })
    }
}

impl MergeSession {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the load state of a slot
    pub fn slot_state(&self, slot: usize) -> Result<SlotState> {
        check_slot(slot)?;
        Ok(if self.loading[slot] {
            SlotState::Loading
        } else if self.slots[slot].is_some() {
            SlotState::Loaded
        } else {
            SlotState::Empty
        })
    }

    /// Get the source held by a slot
    pub fn source(&self, slot: usize) -> Option<&TabularSource> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Occupied slots with their sources, in slot order
    pub fn loaded_sources(&self) -> Vec<(usize, &TabularSource)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, source)| source.as_ref().map(|s| (slot, s)))
            .collect()
    }

    /// Get the number of occupied slots
    pub fn loaded_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn loaded_refs(&self) -> Vec<&TabularSource> {
        self.slots.iter().flatten().collect()
    }

    /// Headers shared by every loaded source (candidate keys)
    pub fn common_headers(&self) -> Vec<String> {
        headers::common_headers(&self.loaded_refs())
    }

    /// Union of all loaded headers (candidate output columns)
    pub fn all_headers(&self) -> Vec<String> {
        headers::all_headers(&self.loaded_refs())
    }

    /// Mark a slot as loading; the previous source stays until the load finishes
    pub fn begin_load(&mut self, slot: usize) -> Result<()> {
        check_slot(slot)?;
        self.loading[slot] = true;
        Ok(())
    }

    /// Finish a load started with [`begin_load`](Self::begin_load).
    ///
    /// On failure the slot keeps whatever it held before and the error is
    /// returned; other slots are unaffected.
    pub fn finish_load(&mut self, slot: usize, parsed: Result<TabularSource>) -> Result<()> {
        check_slot(slot)?;
        self.loading[slot] = false;

        match parsed {
            Ok(source) => self.load(slot, source),
            Err(e) => {
                warn!(slot = slot + 1, error = %e, "failed to load source");
                Err(e)
            }
        }
    }

    /// Parse a file and load it into a slot
    pub fn load_file<P: AsRef<Path>>(&mut self, slot: usize, path: P) -> Result<()> {
        self.begin_load(slot)?;
        let parsed = parse_file(path);
        self.finish_load(slot, parsed)
    }

    /// Put a source into a slot, replacing any previous one.
    ///
    /// Fills in defaults the way a fresh configuration screen would: the
    /// slot's measure becomes its first header unless the current choice
    /// still exists, the key becomes the first common header if none is
    /// chosen, and new headers are added to the output selection as included.
    pub fn load(&mut self, slot: usize, source: TabularSource) -> Result<()> {
        check_slot(slot)?;

        let keep_measure = self
            .measures
            .get(&slot)
            .is_some_and(|m| source.has_header(m));
        if !keep_measure {
            if let Some(first) = source.headers().first() {
                self.measures.insert(slot, first.clone());
            }
        }

        info!(
            slot = slot + 1,
            source = source.id(),
            rows = source.row_count(),
            "loaded source"
        );
        self.slots[slot] = Some(source);
        self.loading[slot] = false;

        if self.key.is_none() {
            self.key = self.common_headers().into_iter().next();
        }
        let all = self.all_headers();
        self.output.sync_headers(&all);

        self.phase = Phase::Configuring;
        Ok(())
    }

    /// Empty a slot and forget its measure selection
    pub fn clear_slot(&mut self, slot: usize) -> Result<()> {
        check_slot(slot)?;
        self.slots[slot] = None;
        self.loading[slot] = false;
        self.measures.remove(&slot);
        self.phase = Phase::Configuring;
        Ok(())
    }

    /// Get the chosen key column
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Choose the key column; checked when merging
    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
        self.phase = Phase::Configuring;
    }

    /// Get the measure column chosen for a slot
    pub fn measure(&self, slot: usize) -> Option<&str> {
        self.measures.get(&slot).map(String::as_str)
    }

    /// All measure selections by slot
    pub fn measures(&self) -> &MeasureSelection {
        &self.measures
    }

    /// Choose the measure column for a slot; checked when merging
    pub fn set_measure(&mut self, slot: usize, header: impl Into<String>) -> Result<()> {
        check_slot(slot)?;
        self.measures.insert(slot, header.into());
        self.phase = Phase::Configuring;
        Ok(())
    }

    /// Measure selections of occupied slots only.
    ///
    /// A measure chosen for an empty slot stays stored but names no column.
    fn loaded_measures(&self) -> MeasureSelection {
        self.measures
            .iter()
            .filter(|(slot, _)| self.source(**slot).is_some())
            .map(|(slot, header)| (*slot, header.clone()))
            .collect()
    }

    /// Get the output column selection
    pub fn output_selection(&self) -> &OutputSelection {
        &self.output
    }

    /// Include or exclude one output column
    pub fn set_output(&mut self, name: impl Into<String>, include: bool) {
        self.output.set(name, include);
        self.phase = Phase::Configuring;
    }

    /// Replace the whole output selection
    pub fn replace_output(&mut self, selection: OutputSelection) {
        self.output = selection;
        self.phase = Phase::Configuring;
    }

    /// Run the merge with the current configuration.
    ///
    /// On failure nothing is merged, the previous result is kept and the
    /// session stays in [`Phase::Configuring`].
    pub fn merge(&mut self) -> Result<&MergedTable> {
        let merged = {
            let sources = self.loaded_sources();
            let measures = self.loaded_measures();
            let key = self.key.as_deref().unwrap_or("");
            merge_sources(&sources, key, &measures)
                .map(|outcome| project_outcome(&outcome, &self.output, &measures))
        };

        match merged {
            Ok(table) => {
                self.phase = Phase::Merged;
                let table: &MergedTable = self.result.insert(table);
                Ok(table)
            }
            Err(e) => {
                warn!(error = %e, "merge rejected");
                self.phase = Phase::Configuring;
                Err(e)
            }
        }
    }

    /// Get the last successful merge result
    pub fn result(&self) -> Option<&MergedTable> {
        self.result.as_ref()
    }

    /// Get the session phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Clear all slots, selections and results
    pub fn reset(&mut self) {
        *self = Self::default();
        info!("session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_csv_str;
    use crate::table::CellValue;

    fn source_a() -> TabularSource {
        parse_csv_str("ID,Name,Score\n1,X,10\n", "a.csv").unwrap()
    }

    fn source_b() -> TabularSource {
        parse_csv_str("ID,Score\n1,20\n2,5\n", "b.csv").unwrap()
    }

    #[test]
    fn test_load_fills_defaults() {
        let mut session = MergeSession::new();
        session.load(0, source_a()).unwrap();

        assert_eq!(session.measure(0), Some("ID"));
        assert_eq!(session.key(), None);
        assert!(session.common_headers().is_empty());

        session.load(1, source_b()).unwrap();
        assert_eq!(session.key(), Some("ID"));
        assert_eq!(session.common_headers(), vec!["ID", "Score"]);
        assert_eq!(session.all_headers(), vec!["ID", "Name", "Score"]);
        assert_eq!(
            session.output_selection().selected().collect::<Vec<_>>(),
            vec!["ID", "Name", "Score"]
        );
    }

    #[test]
    fn test_end_to_end_merge() {
        let mut session = MergeSession::new();
        session.load(0, source_a()).unwrap();
        session.load(1, source_b()).unwrap();
        session.set_measure(0, "Score").unwrap();
        session.set_measure(1, "Score").unwrap();

        let table = session.merge().unwrap();
        assert_eq!(table.columns, vec!["ID", "Name", "Score_1", "Score_2"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(0, "Score_2"), Some(&CellValue::Integer(20)));
        assert_eq!(table.get(1, "Score_1"), Some(&CellValue::Null));
        assert_eq!(session.phase(), Phase::Merged);
    }

    #[test]
    fn test_reload_into_other_slot_changes_names() {
        let mut session = MergeSession::new();
        session.load(0, source_a()).unwrap();
        session.load(2, source_b()).unwrap();
        session.set_measure(0, "Score").unwrap();
        session.set_measure(2, "Score").unwrap();

        let table = session.merge().unwrap();
        assert_eq!(table.columns, vec!["ID", "Name", "Score_1", "Score_3"]);
    }

    #[test]
    fn test_measure_on_empty_slot_adds_no_column() {
        let mut session = MergeSession::new();
        session.load(0, source_a()).unwrap();
        session.load(1, source_b()).unwrap();
        session.set_measure(0, "Score").unwrap();
        session.set_measure(1, "Score").unwrap();
        session.set_measure(3, "Score").unwrap();

        let table = session.merge().unwrap();
        assert_eq!(table.columns, vec!["ID", "Name", "Score_1", "Score_2"]);
        assert!(table.rows.iter().all(|r| !r.contains_key("Score_4")));
        assert_eq!(session.measure(3), Some("Score"));
    }

    #[test]
    fn test_distinct_key_texts_stay_separate_rows() {
        let mut session = MergeSession::new();
        session
            .load(
                0,
                parse_csv_str(
                    "ID,V\n12345678901234567890,1\n12345678901234567891,2\n007,3\n",
                    "a.csv",
                )
                .unwrap(),
            )
            .unwrap();
        session
            .load(1, parse_csv_str("ID,V\n7,9\n", "b.csv").unwrap())
            .unwrap();
        session.set_measure(0, "V").unwrap();
        session.set_measure(1, "V").unwrap();

        let table = session.merge().unwrap();
        assert_eq!(table.columns, vec!["ID", "V_1", "V_2"]);
        assert_eq!(table.row_count(), 4);

        let expected = [
            (CellValue::from("12345678901234567890"), CellValue::Integer(1), CellValue::Null),
            (CellValue::from("12345678901234567891"), CellValue::Integer(2), CellValue::Null),
            (CellValue::from("007"), CellValue::Integer(3), CellValue::Null),
            (CellValue::Integer(7), CellValue::Null, CellValue::Integer(9)),
        ];
        for (i, (id, v1, v2)) in expected.iter().enumerate() {
            assert_eq!(table.get(i, "ID"), Some(id));
            assert_eq!(table.get(i, "V_1"), Some(v1));
            assert_eq!(table.get(i, "V_2"), Some(v2));
        }
    }

    #[test]
    fn test_failed_merge_keeps_previous_result() {
        let mut session = MergeSession::new();
        session.load(0, source_a()).unwrap();
        session.load(1, source_b()).unwrap();
        let before = session.merge().unwrap().clone();

        session.set_key("Name");
        let err = session.merge().unwrap_err();
        assert!(matches!(err, Error::InvalidMergeConfig(_)));
        assert_eq!(session.phase(), Phase::Configuring);
        assert_eq!(session.result(), Some(&before));
    }

    #[test]
    fn test_merge_needs_two_sources() {
        let mut session = MergeSession::new();
        session.load(0, source_a()).unwrap();

        assert!(matches!(
            session.merge().unwrap_err(),
            Error::InvalidMergeConfig(_)
        ));
        assert!(session.result().is_none());
    }

    #[test]
    fn test_failed_load_keeps_slot() {
        let mut session = MergeSession::new();
        session.load(0, source_a()).unwrap();

        session.begin_load(0).unwrap();
        assert_eq!(session.slot_state(0).unwrap(), SlotState::Loading);

        let parsed = parse_csv_str("ID\n", "empty.csv");
        let err = session.finish_load(0, parsed).unwrap_err();
        assert!(matches!(err, Error::EmptySource { .. }));
        assert_eq!(session.slot_state(0).unwrap(), SlotState::Loaded);
        assert_eq!(session.source(0).map(|s| s.id()), Some("a.csv"));
        assert_eq!(session.slot_state(1).unwrap(), SlotState::Empty);
    }

    #[test]
    fn test_replacing_source_resets_stale_measure() {
        let mut session = MergeSession::new();
        session.load(0, source_a()).unwrap();
        session.set_measure(0, "Name").unwrap();

        session.load(0, source_b()).unwrap();
        assert_eq!(session.measure(0), Some("ID"));

        session.set_measure(0, "Score").unwrap();
        session.load(0, source_a()).unwrap();
        assert_eq!(session.measure(0), Some("Score"));
    }

    #[test]
    fn test_output_choices_survive_new_loads() {
        let mut session = MergeSession::new();
        session.load(0, source_a()).unwrap();
        session.set_output("Name", false);

        session
            .load(1, parse_csv_str("ID,Extra\n1,y\n", "c.csv").unwrap())
            .unwrap();

        let selection = session.output_selection();
        assert!(!selection.is_selected("Name"));
        assert!(selection.is_selected("Extra"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = MergeSession::new();
        session.load(0, source_a()).unwrap();
        session.load(1, source_b()).unwrap();
        session.merge().unwrap();

        session.reset();

        assert_eq!(session.loaded_count(), 0);
        assert!(session.result().is_none());
        assert!(session.key().is_none());
        assert!(session.measures().is_empty());
        assert!(session.output_selection().is_empty());
        assert!(session.common_headers().is_empty());
        assert!(session.all_headers().is_empty());
        assert_eq!(session.phase(), Phase::Configuring);
        for slot in 0..MAX_SOURCES {
            assert_eq!(session.slot_state(slot).unwrap(), SlotState::Empty);
        }
    }

    #[test]
    fn test_slot_out_of_range() {
        let mut session = MergeSession::new();
        assert!(matches!(
            session.load(MAX_SOURCES, source_a()),
            Err(Error::SlotOutOfRange { .. })
        ));
        assert!(session.slot_state(9).is_err());
        assert!(session.set_measure(4, "ID").is_err());
    }

    #[test]
    fn test_clear_slot() {
        let mut session = MergeSession::new();
        session.load(0, source_a()).unwrap();
        session.load(1, source_b()).unwrap();

        session.clear_slot(1).unwrap();
        assert_eq!(session.loaded_count(), 1);
        assert!(session.measure(1).is_none());
        assert!(session.common_headers().is_empty());
    }
}
