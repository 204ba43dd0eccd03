//! Column navigation with per-column state snapshots.

use crate::dataset::Dataset;
use crate::error::{MappingError, Result};
use crate::lookup::TermLookup;
use crate::search::SELECT_ONTOLOGY_FIRST;
use crate::session::{ColumnNavigationState, NoticeLevel, SessionStore};

impl SessionStore {
    /// Load `dataset` and open its first column.
    pub fn open_dataset(&mut self, lookup: &dyn TermLookup, dataset: Dataset) -> Result<()> {
        let first = dataset.column_names().first().map(|c| c.to_string());
        self.load_dataset(dataset);
        match first {
            Some(column) => self.navigate_to_column(lookup, &column),
            None => Err(MappingError::EmptyDataset),
        }
    }

    /// Make `column` the active column.
    ///
    /// The column being left is snapshotted first. Re-selecting the active
    /// column changes nothing else. Otherwise the live state is replaced by
    /// the target's snapshot (or reset), the column is searched again, and
    /// a textual column gets its first value searched on the first visit.
    pub fn navigate_to_column(&mut self, lookup: &dyn TermLookup, column: &str) -> Result<()> {
        let dataset = self.dataset.as_ref().ok_or(MappingError::NoDataset)?;
        if !dataset.has_column(column) {
            return Err(MappingError::UnknownColumn(column.to_string()));
        }

        let previous = self.active_column.clone();
        if let Some(previous) = previous.as_deref() {
            let snapshot = self.snapshot_column(previous);
            self.navigation.insert(previous.to_string(), snapshot);
        }
        if previous.as_deref() == Some(column) {
            return Ok(());
        }

        let restored = self.navigation.get(column).cloned().unwrap_or_default();
        self.active_column = Some(column.to_string());
        self.manual_search_term = None;
        self.column_results = None;
        self.selected_terms = restored.selected_terms;
        self.active_value = restored.selected_unique_value;
        self.value_results = restored.value_results;
        self.value_selection = restored.value_selection;
        self.auto_searched = restored.auto_searched;
        tracing::debug!(
            from = previous.as_deref().unwrap_or("-"),
            to = %column,
            "column selected"
        );

        self.enter_column(lookup, column);
        Ok(())
    }

    fn snapshot_column(&self, column: &str) -> ColumnNavigationState {
        // During a manual search the live selection belongs to the query.
        let selected_terms = if self.manual_search_term.is_some() {
            self.column_mapping
                .get(column)
                .map(|m| m.selected_term_uris.clone())
                .unwrap_or_default()
        } else {
            self.selected_terms.clone()
        };
        ColumnNavigationState {
            selected_terms,
            selected_unique_value: self.active_value.clone(),
            value_results: self.value_results.clone(),
            value_selection: self.value_selection.clone(),
            auto_searched: self.auto_searched,
        }
    }

    fn enter_column(&mut self, lookup: &dyn TermLookup, column: &str) {
        if self.ontologies.is_empty() {
            self.notify(NoticeLevel::Warning, SELECT_ONTOLOGY_FIRST);
            return;
        }
        self.search_active_column(lookup);

        if self.auto_searched {
            return;
        }
        let first_value = match self.dataset.as_ref() {
            Some(ds) if ds.data_type(column).map(|t| t.is_textual()).unwrap_or(false) => {
                ds.unique_values(column).ok().and_then(|v| v.into_iter().next())
            }
            _ => return,
        };
        if let Some(value) = first_value {
            self.value_selection = self
                .value_selections
                .get(&(column.to_string(), value.clone()))
                .cloned()
                .unwrap_or_default();
            self.active_value = Some(value);
            self.search_active_value(lookup, None);
        }
        self.auto_searched = true;
    }
}
