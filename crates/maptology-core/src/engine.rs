//! Mapping reconciliation.
//!
//! Every selection change funnels into one of the two `reconcile_*` entry
//! points, which rebuild the derived records for exactly one context:
//!
//! ```text
//! selection ──► reconcile_column_mapping ──► export_records + column_mapping
//!           └─► reconcile_value_mapping  ──► value_mapping + value_selections
//! ```
//!
//! Removals go the other way: they prune the mappings first, then every
//! place the removed terms may still be shown as selected, and finally bump
//! the generation of the affected context so rendered checkboxes are rebuilt.

use std::collections::BTreeSet;

use crate::error::{MappingError, Result};
use crate::model::{DataType, MappingRecord, SearchContext, SearchResultSet};
use crate::session::{ColumnMapping, NoticeLevel, SessionStore};

impl SessionStore {
    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Declared type of `column`.
    pub fn resolve_data_type(&self, column: &str) -> Result<DataType> {
        let dataset = self.dataset.as_ref().ok_or(MappingError::NoDataset)?;
        dataset.data_type(column)
    }

    /// Type stamped onto new records: the active column's type, `String`
    /// when there is none.
    fn active_data_type(&self) -> DataType {
        self.active_column
            .as_deref()
            .and_then(|c| self.resolve_data_type(c).ok())
            .unwrap_or(DataType::String)
    }

    fn derive_records(
        &self,
        original_label: Option<&str>,
        selected: &BTreeSet<String>,
        result_set: &SearchResultSet,
        data_type: DataType,
    ) -> (BTreeSet<String>, Vec<MappingRecord>) {
        let mut kept = BTreeSet::new();
        let mut records = Vec::new();
        for term in result_set
            .terms
            .iter()
            .filter(|t| selected.contains(&t.term_uri))
        {
            kept.insert(term.term_uri.clone());
            records.push(MappingRecord::derive(
                original_label,
                term,
                self.ontology_full_name(&term.ontology_abbreviation),
                data_type,
            ));
        }
        (kept, records)
    }

    /// Replace every record for `label` with records derived from the
    /// selected terms of `result_set`, in result order.
    ///
    /// Selected URIs that are not part of `result_set` are dropped. The new
    /// records take the export position of the first record they replace;
    /// a label without prior records is appended.
    pub fn reconcile_column_mapping(
        &mut self,
        label: &str,
        selected: &BTreeSet<String>,
        result_set: &SearchResultSet,
        data_type: DataType,
    ) {
        let insert_at = self.export_records.iter().position(|r| r.is_for_label(label));
        self.export_records.retain(|r| !r.is_for_label(label));

        let (kept, records) = self.derive_records(Some(label), selected, result_set, data_type);

        if self.active_label() == Some(label) {
            self.selected_terms = kept.clone();
        }

        if records.is_empty() {
            if self.column_mapping.remove(label).is_some() {
                tracing::debug!(label = %label, "column mapping cleared");
            }
            return;
        }

        let at = insert_at.unwrap_or(self.export_records.len());
        self.export_records
            .splice(at..at, records.iter().cloned());
        tracing::debug!(label = %label, terms = records.len(), "column mapping reconciled");
        self.column_mapping.insert(
            label.to_string(),
            ColumnMapping {
                selected_term_uris: kept,
                records,
            },
        );
    }

    /// Replace the records for one `(column, value)` pair.
    pub fn reconcile_value_mapping(
        &mut self,
        column: &str,
        value: &str,
        selected: &BTreeSet<String>,
        result_set: &SearchResultSet,
        data_type: DataType,
    ) {
        let (kept, records) = self.derive_records(None, selected, result_set, data_type);
        let key = (column.to_string(), value.to_string());

        if self.active_column.as_deref() == Some(column)
            && self.active_value.as_deref() == Some(value)
        {
            self.value_selection = kept.clone();
        }

        if records.is_empty() {
            self.drop_value_entry(column, value);
            self.value_selections.remove(&key);
            return;
        }

        tracing::debug!(column = %column, value = %value, terms = records.len(), "value mapping reconciled");
        self.value_mapping
            .entry(column.to_string())
            .or_default()
            .insert(value.to_string(), records);
        self.value_selections.insert(key, kept);
    }

    fn drop_value_entry(&mut self, column: &str, value: &str) -> bool {
        let Some(values) = self.value_mapping.get_mut(column) else {
            return false;
        };
        let removed = values.remove(value).is_some();
        if values.is_empty() {
            self.value_mapping.remove(column);
        }
        removed
    }

    // ========================================================================
    // Checkbox actions
    // ========================================================================

    /// Check or uncheck a term of the active column-level result set.
    ///
    /// Ignored when the result set belongs to another label.
    pub fn toggle_column_term(&mut self, term_uri: &str, checked: bool) {
        let Some(label) = self.active_label().map(str::to_string) else {
            return;
        };
        let Some(results) = self
            .column_results
            .clone()
            .filter(|r| r.context == SearchContext::Label(label.clone()))
        else {
            return;
        };
        if checked {
            self.selected_terms.insert(term_uri.to_string());
        } else {
            self.selected_terms.remove(term_uri);
        }
        let selected = self.selected_terms.clone();
        let data_type = self.active_data_type();
        self.reconcile_column_mapping(&label, &selected, &results, data_type);
    }

    /// Check or uncheck a term of the active value-level result set.
    pub fn toggle_value_term(&mut self, term_uri: &str, checked: bool) {
        let (Some(column), Some(value)) = (self.active_column.clone(), self.active_value.clone())
        else {
            return;
        };
        let context = SearchContext::value(column.clone(), value.clone());
        let Some(results) = self.value_results.clone().filter(|r| r.context == context) else {
            return;
        };
        if checked {
            self.value_selection.insert(term_uri.to_string());
        } else {
            self.value_selection.remove(term_uri);
        }
        let selected = self.value_selection.clone();
        let data_type = self.active_data_type();
        self.reconcile_value_mapping(&column, &value, &selected, &results, data_type);
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Drop every column-level record for `label` along with the value
    /// mappings of the column of the same name.
    pub fn remove_label_mapping(&mut self, label: &str) -> bool {
        let had_records = self.export_records.iter().any(|r| r.is_for_label(label));
        self.export_records.retain(|r| !r.is_for_label(label));
        let had_mapping = self.column_mapping.remove(label).is_some();

        let removed_values: Vec<String> = self
            .value_mapping
            .remove(label)
            .map(|values| values.into_keys().collect())
            .unwrap_or_default();
        self.value_selections.retain(|(column, _), _| column != label);

        if self.active_label() == Some(label) {
            self.selected_terms.clear();
        }
        if self.active_column.as_deref() == Some(label) {
            self.value_selection.clear();
        }
        if let Some(nav) = self.navigation.get_mut(label) {
            nav.selected_terms.clear();
            nav.value_selection.clear();
        }

        self.bump_generation(SearchContext::label(label));
        for value in &removed_values {
            self.bump_generation(SearchContext::value(label, value.as_str()));
        }

        let removed = had_records || had_mapping || !removed_values.is_empty();
        if removed {
            self.notify(
                NoticeLevel::Success,
                format!("Mapping for '{label}' has been removed"),
            );
        }
        removed
    }

    /// Drop the value-level mapping of one `(column, value)` pair.
    pub fn remove_value_mapping(&mut self, column: &str, value: &str) -> bool {
        let removed = self.drop_value_entry(column, value);
        self.value_selections
            .remove(&(column.to_string(), value.to_string()));
        self.clear_live_value_selection(column, value, None);
        self.bump_generation(SearchContext::value(column, value));
        if removed {
            self.notify(
                NoticeLevel::Success,
                format!("Value mapping for '{column}' = '{value}' has been removed"),
            );
        }
        removed
    }

    /// Remove a single term from the mapping for `label`.
    pub fn remove_term_from_label(&mut self, label: &str, term_uri: &str) -> bool {
        let before = self.export_records.len();
        self.export_records
            .retain(|r| !(r.is_for_label(label) && r.term_uri == term_uri));
        let mut removed = self.export_records.len() != before;

        let now_empty = match self.column_mapping.get_mut(label) {
            Some(mapping) => {
                removed |= mapping.selected_term_uris.remove(term_uri);
                mapping.records.retain(|r| r.term_uri != term_uri);
                mapping.records.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.column_mapping.remove(label);
        }

        if self.active_label() == Some(label) {
            self.selected_terms.remove(term_uri);
        }
        if let Some(nav) = self.navigation.get_mut(label) {
            nav.selected_terms.remove(term_uri);
        }
        self.bump_generation(SearchContext::label(label));
        removed
    }

    /// Remove a single term from the mapping for `(column, value)`.
    pub fn remove_term_from_value(&mut self, column: &str, value: &str, term_uri: &str) -> bool {
        let mut removed = false;
        let mut now_empty = false;
        if let Some(records) = self
            .value_mapping
            .get_mut(column)
            .and_then(|values| values.get_mut(value))
        {
            let before = records.len();
            records.retain(|r| r.term_uri != term_uri);
            removed = records.len() != before;
            now_empty = records.is_empty();
        }
        if now_empty {
            self.drop_value_entry(column, value);
        }

        let key = (column.to_string(), value.to_string());
        if let Some(saved) = self.value_selections.get_mut(&key) {
            saved.remove(term_uri);
            if saved.is_empty() {
                self.value_selections.remove(&key);
            }
        }
        self.clear_live_value_selection(column, value, Some(term_uri));
        self.bump_generation(SearchContext::value(column, value));
        removed
    }

    /// Remove `term_uri` (or everything, for `None`) from the live and
    /// snapshotted selection of `(column, value)`.
    fn clear_live_value_selection(&mut self, column: &str, value: &str, term_uri: Option<&str>) {
        let prune = |set: &mut BTreeSet<String>| match term_uri {
            Some(uri) => {
                set.remove(uri);
            }
            None => set.clear(),
        };
        if self.active_column.as_deref() == Some(column)
            && self.active_value.as_deref() == Some(value)
        {
            prune(&mut self.value_selection);
        }
        if let Some(nav) = self.navigation.get_mut(column) {
            if nav.selected_unique_value.as_deref() == Some(value) {
                prune(&mut nav.value_selection);
            }
        }
    }

    // ========================================================================
    // Data types
    // ========================================================================

    /// Convert a dataset column and retag every record derived for it.
    pub fn change_column_type(&mut self, column: &str, data_type: DataType) -> Result<()> {
        if let Err(err) = self.dataset_mut()?.change_column_type(column, data_type) {
            self.notify(
                NoticeLevel::Error,
                format!("Error converting column type: {err}"),
            );
            return Err(err);
        }

        for record in self
            .export_records
            .iter_mut()
            .filter(|r| r.is_for_label(column))
        {
            record.data_type = data_type;
        }
        if let Some(mapping) = self.column_mapping.get_mut(column) {
            for record in &mut mapping.records {
                record.data_type = data_type;
            }
        }
        if let Some(values) = self.value_mapping.get_mut(column) {
            for record in values.values_mut().flatten() {
                record.data_type = data_type;
            }
        }

        self.notify(
            NoticeLevel::Success,
            format!("Column '{column}' converted to {data_type}"),
        );
        Ok(())
    }

    /// Edit the type of one exported record. Returns `false` if no record
    /// matches.
    pub fn retag_record(&mut self, label: &str, term_uri: &str, data_type: DataType) -> bool {
        let mut found = false;
        for record in self
            .export_records
            .iter_mut()
            .filter(|r| r.is_for_label(label) && r.term_uri == term_uri)
        {
            record.data_type = data_type;
            found = true;
        }
        if let Some(mapping) = self.column_mapping.get_mut(label) {
            for record in mapping.records.iter_mut().filter(|r| r.term_uri == term_uri) {
                record.data_type = data_type;
            }
        }
        found
    }
}
