//! Per-user session state.
//!
//! A [`SessionStore`] is owned by exactly one session and is only mutated
//! through `&mut self`, so nothing here is shared between users. The one
//! cross-session cache (ontology display names) lives behind the
//! [`crate::lookup::TermLookup`] implementation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

use crate::dataset::Dataset;
use crate::error::{MappingError, Result};
use crate::model::{
    MappingRecord, OntologyInfo, SearchContext, SearchResultSet, ONTOLOGY_SELECTION_LIMIT,
};

// ============================================================================
// Notices
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message for the user, produced by an action and drained by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

// ============================================================================
// Ontology restriction
// ============================================================================

/// Ordered, duplicate-free set of ontology acronyms searches are restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologySelection {
    acronyms: Vec<String>,
    changed: bool,
}

impl OntologySelection {
    pub fn as_slice(&self) -> &[String] {
        &self.acronyms
    }

    pub fn is_empty(&self) -> bool {
        self.acronyms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.acronyms.len()
    }

    pub fn contains(&self, acronym: &str) -> bool {
        self.acronyms.iter().any(|a| a == acronym)
    }

    /// Returns `Ok(false)` if already selected.
    pub fn insert(&mut self, acronym: &str) -> Result<bool> {
        let acronym = acronym.trim();
        if acronym.is_empty() || self.contains(acronym) {
            return Ok(false);
        }
        if self.acronyms.len() >= ONTOLOGY_SELECTION_LIMIT {
            return Err(MappingError::OntologyLimit {
                limit: ONTOLOGY_SELECTION_LIMIT,
            });
        }
        self.acronyms.push(acronym.to_string());
        self.changed = true;
        Ok(true)
    }

    pub fn remove(&mut self, acronym: &str) -> bool {
        let before = self.acronyms.len();
        self.acronyms.retain(|a| a != acronym);
        let removed = self.acronyms.len() != before;
        self.changed |= removed;
        removed
    }

    /// Replace the selection; entries beyond the limit are ignored.
    pub fn replace<I, S>(&mut self, acronyms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.acronyms.clear();
        for a in acronyms {
            let a = a.as_ref().trim();
            if a.is_empty() || self.contains(a) {
                continue;
            }
            if self.acronyms.len() == ONTOLOGY_SELECTION_LIMIT {
                break;
            }
            self.acronyms.push(a.to_string());
        }
        self.changed = true;
    }

    pub fn clear(&mut self) {
        self.acronyms.clear();
        self.changed = true;
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Read and reset the one-shot change flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

// ============================================================================
// Mapping state
// ============================================================================

/// Selected terms for one label and the records derived from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub selected_term_uris: BTreeSet<String>,
    pub records: Vec<MappingRecord>,
}

/// What a column looked like when the user last left it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNavigationState {
    pub selected_terms: BTreeSet<String>,
    pub selected_unique_value: Option<String>,
    pub value_results: Option<SearchResultSet>,
    pub value_selection: BTreeSet<String>,
    pub auto_searched: bool,
}

/// Identity of a rendered checkbox. Stale keys never match after a removal
/// because the generation is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WidgetKey {
    pub context: SearchContext,
    pub generation: u64,
    pub position: usize,
}

impl fmt::Display for WidgetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            SearchContext::Label(label) => {
                write!(f, "col_cb_{}_{}_{}", label, self.generation, self.position)
            }
            SearchContext::Value { column, value } => write!(
                f,
                "val_cb_{}_{}_{}_{}",
                column, value, self.generation, self.position
            ),
        }
    }
}

// ============================================================================
// Session store
// ============================================================================

#[derive(Debug, Default)]
pub struct SessionStore {
    pub(crate) dataset: Option<Dataset>,
    pub(crate) ontologies: OntologySelection,
    pub(crate) catalog: Option<Vec<OntologyInfo>>,

    // Column-level context.
    pub(crate) active_column: Option<String>,
    pub(crate) manual_search_term: Option<String>,
    pub(crate) column_results: Option<SearchResultSet>,
    pub(crate) selected_terms: BTreeSet<String>,

    // Value-level context.
    pub(crate) active_value: Option<String>,
    pub(crate) value_results: Option<SearchResultSet>,
    pub(crate) value_selection: BTreeSet<String>,
    pub(crate) auto_searched: bool,

    // Reconciled mappings.
    pub(crate) export_records: Vec<MappingRecord>,
    pub(crate) column_mapping: BTreeMap<String, ColumnMapping>,
    pub(crate) value_mapping: BTreeMap<String, BTreeMap<String, Vec<MappingRecord>>>,
    pub(crate) value_selections: HashMap<(String, String), BTreeSet<String>>,

    pub(crate) ontology_names: HashMap<String, String>,
    pub(crate) navigation: HashMap<String, ColumnNavigationState>,
    pub(crate) generations: HashMap<SearchContext, u64>,
    /// Number of datasets loaded so far; part of every widget generation.
    pub(crate) upload_epoch: u64,
    pub(crate) notices: VecDeque<Notice>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly uploaded dataset. Everything tied to the previous
    /// dataset is dropped; the ontology selection and catalog survive.
    pub fn load_dataset(&mut self, dataset: Dataset) {
        let ontologies = std::mem::take(&mut self.ontologies);
        let catalog = self.catalog.take();
        let generations = std::mem::take(&mut self.generations);
        let upload_epoch = self.upload_epoch + 1;
        let rows = dataset.row_count();
        let cols = dataset.columns().len();
        *self = Self {
            dataset: Some(dataset),
            ontologies,
            catalog,
            generations,
            upload_epoch,
            ..Self::default()
        };
        self.notify(
            NoticeLevel::Success,
            format!("File uploaded successfully! Found {rows} rows and {cols} columns."),
        );
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub(crate) fn dataset_mut(&mut self) -> Result<&mut Dataset> {
        self.dataset.as_mut().ok_or(MappingError::NoDataset)
    }

    pub fn ontologies(&self) -> &OntologySelection {
        &self.ontologies
    }

    pub fn ontologies_mut(&mut self) -> &mut OntologySelection {
        &mut self.ontologies
    }

    pub fn catalog(&self) -> Option<&[OntologyInfo]> {
        self.catalog.as_deref()
    }

    pub fn active_column(&self) -> Option<&str> {
        self.active_column.as_deref()
    }

    pub fn manual_search_term(&self) -> Option<&str> {
        self.manual_search_term.as_deref()
    }

    /// Key that column-level selections are reconciled under: the manual
    /// query when one is active, otherwise the column name.
    pub fn active_label(&self) -> Option<&str> {
        self.manual_search_term
            .as_deref()
            .or(self.active_column.as_deref())
    }

    pub fn column_results(&self) -> Option<&SearchResultSet> {
        self.column_results.as_ref()
    }

    pub fn selected_terms(&self) -> &BTreeSet<String> {
        &self.selected_terms
    }

    pub fn active_value(&self) -> Option<&str> {
        self.active_value.as_deref()
    }

    pub fn value_results(&self) -> Option<&SearchResultSet> {
        self.value_results.as_ref()
    }

    pub fn value_selection(&self) -> &BTreeSet<String> {
        &self.value_selection
    }

    pub fn auto_searched(&self) -> bool {
        self.auto_searched
    }

    /// Flat list of column-level records, in export order.
    pub fn export_records(&self) -> &[MappingRecord] {
        &self.export_records
    }

    pub fn column_mappings(&self) -> &BTreeMap<String, ColumnMapping> {
        &self.column_mapping
    }

    pub fn column_mapping(&self, label: &str) -> Option<&ColumnMapping> {
        self.column_mapping.get(label)
    }

    pub fn value_mappings(&self) -> &BTreeMap<String, BTreeMap<String, Vec<MappingRecord>>> {
        &self.value_mapping
    }

    pub fn value_mapping(&self, column: &str, value: &str) -> Option<&[MappingRecord]> {
        self.value_mapping
            .get(column)
            .and_then(|values| values.get(value))
            .map(Vec::as_slice)
    }

    /// Saved selection for a value, as restored by value switching.
    pub fn saved_value_selection(&self, column: &str, value: &str) -> Option<&BTreeSet<String>> {
        self.value_selections
            .get(&(column.to_string(), value.to_string()))
    }

    pub fn navigation_state(&self, column: &str) -> Option<&ColumnNavigationState> {
        self.navigation.get(column)
    }

    /// `"<full name> (<ACRONYM>)"` source for derived records.
    pub fn ontology_full_name<'a>(&'a self, acronym: &'a str) -> &'a str {
        self.ontology_names
            .get(acronym)
            .map(String::as_str)
            .unwrap_or(acronym)
    }

    pub fn has_mappings(&self) -> bool {
        !self.export_records.is_empty() || !self.value_mapping.is_empty()
    }

    // ------------------------------------------------------------------------
    // Widget identity
    // ------------------------------------------------------------------------

    /// Widget generation of `context`. Grows by one per removal and by one
    /// per dataset upload, so keys never repeat within a session.
    pub fn generation(&self, context: &SearchContext) -> u64 {
        self.upload_epoch + self.generations.get(context).copied().unwrap_or(0)
    }

    pub(crate) fn bump_generation(&mut self, context: SearchContext) -> u64 {
        let slot = self.generations.entry(context).or_insert(0);
        *slot += 1;
        self.upload_epoch + *slot
    }

    pub fn widget_key(&self, context: &SearchContext, position: usize) -> WidgetKey {
        WidgetKey {
            context: context.clone(),
            generation: self.generation(context),
            position,
        }
    }

    // ------------------------------------------------------------------------
    // Notices
    // ------------------------------------------------------------------------

    pub(crate) fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!(%message, "notice"),
            NoticeLevel::Warning => tracing::warn!(%message, "notice"),
            NoticeLevel::Error => tracing::error!(%message, "notice"),
        }
        self.notices.push_back(Notice { level, message });
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ontology_selection_is_bounded_and_tracks_changes() {
        let mut sel = OntologySelection::default();
        assert!(!sel.is_changed());
        for i in 0..ONTOLOGY_SELECTION_LIMIT {
            assert!(sel.insert(&format!("ONT{i}")).unwrap());
        }
        assert!(!sel.insert("ONT0").unwrap());
        assert!(matches!(
            sel.insert("EXTRA"),
            Err(MappingError::OntologyLimit { limit: 10 })
        ));
        assert!(sel.take_changed());
        assert!(!sel.take_changed());

        assert!(sel.remove("ONT3"));
        assert!(!sel.remove("ONT3"));
        assert!(sel.take_changed());
    }

    #[test]
    fn replace_truncates_to_limit() {
        let mut sel = OntologySelection::default();
        sel.replace((0..15).map(|i| format!("O{i}")));
        assert_eq!(sel.len(), ONTOLOGY_SELECTION_LIMIT);
        assert_eq!(sel.as_slice()[0], "O0");
    }

    #[test]
    fn widget_keys_embed_generation() {
        let mut store = SessionStore::new();
        let ctx = SearchContext::label("sex");
        let before = store.widget_key(&ctx, 2);
        assert_eq!(before.to_string(), "col_cb_sex_0_2");
        store.bump_generation(ctx.clone());
        let after = store.widget_key(&ctx, 2);
        assert_ne!(before, after);
        assert_eq!(after.to_string(), "col_cb_sex_1_2");

        let vctx = SearchContext::value("sex", "M");
        assert_eq!(store.widget_key(&vctx, 0).to_string(), "val_cb_sex_M_0_0");
    }

    #[test]
    fn reloading_a_dataset_never_reuses_widget_keys() {
        let mut store = SessionStore::new();
        store.load_dataset(Dataset::from_reader("sex\nM\n".as_bytes()).unwrap());
        let sex = SearchContext::label("sex");
        let age = SearchContext::label("age");
        let first = store.widget_key(&sex, 0);
        store.bump_generation(sex.clone());
        let bumped = store.widget_key(&sex, 0);
        let untouched = store.widget_key(&age, 0);

        store.load_dataset(Dataset::from_reader("sex\nF\n".as_bytes()).unwrap());
        let reloaded = store.widget_key(&sex, 0);
        assert_ne!(reloaded, first);
        assert_ne!(reloaded, bumped);
        assert!(reloaded.generation > bumped.generation);
        assert_ne!(store.widget_key(&age, 0), untouched);
    }

    #[test]
    fn loading_a_dataset_keeps_ontologies() {
        let mut store = SessionStore::new();
        store.ontologies_mut().insert("OMIT").unwrap();
        store.active_column = Some("old".to_string());
        let ds = Dataset::from_reader("a,b\n1,x\n".as_bytes()).unwrap();
        store.load_dataset(ds);
        assert!(store.ontologies().contains("OMIT"));
        assert!(store.active_column().is_none());
        assert_eq!(store.drain_notices().len(), 1);
    }
}
