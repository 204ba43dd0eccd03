//! Lookup-driven actions: column and value searches, manual searches, the
//! ontology catalog and the ontology restriction.
//!
//! Failures never escape as errors. Each outcome becomes a notice and the
//! affected result set is left alone (precondition failures) or cleared
//! (service failures and empty results).

use crate::error::{MappingError, Result};
use crate::lookup::{LookupError, LookupQuery, SearchMode, TermLookup};
use crate::model::{OntologyInfo, OntologyTerm, SearchContext, SearchResultSet};
use crate::session::{NoticeLevel, SessionStore};

pub(crate) const SELECT_ONTOLOGY_FIRST: &str = "Please select at least one ontology first.";
const MISSING_API_KEY: &str =
    "BioPortal API key not found. Please set the BIOPORTAL_API_KEY environment variable.";

pub(crate) enum LookupOutcome {
    /// A precondition failed; nothing was requested.
    Skipped,
    Failed,
    Empty,
    Found(Vec<OntologyTerm>),
}

impl SessionStore {
    pub(crate) fn run_lookup(
        &mut self,
        lookup: &dyn TermLookup,
        text: &str,
        mode: SearchMode,
    ) -> LookupOutcome {
        if self.ontologies.is_empty() {
            self.notify(NoticeLevel::Warning, SELECT_ONTOLOGY_FIRST);
            return LookupOutcome::Skipped;
        }
        let query = LookupQuery::new(text, self.ontologies.as_slice(), mode);
        match lookup.search(&query) {
            Ok(terms) if terms.is_empty() => {
                self.notify(
                    NoticeLevel::Warning,
                    format!("No results found for '{}'", query.text),
                );
                LookupOutcome::Empty
            }
            Ok(terms) => {
                tracing::debug!(query = %query.text, hits = terms.len(), "lookup succeeded");
                self.remember_ontology_names(lookup, &terms);
                LookupOutcome::Found(terms)
            }
            Err(LookupError::MissingCredential) => {
                self.notify(NoticeLevel::Warning, MISSING_API_KEY);
                LookupOutcome::Skipped
            }
            Err(err) => {
                tracing::warn!(query = %query.text, error = %err, "lookup failed");
                self.notify(
                    NoticeLevel::Error,
                    format!("Error searching BioPortal: {err}"),
                );
                LookupOutcome::Failed
            }
        }
    }

    fn remember_ontology_names(&mut self, lookup: &dyn TermLookup, terms: &[OntologyTerm]) {
        for term in terms {
            let acronym = &term.ontology_abbreviation;
            if !self.ontology_names.contains_key(acronym) {
                let name = lookup.ontology_name(acronym);
                self.ontology_names.insert(acronym.clone(), name);
            }
        }
    }

    fn install_column_results(&mut self, label: &str, outcome: LookupOutcome) -> bool {
        match outcome {
            LookupOutcome::Skipped => false,
            LookupOutcome::Failed | LookupOutcome::Empty => {
                self.column_results = None;
                false
            }
            LookupOutcome::Found(terms) => {
                let results = SearchResultSet::new(SearchContext::label(label), terms);
                if self.active_label() == Some(label) {
                    self.selected_terms.retain(|uri| results.contains(uri));
                }
                self.column_results = Some(results);
                true
            }
        }
    }

    fn install_value_results(&mut self, column: &str, value: &str, outcome: LookupOutcome) -> bool {
        match outcome {
            LookupOutcome::Skipped => false,
            LookupOutcome::Failed | LookupOutcome::Empty => {
                self.value_results = None;
                false
            }
            LookupOutcome::Found(terms) => {
                let results = SearchResultSet::new(SearchContext::value(column, value), terms);
                self.value_selection.retain(|uri| results.contains(uri));
                self.value_results = Some(results);
                true
            }
        }
    }

    // ========================================================================
    // Column level
    // ========================================================================

    /// Search the active column's name. Returns `true` if results were
    /// installed.
    pub fn search_active_column(&mut self, lookup: &dyn TermLookup) -> bool {
        let Some(column) = self.active_column.clone() else {
            return false;
        };
        let outcome = self.run_lookup(lookup, &column, SearchMode::Auto);
        self.install_column_results(&column, outcome)
    }

    /// Search a free-text query across the selected ontologies. The query
    /// becomes the label subsequent selections are mapped under.
    pub fn manual_column_search(&mut self, lookup: &dyn TermLookup, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            self.notify(NoticeLevel::Warning, "Please enter a search term.");
            return false;
        }
        if self.ontologies.is_empty() {
            self.notify(NoticeLevel::Warning, SELECT_ONTOLOGY_FIRST);
            return false;
        }
        let outcome = self.run_lookup(lookup, query, SearchMode::All);
        if matches!(outcome, LookupOutcome::Skipped) {
            return false;
        }
        self.manual_search_term = Some(query.to_string());
        self.selected_terms.clear();
        self.install_column_results(query, outcome)
    }

    /// Return to mapping the active column itself after a manual search.
    pub fn clear_manual_search(&mut self, lookup: &dyn TermLookup) -> bool {
        if self.manual_search_term.take().is_none() {
            return false;
        }
        self.selected_terms = self
            .active_column
            .as_deref()
            .and_then(|c| self.column_mapping.get(c))
            .map(|m| m.selected_term_uris.clone())
            .unwrap_or_default();
        self.search_active_column(lookup)
    }

    // ========================================================================
    // Value level
    // ========================================================================

    pub(crate) fn search_active_value(&mut self, lookup: &dyn TermLookup, text: Option<&str>) -> bool {
        let (Some(column), Some(value)) = (self.active_column.clone(), self.active_value.clone())
        else {
            return false;
        };
        let (text, mode) = match text {
            Some(t) => (t.to_string(), SearchMode::All),
            None => (value.clone(), SearchMode::Auto),
        };
        let outcome = self.run_lookup(lookup, &text, mode);
        self.install_value_results(&column, &value, outcome)
    }

    /// Switch the active value of the active column.
    ///
    /// The selection of the value being left is saved, the saved selection
    /// of the new value restored, and the new value searched. Returns
    /// `Ok(false)` if `value` was already active.
    pub fn select_value(&mut self, lookup: &dyn TermLookup, value: &str) -> Result<bool> {
        let Some(column) = self.active_column.clone() else {
            self.notify(NoticeLevel::Warning, "Please select a column first.");
            return Ok(false);
        };
        let choices = self
            .dataset
            .as_ref()
            .ok_or(MappingError::NoDataset)?
            .value_choices(&column)?;
        if !choices.iter().any(|c| c == value) {
            return Err(MappingError::UnknownValue {
                column,
                value: value.to_string(),
            });
        }
        if self.active_value.as_deref() == Some(value) {
            return Ok(false);
        }

        if let Some(previous) = self.active_value.take() {
            if !self.value_selection.is_empty() {
                self.value_selections
                    .insert((column.clone(), previous), self.value_selection.clone());
            }
        }
        self.value_selection = self
            .value_selections
            .get(&(column.clone(), value.to_string()))
            .cloned()
            .unwrap_or_default();
        self.active_value = Some(value.to_string());

        self.search_active_value(lookup, None);
        Ok(true)
    }

    /// Free-text search for the active value. Results stay bound to the
    /// active `(column, value)` pair.
    pub fn manual_value_search(&mut self, lookup: &dyn TermLookup, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            self.notify(NoticeLevel::Warning, "Please enter a search term.");
            return false;
        }
        if self.active_value.is_none() {
            self.notify(NoticeLevel::Warning, "Please select a value first.");
            return false;
        }
        self.search_active_value(lookup, Some(query))
    }

    // ========================================================================
    // Ontologies
    // ========================================================================

    /// Catalog of ontologies, fetched once per session. A failed fetch is
    /// retried on the next call.
    pub fn ensure_catalog(&mut self, lookup: &dyn TermLookup) -> &[OntologyInfo] {
        if self.catalog.is_none() {
            match lookup.catalog() {
                Ok(catalog) => {
                    for info in catalog.iter().filter(|o| !o.name.is_empty()) {
                        self.ontology_names
                            .entry(info.acronym.clone())
                            .or_insert_with(|| info.name.clone());
                    }
                    self.catalog = Some(catalog);
                }
                Err(LookupError::MissingCredential) => {
                    self.notify(NoticeLevel::Warning, MISSING_API_KEY);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "catalog fetch failed");
                    self.notify(
                        NoticeLevel::Error,
                        format!("Error fetching available ontologies: {err}"),
                    );
                }
            }
        }
        self.catalog.as_deref().unwrap_or(&[])
    }

    /// Select the first ontologies of the catalog, up to the limit.
    pub fn select_all_ontologies(&mut self) -> usize {
        let Some(catalog) = self.catalog.as_ref() else {
            self.notify(NoticeLevel::Warning, "Ontology catalog is not loaded.");
            return 0;
        };
        let acronyms: Vec<String> = catalog.iter().map(|o| o.acronym.clone()).collect();
        self.ontologies.replace(&acronyms);
        self.ontologies.len()
    }

    /// Re-run the active searches after the ontology restriction changed.
    /// Fires once per change, and only while a column is active and at
    /// least one ontology is selected.
    pub fn apply_ontology_change(&mut self, lookup: &dyn TermLookup) -> bool {
        if !self.ontologies.is_changed() || self.active_column.is_none() || self.ontologies.is_empty()
        {
            return false;
        }
        self.ontologies.take_changed();

        match self.manual_search_term.clone() {
            Some(query) => {
                let outcome = self.run_lookup(lookup, &query, SearchMode::All);
                self.install_column_results(&query, outcome);
            }
            None => {
                self.search_active_column(lookup);
            }
        }
        if self.active_value.is_some() {
            self.search_active_value(lookup, None);
        }
        true
    }
}
