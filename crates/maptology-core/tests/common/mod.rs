//! Shared fixtures: an in-memory lookup service that records every query.

#![allow(dead_code)]

use maptology_core::{
    Dataset, LookupError, LookupQuery, OntologyInfo, OntologyTerm, SessionStore, TermLookup,
};
use std::cell::RefCell;
use std::collections::HashMap;

pub const SAMPLE_CSV: &str = "sex,age,site\nM,34,liver\nF,41,lung\nM,29,liver\nF,50,skin\n";

#[derive(Default)]
pub struct StubLookup {
    responses: HashMap<String, Vec<OntologyTerm>>,
    names: HashMap<String, String>,
    failure: Option<LookupError>,
    pub calls: RefCell<Vec<LookupQuery>>,
}

impl StubLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, terms: Vec<OntologyTerm>) -> Self {
        self.responses.insert(query.to_string(), terms);
        self
    }

    pub fn named(mut self, acronym: &str, name: &str) -> Self {
        self.names.insert(acronym.to_string(), name.to_string());
        self
    }

    pub fn failing(mut self, err: LookupError) -> Self {
        self.failure = Some(err);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn queried(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|q| q.text.clone()).collect()
    }
}

impl TermLookup for StubLookup {
    fn search(&self, query: &LookupQuery) -> Result<Vec<OntologyTerm>, LookupError> {
        self.calls.borrow_mut().push(query.clone());
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self
            .responses
            .get(&query.text)
            .map(|terms| {
                terms
                    .iter()
                    .filter(|t| query.ontologies.contains(&t.ontology_abbreviation))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn catalog(&self) -> Result<Vec<OntologyInfo>, LookupError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let mut catalog: Vec<OntologyInfo> = self
            .names
            .iter()
            .map(|(acronym, name)| OntologyInfo {
                acronym: acronym.clone(),
                name: name.clone(),
                description: String::new(),
            })
            .collect();
        catalog.sort_by(|a, b| a.acronym.cmp(&b.acronym));
        Ok(catalog)
    }

    fn ontology_name(&self, acronym: &str) -> String {
        self.names
            .get(acronym)
            .cloned()
            .unwrap_or_else(|| acronym.to_string())
    }
}

pub fn term(uri: &str, label: &str, ontology: &str) -> OntologyTerm {
    OntologyTerm {
        term_uri: uri.to_string(),
        preferred_label: label.to_string(),
        ontology_abbreviation: ontology.to_string(),
        ontology_uri: format!("https://data.bioontology.org/ontologies/{ontology}"),
        definition: Some(format!("definition of {label}")),
    }
}

pub fn sample_dataset() -> Dataset {
    Dataset::from_reader(SAMPLE_CSV.as_bytes()).unwrap()
}

/// Session with `ontologies` selected and the sample dataset opened.
pub fn opened_store(lookup: &StubLookup, ontologies: &[&str]) -> SessionStore {
    let mut store = SessionStore::new();
    for o in ontologies {
        store.ontologies_mut().insert(o).unwrap();
    }
    store.open_dataset(lookup, sample_dataset()).unwrap();
    store.ontologies_mut().take_changed();
    store.drain_notices();
    store
}
