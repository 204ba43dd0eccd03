//! Core record types shared by the session store, the reconciliation engine
//! and the exporters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MappingError;

/// Maximum number of ontologies a search may be restricted to.
pub const ONTOLOGY_SELECTION_LIMIT: usize = 10;

const BIOPORTAL_UI_BASE: &str = "https://bioportal.bioontology.org/ontologies";

// ============================================================================
// Data types
// ============================================================================

/// Semantic type of a dataset column (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    String,
    Categorical,
    Float,
    Integer,
    Boolean,
    Date,
}

impl DataType {
    pub const ALL: [DataType; 6] = [
        DataType::String,
        DataType::Categorical,
        DataType::Float,
        DataType::Integer,
        DataType::Boolean,
        DataType::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "String",
            DataType::Categorical => "Categorical",
            DataType::Float => "Float",
            DataType::Integer => "Integer",
            DataType::Boolean => "Boolean",
            DataType::Date => "Date",
        }
    }

    /// Columns of these types get value-level mapping.
    pub fn is_textual(&self) -> bool {
        matches!(self, DataType::String | DataType::Categorical)
    }

    /// LinkML `range` used in the exported schema.
    pub fn linkml_range(&self) -> &'static str {
        match self {
            DataType::String | DataType::Categorical => "string",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MappingError::UnknownDataType(s.to_string()))
    }
}

// ============================================================================
// Terms and records
// ============================================================================

/// A concept returned by the lookup service. Immutable once shaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyTerm {
    pub term_uri: String,
    pub preferred_label: String,
    pub ontology_abbreviation: String,
    pub ontology_uri: String,
    pub definition: Option<String>,
}

/// One row of the mapping tables.
///
/// `original_label` is `None` for value mappings. Only `data_type` may be
/// edited after derivation; everything else comes from reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub original_label: Option<String>,
    pub preferred_label: String,
    pub ontology_display_name: String,
    pub ontology_abbr: String,
    pub ontology_uri: String,
    pub term_uri: String,
    pub data_type: DataType,
    pub definition: Option<String>,
}

impl MappingRecord {
    pub fn derive(
        original_label: Option<&str>,
        term: &OntologyTerm,
        ontology_full_name: &str,
        data_type: DataType,
    ) -> Self {
        Self {
            original_label: original_label.map(str::to_string),
            preferred_label: term.preferred_label.clone(),
            ontology_display_name: format!(
                "{} ({})",
                ontology_full_name, term.ontology_abbreviation
            ),
            ontology_abbr: term.ontology_abbreviation.clone(),
            ontology_uri: term.ontology_uri.clone(),
            term_uri: term.term_uri.clone(),
            data_type,
            definition: term.definition.clone(),
        }
    }

    pub fn is_for_label(&self, label: &str) -> bool {
        self.original_label.as_deref() == Some(label)
    }
}

// ============================================================================
// Search results and contexts
// ============================================================================

/// Scope of an active search/selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SearchContext {
    /// Column-level context keyed by label (column name or manual query).
    Label(String),
    /// Value-level context.
    Value { column: String, value: String },
}

impl SearchContext {
    pub fn label(label: impl Into<String>) -> Self {
        SearchContext::Label(label.into())
    }

    pub fn value(column: impl Into<String>, value: impl Into<String>) -> Self {
        SearchContext::Value {
            column: column.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for SearchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchContext::Label(label) => write!(f, "{label}"),
            SearchContext::Value { column, value } => write!(f, "{column}={value}"),
        }
    }
}

/// Ordered lookup results bound to exactly one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultSet {
    pub context: SearchContext,
    pub terms: Vec<OntologyTerm>,
}

impl SearchResultSet {
    pub fn new(context: SearchContext, terms: Vec<OntologyTerm>) -> Self {
        Self { context, terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, term_uri: &str) -> bool {
        self.terms.iter().any(|t| t.term_uri == term_uri)
    }

    pub fn get(&self, position: usize) -> Option<&OntologyTerm> {
        self.terms.get(position)
    }

    pub fn position_of(&self, term_uri: &str) -> Option<usize> {
        self.terms.iter().position(|t| t.term_uri == term_uri)
    }
}

/// Catalog entry for an ontology the user can restrict searches to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyInfo {
    pub acronym: String,
    pub name: String,
    pub description: String,
}

// ============================================================================
// Browser links
// ============================================================================

/// Link to a term's page in the BioPortal browser.
pub fn term_page_url(ontology_abbr: &str, term_uri: &str) -> String {
    let concept: String = url::form_urlencoded::byte_serialize(term_uri.as_bytes()).collect();
    format!("{BIOPORTAL_UI_BASE}/{ontology_abbr}?p=classes&conceptid={concept}")
}

/// Link to an ontology's summary page in the BioPortal browser.
pub fn ontology_page_url(ontology_abbr: &str) -> String {
    format!("{BIOPORTAL_UI_BASE}/{ontology_abbr}")
}
