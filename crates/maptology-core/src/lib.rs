//! # Maptology core
//!
//! Session state and mapping logic for annotating a tabular dataset with
//! ontology terms.
//!
//! ```text
//! Dataset ──► SessionStore ──► navigation / search ──► TermLookup (service)
//!                  │
//!                  └──► engine (reconciliation) ──► export (CSV, LinkML)
//! ```
//!
//! The lookup service sits behind [`TermLookup`]; this crate never does
//! network I/O itself.

pub mod dataset;
pub mod engine;
pub mod error;
pub mod export;
pub mod lookup;
pub mod model;
pub mod navigation;
pub mod search;
pub mod session;

pub use dataset::{Column, ColumnSummary, Dataset, VALUE_CHOICE_LIMIT};
pub use error::{MappingError, Result};
pub use export::{
    safe_attribute_name, ExtendedSchema, LinkmlSchema, COLUMN_MAPPINGS_FILE, EXTENDED_SCHEMA_FILE,
    SCHEMA_JSON_FILE, SCHEMA_YAML_FILE, VALUE_MAPPINGS_FILE,
};
pub use lookup::{
    filter_catalog, shape_catalog, shape_results, LookupError, LookupQuery, SearchMode,
    TermLookup,
};
pub use model::{
    ontology_page_url, term_page_url, DataType, MappingRecord, OntologyInfo, OntologyTerm,
    SearchContext, SearchResultSet, ONTOLOGY_SELECTION_LIMIT,
};
pub use session::{
    ColumnMapping, ColumnNavigationState, Notice, NoticeLevel, OntologySelection, SessionStore,
    WidgetKey,
};
