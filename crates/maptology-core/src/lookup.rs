//! The seam between the session and the ontology lookup service.
//!
//! Implementations only move bytes; the filtering, deduplication and
//! ordering rules live in [`shape_results`] so every client behaves the same.

use serde::Deserialize;
use std::collections::HashSet;

use crate::model::{OntologyInfo, OntologyTerm};

/// Which search path issued the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Column/value auto-search: hits without a definition are dropped.
    Auto,
    /// Manual "search all": definitions are optional, larger page.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub text: String,
    pub ontologies: Vec<String>,
    pub mode: SearchMode,
}

impl LookupQuery {
    pub fn new(text: &str, ontologies: &[String], mode: SearchMode) -> Self {
        Self {
            text: text.trim().to_string(),
            ontologies: ontologies.to_vec(),
            mode,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    #[error("no API key configured for the lookup service")]
    MissingCredential,
    #[error("lookup service returned status {status}")]
    Status { status: u16 },
    #[error("lookup service unreachable: {0}")]
    Transport(String),
    #[error("lookup service returned an unreadable response: {0}")]
    Decode(String),
}

/// Ontology term lookup service.
pub trait TermLookup {
    /// Terms matching `query`, shaped with [`shape_results`].
    fn search(&self, query: &LookupQuery) -> Result<Vec<OntologyTerm>, LookupError>;

    /// Full catalog of ontologies available for restriction.
    fn catalog(&self) -> Result<Vec<OntologyInfo>, LookupError>;

    /// Human readable name for an ontology acronym. Falls back to the acronym.
    fn ontology_name(&self, acronym: &str) -> String;
}

// ============================================================================
// Wire shapes (BioPortal search response)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub collection: Vec<RawSearchHit>,
    #[serde(default, rename = "totalCount")]
    pub total_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSearchHit {
    #[serde(default, rename = "@id")]
    pub id: Option<String>,
    #[serde(default, rename = "prefLabel")]
    pub pref_label: Option<String>,
    #[serde(default)]
    pub definition: Option<Vec<String>>,
    #[serde(default)]
    pub links: Option<RawLinks>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub context: Option<RawContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLinks {
    #[serde(default)]
    pub ontology: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContext {
    #[serde(default)]
    pub acronym: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOntology {
    #[serde(default)]
    pub acronym: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

const NOT_AVAILABLE: &str = "N/A";
const CATALOG_DESCRIPTION_LIMIT: usize = 100;

fn usable(s: &Option<String>) -> Option<&str> {
    match s.as_deref().map(str::trim) {
        Some("") | Some(NOT_AVAILABLE) | None => None,
        Some(v) => Some(v),
    }
}

impl RawSearchHit {
    /// Source ontology acronym: ontology link tail, then `source`, then
    /// `context.acronym`.
    pub fn ontology_acronym(&self) -> Option<String> {
        if let Some(link) = self.links.as_ref().and_then(|l| usable(&l.ontology)) {
            if let Some(tail) = link.trim_end_matches('/').rsplit('/').next() {
                if !tail.is_empty() {
                    return Some(tail.to_string());
                }
            }
        }
        if let Some(source) = usable(&self.source) {
            return Some(source.to_string());
        }
        self.context
            .as_ref()
            .and_then(|c| usable(&c.acronym))
            .map(str::to_string)
    }

    fn first_definition(&self) -> Option<String> {
        self.definition
            .as_ref()
            .and_then(|d| d.first())
            .map(|d| d.trim())
            .filter(|d| !d.is_empty() && *d != NOT_AVAILABLE)
            .map(str::to_string)
    }
}

/// Turn raw hits into the ordered, deduplicated result set.
pub fn shape_results(
    hits: Vec<RawSearchHit>,
    allowed_ontologies: &[String],
    mode: SearchMode,
) -> Vec<OntologyTerm> {
    let allowed: HashSet<&str> = allowed_ontologies.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut terms = Vec::new();

    for hit in hits {
        let Some(label) = usable(&hit.pref_label).map(str::to_string) else {
            continue;
        };
        let Some(term_uri) = usable(&hit.id).map(str::to_string) else {
            continue;
        };
        let definition = hit.first_definition();
        if mode == SearchMode::Auto && definition.is_none() {
            continue;
        }
        let Some(acronym) = hit.ontology_acronym() else {
            continue;
        };
        if !allowed.contains(acronym.as_str()) {
            continue;
        }
        if !seen.insert(term_uri.clone()) {
            continue;
        }
        let ontology_uri = hit
            .links
            .as_ref()
            .and_then(|l| usable(&l.ontology))
            .unwrap_or(NOT_AVAILABLE)
            .to_string();
        terms.push(OntologyTerm {
            term_uri,
            preferred_label: label,
            ontology_abbreviation: acronym,
            ontology_uri,
            definition,
        });
    }

    terms.sort_by(|a, b| {
        a.preferred_label
            .cmp(&b.preferred_label)
            .then_with(|| a.ontology_abbreviation.cmp(&b.ontology_abbreviation))
    });
    terms
}

/// Catalog entries with an acronym, short descriptions, sorted by acronym.
pub fn shape_catalog(raw: Vec<RawOntology>) -> Vec<OntologyInfo> {
    let mut out: Vec<OntologyInfo> = raw
        .into_iter()
        .filter_map(|o| {
            let acronym = o.acronym.filter(|a| !a.trim().is_empty())?;
            let description = o.description.unwrap_or_default();
            let description = if description.chars().count() > CATALOG_DESCRIPTION_LIMIT {
                let cut: String = description.chars().take(CATALOG_DESCRIPTION_LIMIT).collect();
                format!("{cut}...")
            } else {
                description
            };
            Some(OntologyInfo {
                acronym,
                name: o.name.unwrap_or_default(),
                description,
            })
        })
        .collect();
    out.sort_by(|a, b| a.acronym.cmp(&b.acronym));
    out
}

/// Case-insensitive match on acronym or name.
pub fn filter_catalog<'a>(catalog: &'a [OntologyInfo], query: &str) -> Vec<&'a OntologyInfo> {
    let q = query.trim().to_lowercase();
    catalog
        .iter()
        .filter(|o| {
            q.is_empty() || o.acronym.to_lowercase().contains(&q) || o.name.to_lowercase().contains(&q)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, label: &str, ontology: &str, definition: Option<&str>) -> RawSearchHit {
        RawSearchHit {
            id: Some(id.to_string()),
            pref_label: Some(label.to_string()),
            definition: definition.map(|d| vec![d.to_string()]),
            links: Some(RawLinks {
                ontology: Some(format!("https://data.bioontology.org/ontologies/{ontology}")),
            }),
            source: None,
            context: None,
        }
    }

    fn allowed(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn auto_mode_drops_terms_without_definition() {
        let hits = vec![
            hit("u1", "Sex", "OMIT", Some("biological sex")),
            hit("u2", "Gender", "OMIT", None),
        ];
        let terms = shape_results(hits.clone(), &allowed(&["OMIT"]), SearchMode::Auto);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].term_uri, "u1");

        let terms = shape_results(hits, &allowed(&["OMIT"]), SearchMode::All);
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].definition, None);
    }

    #[test]
    fn filters_dedups_and_sorts() {
        let hits = vec![
            hit("u3", "Sex", "NCIT", Some("d")),
            hit("u1", "Sex", "MESH", Some("d")),
            hit("u2", "Age", "NCIT", Some("d")),
            hit("u2", "Age", "NCIT", Some("d")),
            hit("u4", "N/A", "NCIT", Some("d")),
            hit("u5", "Other", "SNOMED", Some("d")),
        ];
        let terms = shape_results(hits, &allowed(&["NCIT", "MESH"]), SearchMode::Auto);
        let uris: Vec<&str> = terms.iter().map(|t| t.term_uri.as_str()).collect();
        assert_eq!(uris, vec!["u2", "u1", "u3"]);
    }

    #[test]
    fn acronym_falls_back_to_source_then_context() {
        let mut h = hit("u1", "Sex", "X", Some("d"));
        h.links = None;
        h.source = Some("OMIT".to_string());
        assert_eq!(h.ontology_acronym().as_deref(), Some("OMIT"));

        h.source = None;
        h.context = Some(RawContext {
            acronym: Some("NCIT".to_string()),
        });
        assert_eq!(h.ontology_acronym().as_deref(), Some("NCIT"));

        h.context = None;
        assert_eq!(h.ontology_acronym(), None);
    }

    #[test]
    fn deserializes_bioportal_page() {
        let body = r#"{
            "collection": [{
                "@id": "http://purl.obolibrary.org/obo/OMIT_0013622",
                "prefLabel": "Sex",
                "definition": ["The biological sex"],
                "links": {"ontology": "https://data.bioontology.org/ontologies/OMIT"}
            }],
            "totalCount": 1
        }"#;
        let page: SearchPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.total_count, 1);
        let terms = shape_results(page.collection, &allowed(&["OMIT"]), SearchMode::Auto);
        assert_eq!(terms[0].ontology_abbreviation, "OMIT");
        assert_eq!(terms[0].definition.as_deref(), Some("The biological sex"));
    }

    #[test]
    fn catalog_is_sorted_and_truncated() {
        let raw = vec![
            RawOntology {
                acronym: Some("NCIT".into()),
                name: Some("NCI Thesaurus".into()),
                description: Some("x".repeat(150)),
            },
            RawOntology {
                acronym: None,
                name: Some("nameless".into()),
                description: None,
            },
            RawOntology {
                acronym: Some("MESH".into()),
                name: Some("Medical Subject Headings".into()),
                description: None,
            },
        ];
        let catalog = shape_catalog(raw);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].acronym, "MESH");
        assert_eq!(catalog[1].description.len(), 103);

        let hits = filter_catalog(&catalog, "thesaurus");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].acronym, "NCIT");
    }
}
