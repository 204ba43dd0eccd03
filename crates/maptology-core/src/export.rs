//! Tabular and schema exports of the reconciled mappings.
//!
//! Everything here reads the session; only [`SessionStore::write_exports`]
//! touches it, to report what was written.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{MappingError, Result};
use crate::model::{DataType, MappingRecord};
use crate::session::{NoticeLevel, SessionStore};

pub const COLUMN_MAPPINGS_FILE: &str = "column_mappings.csv";
pub const VALUE_MAPPINGS_FILE: &str = "value_mappings.csv";
pub const SCHEMA_YAML_FILE: &str = "ontology_mapping_schema.yaml";
pub const SCHEMA_JSON_FILE: &str = "ontology_mapping_schema.json";
pub const EXTENDED_SCHEMA_FILE: &str = "ontology_mapping_extended.json";

const SCHEMA_ID: &str = "https://example.org/ontology_mapping_schema";
const SCHEMA_NAME: &str = "ontology_mapping_schema";
const CLASS_NAME: &str = "DataMapping";

const COLUMN_HEADERS: [&str; 7] = [
    "Column Name",
    "Preferred Label",
    "Ontology Name",
    "Ontology URI",
    "Ontology Term URI",
    "Data Type",
    "Definition",
];

const VALUE_HEADERS: [&str; 8] = [
    "Column",
    "Value",
    "Preferred Label",
    "Ontology Name",
    "Ontology URI",
    "Ontology Term URI",
    "Data Type",
    "Definition",
];

// ============================================================================
// Schema documents
// ============================================================================

/// Map that serializes in insertion order. Re-inserting a key replaces the
/// value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> OrderedMap<V> {
    /// Insert `value`, returning the value it replaced.
    pub fn insert(&mut self, key: String, value: V) -> Option<V> {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => Some(std::mem::replace(&mut slot.1, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkmlPrefixes {
    pub linkml: String,
    pub schema: String,
    pub xsd: String,
    pub ontology_mapping: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkmlAttribute {
    pub name: String,
    pub description: String,
    pub range: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exact_mappings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkmlClass {
    pub name: String,
    pub description: String,
    pub attributes: OrderedMap<LinkmlAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkmlSchema {
    pub id: String,
    pub name: String,
    pub description: String,
    pub imports: Vec<String>,
    pub prefixes: LinkmlPrefixes,
    pub default_prefix: String,
    pub default_range: String,
    pub classes: OrderedMap<LinkmlClass>,
    pub slots: BTreeMap<String, LinkmlAttribute>,
}

impl LinkmlSchema {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn record_class(&self) -> Option<&LinkmlClass> {
        self.classes.get(CLASS_NAME)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedTerm {
    pub preferred_label: String,
    pub ontology_name: String,
    pub ontology_abbr: String,
    pub ontology_uri: String,
    pub term_uri: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedColumn {
    pub data_type: DataType,
    pub ontology_terms: Vec<ExtendedTerm>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedValueTerm {
    pub preferred_label: String,
    pub ontology_name: String,
    pub term_uri: String,
    pub definition: String,
}

/// Full mapping detail in one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedSchema {
    pub schema_type: String,
    pub description: String,
    pub column_mappings: OrderedMap<ExtendedColumn>,
    pub value_mappings: BTreeMap<String, BTreeMap<String, Vec<ExtendedValueTerm>>>,
}

impl ExtendedSchema {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Attribute name for a label: lowercase, spaces and hyphens become `_`.
pub fn safe_attribute_name(label: &str) -> String {
    label.to_lowercase().replace([' ', '-'], "_")
}

fn definition_text(record: &MappingRecord) -> String {
    record.definition.clone().unwrap_or_default()
}

// ============================================================================
// Builders
// ============================================================================

impl SessionStore {
    /// Column-level records, one row each, in export order.
    pub fn column_mappings_csv(&self) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(COLUMN_HEADERS)?;
        for r in &self.export_records {
            wtr.write_record([
                r.original_label.as_deref().unwrap_or_default(),
                r.preferred_label.as_str(),
                r.ontology_display_name.as_str(),
                r.ontology_uri.as_str(),
                r.term_uri.as_str(),
                r.data_type.as_str(),
                r.definition.as_deref().unwrap_or_default(),
            ])?;
        }
        finish_csv(wtr)
    }

    /// Value-level records, ordered by column, then value, then result order.
    pub fn value_mappings_csv(&self) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(VALUE_HEADERS)?;
        for (column, values) in &self.value_mapping {
            for (value, records) in values {
                for r in records {
                    wtr.write_record([
                        column.as_str(),
                        value.as_str(),
                        r.preferred_label.as_str(),
                        r.ontology_display_name.as_str(),
                        r.ontology_uri.as_str(),
                        r.term_uri.as_str(),
                        r.data_type.as_str(),
                        r.definition.as_deref().unwrap_or_default(),
                    ])?;
                }
            }
        }
        finish_csv(wtr)
    }

    /// Labels in order of first appearance in the export list.
    fn mapped_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for label in self.export_records.iter().filter_map(|r| r.original_label.as_deref()) {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    fn value_comments(&self, column: &str) -> Vec<String> {
        let Some(values) = self.value_mapping.get(column) else {
            return Vec::new();
        };
        values
            .iter()
            .flat_map(|(value, records)| {
                records.iter().map(move |r| {
                    format!(
                        "Value '{value}' maps to: {} ({})",
                        r.preferred_label, r.term_uri
                    )
                })
            })
            .collect()
    }

    /// LinkML schema with one attribute per mapped label, or `None` when
    /// nothing is mapped.
    pub fn linkml_schema(&self) -> Option<LinkmlSchema> {
        if !self.has_mappings() {
            return None;
        }

        let mut attributes = OrderedMap::default();
        for label in self.mapped_labels() {
            let records: Vec<&MappingRecord> = self
                .export_records
                .iter()
                .filter(|r| r.is_for_label(label))
                .collect();
            let data_type = records.first().map(|r| r.data_type).unwrap_or(DataType::String);
            let mut exact_mappings: Vec<String> = Vec::new();
            for r in &records {
                if !exact_mappings.contains(&r.term_uri) {
                    exact_mappings.push(r.term_uri.clone());
                }
            }
            let name = safe_attribute_name(label);
            let replaced = attributes.insert(
                name.clone(),
                LinkmlAttribute {
                    name: name.clone(),
                    description: format!("Mapping for column: {label}"),
                    range: data_type.linkml_range().to_string(),
                    exact_mappings,
                    comments: self.value_comments(label),
                },
            );
            if replaced.is_some() {
                tracing::warn!(attribute = %name, label = %label, "schema attribute name collision; later mapping replaces earlier");
            }
        }

        // Columns mapped only at value level.
        for (column, values) in &self.value_mapping {
            if self.column_mapping.contains_key(column) {
                continue;
            }
            let data_type = values
                .values()
                .flatten()
                .next()
                .map(|r| r.data_type)
                .unwrap_or(DataType::String);
            let mut exact_mappings: Vec<String> = Vec::new();
            for r in values.values().flatten() {
                if !exact_mappings.contains(&r.term_uri) {
                    exact_mappings.push(r.term_uri.clone());
                }
            }
            let name = safe_attribute_name(column);
            let replaced = attributes.insert(
                name.clone(),
                LinkmlAttribute {
                    name: name.clone(),
                    description: format!("Value mapping for column: {column}"),
                    range: data_type.linkml_range().to_string(),
                    exact_mappings,
                    comments: self.value_comments(column),
                },
            );
            if replaced.is_some() {
                tracing::warn!(attribute = %name, label = %column, "schema attribute name collision; later mapping replaces earlier");
            }
        }

        let mut classes = OrderedMap::default();
        classes.insert(
            CLASS_NAME.to_string(),
            LinkmlClass {
                name: CLASS_NAME.to_string(),
                description: "A data mapping with multiple ontology terms".to_string(),
                attributes,
            },
        );

        Some(LinkmlSchema {
            id: SCHEMA_ID.to_string(),
            name: SCHEMA_NAME.to_string(),
            description: "Schema for ontology mappings with support for multiple terms per column/value".to_string(),
            imports: vec!["linkml:types".to_string()],
            prefixes: LinkmlPrefixes {
                linkml: "https://w3id.org/linkml/".to_string(),
                schema: "http://schema.org/".to_string(),
                xsd: "http://www.w3.org/2001/XMLSchema#".to_string(),
                ontology_mapping: "https://example.org/ontology_mapping/".to_string(),
            },
            default_prefix: "ontology_mapping".to_string(),
            default_range: "string".to_string(),
            classes,
            slots: BTreeMap::new(),
        })
    }

    /// Every mapping with its full term detail, or `None` when nothing is
    /// mapped.
    pub fn extended_schema(&self) -> Option<ExtendedSchema> {
        if !self.has_mappings() {
            return None;
        }

        let mut column_mappings = OrderedMap::default();
        for label in self.mapped_labels() {
            let records: Vec<&MappingRecord> = self
                .export_records
                .iter()
                .filter(|r| r.is_for_label(label))
                .collect();
            column_mappings.insert(
                label.to_string(),
                ExtendedColumn {
                    data_type: records.first().map(|r| r.data_type).unwrap_or(DataType::String),
                    ontology_terms: records
                        .iter()
                        .map(|r| ExtendedTerm {
                            preferred_label: r.preferred_label.clone(),
                            ontology_name: r.ontology_display_name.clone(),
                            ontology_abbr: r.ontology_abbr.clone(),
                            ontology_uri: r.ontology_uri.clone(),
                            term_uri: r.term_uri.clone(),
                            definition: definition_text(r),
                        })
                        .collect(),
                },
            );
        }

        let value_mappings = self
            .value_mapping
            .iter()
            .map(|(column, values)| {
                let values = values
                    .iter()
                    .map(|(value, records)| {
                        let terms = records
                            .iter()
                            .map(|r| ExtendedValueTerm {
                                preferred_label: r.preferred_label.clone(),
                                ontology_name: r.ontology_display_name.clone(),
                                term_uri: r.term_uri.clone(),
                                definition: definition_text(r),
                            })
                            .collect();
                        (value.clone(), terms)
                    })
                    .collect();
                (column.clone(), values)
            })
            .collect();

        Some(ExtendedSchema {
            schema_type: "extended_ontology_mapping".to_string(),
            description: "Extended schema with value mappings (for documentation purposes, not LinkML compliant)".to_string(),
            column_mappings,
            value_mappings,
        })
    }

    /// Write every non-empty export into `dir` and return the files written.
    pub fn write_exports(&mut self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        if !self.export_records.is_empty() {
            written.push(write_file(dir, COLUMN_MAPPINGS_FILE, &self.column_mappings_csv()?)?);
        }
        if !self.value_mapping.is_empty() {
            written.push(write_file(dir, VALUE_MAPPINGS_FILE, &self.value_mappings_csv()?)?);
        }

        match (self.linkml_schema(), self.extended_schema()) {
            (Some(schema), Some(extended)) => {
                written.push(write_file(dir, SCHEMA_YAML_FILE, &schema.to_yaml()?)?);
                written.push(write_file(dir, SCHEMA_JSON_FILE, &schema.to_json()?)?);
                written.push(write_file(dir, EXTENDED_SCHEMA_FILE, &extended.to_json()?)?);
                self.notify(
                    NoticeLevel::Success,
                    format!("Wrote {} export files to {}", written.len(), dir.display()),
                );
            }
            _ => self.notify(
                NoticeLevel::Warning,
                "No mappings available to generate schema.",
            ),
        }
        Ok(written)
    }
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr
        .into_inner()
        .map_err(|e| MappingError::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| MappingError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, contents)?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "export written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OntologyTerm, SearchContext, SearchResultSet};
    use std::collections::BTreeSet;

    fn term(uri: &str, label: &str, def: Option<&str>) -> OntologyTerm {
        OntologyTerm {
            term_uri: uri.to_string(),
            preferred_label: label.to_string(),
            ontology_abbreviation: "NCIT".to_string(),
            ontology_uri: "https://data.bioontology.org/ontologies/NCIT".to_string(),
            definition: def.map(str::to_string),
        }
    }

    fn mapped_store() -> SessionStore {
        let mut store = SessionStore::new();
        let rs = SearchResultSet::new(
            SearchContext::label("Tumor Site"),
            vec![term("http://ncit/C1", "Site", Some("where, \"exactly\""))],
        );
        let selected: BTreeSet<String> = ["http://ncit/C1".to_string()].into();
        store.reconcile_column_mapping("Tumor Site", &selected, &rs, DataType::Categorical);

        let vrs = SearchResultSet::new(
            SearchContext::value("sex", "F"),
            vec![term("http://ncit/F", "Female", None)],
        );
        let selected: BTreeSet<String> = ["http://ncit/F".to_string()].into();
        store.reconcile_value_mapping("sex", "F", &selected, &vrs, DataType::String);
        store
    }

    #[test]
    fn safe_names() {
        assert_eq!(safe_attribute_name("Tumor Site-Code"), "tumor_site_code");
    }

    #[test]
    fn column_csv_quotes_fields() {
        let csv = mapped_store().column_mappings_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Column Name,Preferred Label,Ontology Name,Ontology URI,Ontology Term URI,Data Type,Definition"
        );
        assert!(lines.next().unwrap().ends_with(",Categorical,\"where, \"\"exactly\"\"\""));
    }

    #[test]
    fn value_csv_leaves_missing_definition_empty() {
        let csv = mapped_store().value_mappings_csv().unwrap();
        assert_eq!(csv.lines().nth(1).unwrap(), "sex,F,Female,NCIT (NCIT),https://data.bioontology.org/ontologies/NCIT,http://ncit/F,String,");
    }

    #[test]
    fn schema_covers_column_and_value_only_labels() {
        let schema = mapped_store().linkml_schema().unwrap();
        let class = schema.record_class().unwrap();
        let names: Vec<&str> = class.attributes.keys().collect();
        assert_eq!(names, vec!["tumor_site", "sex"]);

        let site = class.attributes.get("tumor_site").unwrap();
        assert_eq!(site.range, "string");
        assert_eq!(site.exact_mappings, vec!["http://ncit/C1"]);

        let sex = class.attributes.get("sex").unwrap();
        assert_eq!(sex.comments, vec!["Value 'F' maps to: Female (http://ncit/F)"]);

        let yaml = schema.to_yaml().unwrap();
        assert!(yaml.contains("default_prefix: ontology_mapping"));
        let json: serde_json::Value = serde_json::from_str(&schema.to_json().unwrap()).unwrap();
        assert_eq!(json["classes"]["DataMapping"]["attributes"]["sex"]["range"], "string");
    }

    #[test]
    fn colliding_attribute_names_keep_the_later_mapping() {
        let mut store = SessionStore::new();
        for (label, uri) in [("biological_sex", "http://ncit/A"), ("biological sex", "http://ncit/B")] {
            let rs = SearchResultSet::new(SearchContext::label(label), vec![term(uri, "Sex", None)]);
            let selected: BTreeSet<String> = [uri.to_string()].into();
            store.reconcile_column_mapping(label, &selected, &rs, DataType::String);
        }
        assert_eq!(store.export_records().len(), 2);

        let schema = store.linkml_schema().unwrap();
        let class = schema.record_class().unwrap();
        assert_eq!(class.attributes.len(), 1);
        let attr = class.attributes.get("biological_sex").unwrap();
        assert_eq!(attr.exact_mappings, vec!["http://ncit/B"]);
    }

    #[test]
    fn ordered_map_insert_replaces_in_place() {
        let mut map = OrderedMap::default();
        assert_eq!(map.insert("a".to_string(), 1), None);
        assert_eq!(map.insert("b".to_string(), 2), None);
        assert_eq!(map.insert("a".to_string(), 3), Some(1));
        assert_eq!(map.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(map.get("a"), Some(&3));
    }

    #[test]
    fn nothing_to_export_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new();
        assert!(store.linkml_schema().is_none());
        let written = store.write_exports(dir.path()).unwrap();
        assert!(written.is_empty());
        let notices = store.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = mapped_store();
        let written = store.write_exports(dir.path()).unwrap();
        assert_eq!(written.len(), 5);
        let extended = std::fs::read_to_string(dir.path().join(EXTENDED_SCHEMA_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&extended).unwrap();
        assert_eq!(
            json["column_mappings"]["Tumor Site"]["data_type"],
            "Categorical"
        );
        assert_eq!(json["value_mappings"]["sex"]["F"][0]["definition"], "");
    }
}
