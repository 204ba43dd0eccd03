//! Blocking HTTP client for the BioPortal REST API.

use maptology_core::lookup::{RawOntology, SearchPage};
use maptology_core::{
    shape_catalog, shape_results, LookupError, LookupQuery, OntologyInfo, OntologyTerm,
    SearchMode, TermLookup,
};
use serde::de::DeserializeOwned;
use url::Url;

use crate::cache::OntologyNameCache;
use crate::config::{BioPortalConfig, ConfigError};

/// Page size requested by "search all".
const SEARCH_ALL_PAGE_SIZE: &str = "100";

#[derive(Debug, Clone)]
pub struct BioPortalClient {
    http: reqwest::blocking::Client,
    config: BioPortalConfig,
    names: OntologyNameCache,
}

impl BioPortalClient {
    /// Client backed by the process-wide name cache.
    pub fn new(config: BioPortalConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
            names: OntologyNameCache::global(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(BioPortalConfig::from_env()?)
    }

    /// Use `names` instead of the process-wide cache.
    pub fn with_name_cache(mut self, names: OntologyNameCache) -> Self {
        self.names = names;
        self
    }

    pub fn config(&self) -> &BioPortalConfig {
        &self.config
    }

    pub fn name_cache(&self) -> &OntologyNameCache {
        &self.names
    }

    fn api_key(&self) -> Result<&str, LookupError> {
        self.config
            .api_key
            .as_deref()
            .ok_or(LookupError::MissingCredential)
    }

    fn endpoint(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<Url, LookupError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| LookupError::Transport(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| LookupError::Transport("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, LookupError> {
        let resp = self
            .http
            .get(url)
            .send()
            .map_err(|e| LookupError::Transport(e.without_url().to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
            });
        }
        resp.json::<T>()
            .map_err(|e| LookupError::Decode(e.without_url().to_string()))
    }

    /// One raw page of search hits.
    pub fn search_page(&self, query: &LookupQuery) -> Result<SearchPage, LookupError> {
        let api_key = self.api_key()?;
        let ontologies = query.ontologies.join(",");
        let mut params = vec![
            ("q", query.text.as_str()),
            ("apikey", api_key),
            ("ontologies", ontologies.as_str()),
        ];
        if query.mode == SearchMode::All {
            params.push(("pagesize", SEARCH_ALL_PAGE_SIZE));
        }
        let url = self.endpoint(&["search"], &params)?;
        tracing::info!(query = %query.text, ontologies = %ontologies, mode = ?query.mode, "searching BioPortal");
        self.get_json(url)
    }

    fn fetch_ontology_name(&self, acronym: &str) -> Result<String, LookupError> {
        let api_key = self.api_key()?;
        let url = self.endpoint(&["ontologies", acronym], &[("apikey", api_key)])?;
        let details: RawOntology = self.get_json(url)?;
        Ok(details
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| acronym.to_string()))
    }
}

impl TermLookup for BioPortalClient {
    fn search(&self, query: &LookupQuery) -> Result<Vec<OntologyTerm>, LookupError> {
        let page = self.search_page(query)?;
        let raw = page.collection.len();
        let terms = shape_results(page.collection, &query.ontologies, query.mode);
        tracing::debug!(query = %query.text, raw, count = terms.len(), total = page.total_count, "search shaped");
        Ok(terms)
    }

    fn catalog(&self) -> Result<Vec<OntologyInfo>, LookupError> {
        let api_key = self.api_key()?;
        let url = self.endpoint(&["ontologies"], &[("apikey", api_key)])?;
        let raw: Vec<RawOntology> = self.get_json(url)?;
        let catalog = shape_catalog(raw);
        tracing::info!(count = catalog.len(), "ontology catalog fetched");
        Ok(catalog)
    }

    fn ontology_name(&self, acronym: &str) -> String {
        self.names.get_or_fetch(acronym, || {
            self.fetch_ontology_name(acronym).unwrap_or_else(|err| {
                tracing::warn!(acronym = %acronym, error = %err, "ontology details unavailable");
                acronym.to_string()
            })
        })
    }
}
