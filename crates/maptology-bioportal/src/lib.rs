//! BioPortal REST client implementing [`maptology_core::TermLookup`].
//!
//! ```text
//! SessionStore ──► TermLookup ──► BioPortalClient ──► GET /search
//!                                       │              GET /ontologies
//!                                       └──► OntologyNameCache (process-wide)
//! ```

pub mod cache;
pub mod client;
pub mod config;

pub use cache::OntologyNameCache;
pub use client::BioPortalClient;
pub use config::{
    BioPortalConfig, ConfigError, BIOPORTAL_API_KEY_ENV, BIOPORTAL_BASE_URL_ENV,
    BIOPORTAL_TIMEOUT_SECS_ENV, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS,
};
