//! Client configuration from the environment.
//!
//! Precedence for every setting: explicit override, then environment
//! variable, then default.

use std::env::VarError;
use std::time::Duration;
use url::Url;

pub const BIOPORTAL_API_KEY_ENV: &str = "BIOPORTAL_API_KEY";
pub const BIOPORTAL_BASE_URL_ENV: &str = "BIOPORTAL_BASE_URL";
pub const BIOPORTAL_TIMEOUT_SECS_ENV: &str = "BIOPORTAL_TIMEOUT_SECS";

pub const DEFAULT_BASE_URL: &str = "https://data.bioontology.org";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name}={value:?} (expected integer seconds; 0 disables)")]
    InvalidTimeout { name: &'static str, value: String },

    #[error("invalid BioPortal base URL {value:?}: {reason}")]
    InvalidBaseUrl { value: String, reason: String },

    #[error("failed to read {name}: {source}")]
    Env {
        name: &'static str,
        #[source]
        source: VarError,
    },

    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BioPortalConfig {
    /// `None` when unset or blank; lookups then fail with
    /// `LookupError::MissingCredential`.
    pub api_key: Option<String>,
    /// Validated http(s) URL without a trailing slash.
    pub base_url: String,
    /// `None` disables the timeout.
    pub timeout: Option<Duration>,
}

impl Default for BioPortalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

impl BioPortalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name))
    }

    /// Build from an arbitrary variable source (the process environment in
    /// [`Self::from_env`]).
    pub fn from_vars<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<String, VarError>,
    {
        let read = |name: &'static str| -> Result<Option<String>, ConfigError> {
            match get(name) {
                Ok(v) if v.trim().is_empty() => Ok(None),
                Ok(v) => Ok(Some(v.trim().to_string())),
                Err(VarError::NotPresent) => Ok(None),
                Err(source) => Err(ConfigError::Env { name, source }),
            }
        };

        let mut config = Self::default().with_api_key(read(BIOPORTAL_API_KEY_ENV)?);
        if let Some(base) = read(BIOPORTAL_BASE_URL_ENV)? {
            config = config.with_base_url(&base)?;
        }
        if let Some(secs) = read(BIOPORTAL_TIMEOUT_SECS_ENV)? {
            let secs = secs.parse::<u64>().map_err(|_| ConfigError::InvalidTimeout {
                name: BIOPORTAL_TIMEOUT_SECS_ENV,
                value: secs.clone(),
            })?;
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Blank keys count as absent.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBaseUrl {
            value: base_url.to_string(),
            reason,
        };
        let url = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("expected an http(s) URL".to_string()));
        }
        self.base_url = url.as_str().trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}
