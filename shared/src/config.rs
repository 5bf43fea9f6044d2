use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::{is_header_name, UrlError, ValidatedUrl};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/";
pub const DEFAULT_CSRF_COOKIE: &str = "csrftoken";
pub const DEFAULT_CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] UrlError),

    #[error("csrf_header is not a valid header name: {0:?}")]
    InvalidHeaderName(String),

    #[error("base URL must not carry a query or fragment: {0}")]
    BaseUrlNotPlain(String),

    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Shell-provided settings. Missing fields in JSON fall back to [`Config::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin (and root path) of the table service; form actions must stay on it.
    pub base_url: String,
    pub csrf_cookie_name: String,
    pub csrf_header: String,

    pub save_label: String,
    pub busy_label: String,

    pub load_failed_message: String,
    pub row_locked_message: String,
    pub save_failed_prefix: String,
    pub unknown_error_message: String,
    pub connection_error_message: String,
    pub invalid_action_message: String,
    pub form_too_large_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            csrf_cookie_name: DEFAULT_CSRF_COOKIE.into(),
            csrf_header: DEFAULT_CSRF_HEADER.into(),
            save_label: "Save".into(),
            busy_label: "Saving...".into(),
            load_failed_message: "Failed to load the form".into(),
            row_locked_message: "This row is being edited by another user".into(),
            save_failed_prefix: "Save failed".into(),
            unknown_error_message: "Unknown error".into(),
            connection_error_message: "Connection error".into(),
            invalid_action_message: "The form cannot be submitted to this address".into(),
            form_too_large_message: "The form is too large to submit".into(),
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base()?;
        if base.has_query_or_fragment() {
            return Err(ConfigError::BaseUrlNotPlain(base.as_str().to_string()));
        }

        let required = [
            ("csrf_cookie_name", &self.csrf_cookie_name),
            ("csrf_header", &self.csrf_header),
            ("save_label", &self.save_label),
            ("busy_label", &self.busy_label),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty { field });
            }
        }
        if !is_header_name(&self.csrf_header) {
            return Err(ConfigError::InvalidHeaderName(self.csrf_header.clone()));
        }

        Ok(())
    }

    pub fn base(&self) -> Result<ValidatedUrl, ConfigError> {
        Ok(ValidatedUrl::new(self.base_url.as_str())?)
    }

    /// Resolves a path or form action against the base URL, refusing other origins.
    pub fn resolve(&self, reference: &str) -> Result<ValidatedUrl, UrlError> {
        let base = ValidatedUrl::new(self.base_url.as_str())?;
        base.resolve_same_origin(reference)
    }
}
