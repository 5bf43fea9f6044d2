//! HTTP goes through `crux_http`. What stays here is the checking the
//! dialogs do before a request is built: every URL must land on the
//! configured origin, and header text taken from the page must be safe to put
//! on the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub use crux_http::Http;

/// What a request callback receives: any reply the shell managed to get, or
/// the reason it could not.
pub type HttpResult = crux_http::Result<crux_http::Response<Vec<u8>>>;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_HEADER_VALUE_LENGTH: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum UrlError {
    #[error("'{url}' is not a usable address: {reason}")]
    Invalid { url: String, reason: String },

    #[error("{url} is outside of {expected}")]
    ForeignOrigin { url: String, expected: String },
}

/// Absolute http(s) URL with a host and no userinfo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedUrl {
    url: String,
    origin: String,
    path: String,
}

impl ValidatedUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, UrlError> {
        let url = url.into();
        let invalid = |reason: String| UrlError::Invalid {
            url: shorten(&url),
            reason,
        };

        if url.trim().is_empty() {
            return Err(invalid("empty".into()));
        }
        if url.len() > MAX_URL_LENGTH {
            return Err(invalid(format!("longer than {MAX_URL_LENGTH} bytes")));
        }

        let parsed = Url::parse(&url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("scheme {} is not http(s)", parsed.scheme())));
        }
        if parsed.host_str().is_none() {
            return Err(invalid("no host".into()));
        }
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(invalid("carries credentials".into()));
        }

        Ok(Self {
            url: parsed.to_string(),
            origin: parsed.origin().ascii_serialization(),
            path: parsed.path().to_string(),
        })
    }

    /// Joins `reference` onto this URL the way a browser resolves a link,
    /// and rejects the result unless it shares this URL's origin.
    pub fn resolve_same_origin(&self, reference: &str) -> Result<Self, UrlError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(UrlError::Invalid {
                url: String::new(),
                reason: "empty reference".into(),
            });
        }

        let joined = Url::parse(&self.url)
            .and_then(|base| base.join(reference))
            .map_err(|e| UrlError::Invalid {
                url: shorten(reference),
                reason: e.to_string(),
            })?;

        let resolved = Self::new(joined.as_str())?;
        if resolved.origin != self.origin {
            return Err(UrlError::ForeignOrigin {
                url: shorten(resolved.as_str()),
                expected: self.origin.clone(),
            });
        }
        Ok(resolved)
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn has_query_or_fragment(&self) -> bool {
        self.url.contains('?') || self.url.contains('#')
    }
}

fn shorten(url: &str) -> String {
    match url.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &url[..idx]),
        None => url.to_string(),
    }
}

/// RFC 7230 token, the only shape `crux_http` accepts as a header name.
pub fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Printable ASCII with inner spaces or tabs, bounded in length. Anything
/// else could split the header or make the HTTP layer refuse the request.
pub fn is_header_value(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_HEADER_VALUE_LENGTH
        && value
            .bytes()
            .all(|b| b == b'\t' || (b' '..=b'~').contains(&b))
}
