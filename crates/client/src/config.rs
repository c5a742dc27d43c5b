//! Client configuration and backend URL normalization

use std::time::Duration;

use tracing::{error, warn};
use url::Url;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for an [`ApiClient`](crate::transport::ApiClient)
///
/// `page_secure` records whether the embedding page is served over HTTPS.
/// When it is, an `http:` backend URL is rewritten to `https:` at
/// construction, since the user agent would block the plain-HTTP request
/// anyway. The pre-rewrite scheme is remembered so that connection failures
/// can still be reported as mixed-content problems rather than generic
/// network errors.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Normalized backend base URL, no trailing slash
    pub base_url: String,
    /// API key sent as `X-API-Key` on every authenticated request
    pub api_key: String,
    /// Whether the embedding page is served over HTTPS
    pub page_secure: bool,
    /// Request timeout
    pub timeout: Duration,
    insecure_backend: bool,
}

impl ClientConfig {
    /// Build a configuration, normalizing the backend URL
    pub fn new(backend_url: &str, api_key: impl Into<String>, page_secure: bool) -> Self {
        let (base_url, insecure_backend) = normalize_backend_url(backend_url, page_secure);
        Self {
            base_url,
            api_key: api_key.into(),
            page_secure,
            timeout: DEFAULT_TIMEOUT,
            insecure_backend,
        }
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the backend URL used `http:` before normalization
    pub(crate) fn insecure_backend(&self) -> bool {
        self.insecure_backend
    }
}

/// Normalize a backend URL and record whether it was plain HTTP
///
/// A secure page plus an `http:` backend gets the scheme rewritten to
/// `https:`. URLs that do not parse are passed through unchanged so the
/// resulting request failure names the real problem.
fn normalize_backend_url(raw: &str, page_secure: bool) -> (String, bool) {
    let trimmed = raw.trim().trim_end_matches('/');
    match Url::parse(trimmed) {
        Ok(mut parsed) => {
            let insecure = parsed.scheme() == "http";
            if page_secure && insecure && parsed.set_scheme("https").is_ok() {
                warn!(
                    backend_url = %trimmed,
                    "mixed content detected: rewriting backend URL from http to https"
                );
                let rewritten = parsed.to_string();
                return (rewritten.trim_end_matches('/').to_string(), true);
            }
            (trimmed.to_string(), insecure)
        }
        Err(err) => {
            error!(backend_url = %trimmed, error = %err, "invalid backend URL, using it unchanged");
            (trimmed.to_string(), trimmed.starts_with("http:"))
        }
    }
}
