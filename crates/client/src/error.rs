//! Error types for the backend client

use thiserror::Error;

/// Errors surfaced by the transport and resource layers
///
/// Network-level failures are split into two cases: a plain connectivity
/// problem, and the mixed-content case where a page served over HTTPS is
/// configured against a plain-HTTP backend and the user agent (or proxy)
/// refuses the connection. The latter gets an actionable message because the
/// fix is a configuration change, not a retry.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request failed before an HTTP response arrived
    #[error("Network error - check CORS or server availability")]
    Network(#[source] reqwest::Error),

    /// Connection refused against an HTTP backend from a secure page
    #[error("Mixed content error: HTTPS page trying to access HTTP API. Please use HTTPS for the backend URL or configure your reverse proxy to handle API requests.")]
    MixedContent {
        backend_url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status
    #[error("HTTP {status}")]
    HttpStatus { status: u16 },

    /// The response body could not be decoded as JSON
    #[error("Failed to decode response body")]
    Parse(#[source] reqwest::Error),

    /// The response decoded as JSON but not into the expected shape
    #[error("Unexpected response payload")]
    Payload(#[source] serde_json::Error),
}

impl ClientError {
    /// The HTTP status code, when the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status } => Some(*status),
            _ => None,
        }
    }

    /// True for failures where no HTTP response was received
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::MixedContent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_message_carries_the_code() {
        let err = ClientError::HttpStatus { status: 404 };
        assert_eq!(err.to_string(), "HTTP 404");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn status_is_none_for_network_failures() {
        let err = ClientError::HttpStatus { status: 500 };
        assert!(!err.is_network());
        assert_eq!(ClientError::HttpStatus { status: 401 }.status(), Some(401));
    }
}
