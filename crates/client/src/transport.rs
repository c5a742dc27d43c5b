//! Raw request path against the LTZF backend
//!
//! Everything here is untyped: endpoints are paths, bodies are JSON values,
//! and responses come back as `(data, headers)` pairs. The typed surface
//! lives in [`resources`](crate::resources).

use std::collections::HashMap;

use reqwest::header::HeaderMap;
pub use reqwest::Method;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Options for a single request
///
/// Defaults to a GET with no query, no extra headers, and no body.
#[derive(Debug, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A decoded backend response
///
/// `data` is `None` for 201 Created and 204 No Content, which the backend
/// sends without a body. Header names are lowercase.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub data: Option<Value>,
    pub headers: HashMap<String, String>,
}

/// HTTP client bound to one backend and one API key
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    /// Create a client from a configuration
    ///
    /// Construction never fails: if the customized reqwest builder is
    /// rejected, the default client is used instead.
    pub fn new(config: ClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Issue an authenticated request against `endpoint`
    ///
    /// The API key and JSON content type are always attached; options may
    /// add query parameters, extra headers, and a JSON body. Non-success
    /// statuses become [`ClientError::HttpStatus`].
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ClientError> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let method = options.method.unwrap_or(Method::GET);
        debug!(method = %method, endpoint = %endpoint, "backend request");

        let mut builder = self
            .http
            .request(method, &url)
            .header("X-API-Key", &self.config.api_key)
            .header("Content-Type", "application/json");
        // Empty values are omitted rather than sent as bare keys
        let params: Vec<&(String, String)> =
            options.params.iter().filter(|(_, value)| !value.is_empty()).collect();
        if !params.is_empty() {
            builder = builder.query(&params);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| self.classify(err))?;
        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = %endpoint, status = status.as_u16(), "backend returned error status");
            return Err(ClientError::HttpStatus { status: status.as_u16() });
        }

        let headers = extract_headers(response.headers());
        if status == StatusCode::NO_CONTENT || status == StatusCode::CREATED {
            return Ok(ApiResponse { data: None, headers });
        }

        let data = response.json::<Value>().await.map_err(ClientError::Parse)?;
        Ok(ApiResponse { data: Some(data), headers })
    }

    /// Probe backend reachability via `GET /ping`
    ///
    /// Sent without the API key; any success status counts as reachable and
    /// the body is ignored.
    pub async fn ping(&self) -> Result<(), ClientError> {
        let url = format!("{}/ping", self.config.base_url);
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json, text/plain, */*")
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::HttpStatus { status: status.as_u16() })
        }
    }

    /// Classify a transport-level failure
    ///
    /// A secure page talking to a backend that was configured as plain HTTP
    /// gets the mixed-content diagnosis; everything else is a generic
    /// network failure.
    fn classify(&self, err: reqwest::Error) -> ClientError {
        if self.config.page_secure && self.config.insecure_backend() {
            return ClientError::MixedContent {
                backend_url: self.config.base_url.clone(),
                source: err,
            };
        }
        ClientError::Network(err)
    }
}

fn extract_headers(headers: &HeaderMap) -> HashMap<String, String> {
    // HeaderName is guaranteed lowercase; non-UTF-8 values are skipped
    headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
