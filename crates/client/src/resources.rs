//! Typed backend operations
//!
//! One method per backend endpoint, built on the raw
//! [`transport`](crate::transport) layer. List endpoints report pagination
//! through response headers; [`Page`] carries the extracted values with the
//! backend's documented fallbacks.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::auth::Scope;
use crate::error::ClientError;
use crate::transport::{ApiClient, ApiResponse, Method, RequestOptions};

/// Enumeration families served by the backend
pub const ENUMERATION_NAMES: [&str; 6] = [
    "schlagworte",
    "stationstypen",
    "vorgangstypen",
    "parlamente",
    "vgidtypen",
    "dokumententypen",
];

/// Per-page fallback when neither the response nor the request names one
const DEFAULT_PER_PAGE: u64 = 32;

/// One page of a paginated listing
///
/// Pagination comes from the `x-total-count`, `x-total-pages`, `x-page`,
/// and `x-per-page` response headers. Missing headers fall back to the
/// page's own length, a single page, page one, and the requested (or
/// default) page size respectively. A `null` body is treated as an empty
/// listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub data: Vec<Value>,
    pub count: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub per_page: u64,
}

/// Payload of `GET /api/v1/auth/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Headline numbers for the dashboard view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub vorgaenge: u64,
    pub sitzungen: u64,
    pub enumerations: u64,
}

impl ApiClient {
    /// `GET /api/v1/auth/status`
    pub async fn auth_status(&self) -> Result<AuthStatus, ClientError> {
        let response = self.request("/api/v1/auth/status", RequestOptions::new()).await?;
        let data = response.data.unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(ClientError::Payload)
    }

    /// `GET /api/v1/vorgang` with pagination extraction
    pub async fn get_vorgaenge(&self, params: Vec<(String, String)>) -> Result<Page, ClientError> {
        self.get_page("/api/v1/vorgang", params).await
    }

    /// `GET /api/v1/vorgang/{id}`
    pub async fn get_vorgang_by_id(&self, id: &str) -> Result<Value, ClientError> {
        let endpoint = format!("/api/v1/vorgang/{}", urlencoding::encode(id));
        let response = self.request(&endpoint, RequestOptions::new()).await?;
        Ok(response.data.unwrap_or(Value::Null))
    }

    /// `PUT /api/v1/vorgang/{id}`
    pub async fn put_vorgang_by_id(
        &self,
        id: &str,
        vorgang: &Value,
    ) -> Result<Option<Value>, ClientError> {
        let endpoint = format!("/api/v1/vorgang/{}", urlencoding::encode(id));
        let options = RequestOptions::new().method(Method::PUT).body(vorgang.clone());
        let response = self.request(&endpoint, options).await?;
        Ok(response.data)
    }

    /// `GET /api/v1/dokument/{id}`
    pub async fn get_document_by_id(&self, id: &str) -> Result<Value, ClientError> {
        let endpoint = format!("/api/v1/dokument/{}", urlencoding::encode(id));
        let response = self.request(&endpoint, RequestOptions::new()).await?;
        Ok(response.data.unwrap_or(Value::Null))
    }

    /// `GET /api/v1/sitzung` with pagination extraction
    pub async fn get_sitzungen(&self, params: Vec<(String, String)>) -> Result<Page, ClientError> {
        self.get_page("/api/v1/sitzung", params).await
    }

    /// `GET /api/v1/enumeration/{name}`
    pub async fn get_enumerations(
        &self,
        name: &str,
        params: Vec<(String, String)>,
    ) -> Result<Value, ClientError> {
        let endpoint = format!("/api/v1/enumeration/{name}");
        let response = self.request(&endpoint, RequestOptions::new().params(params)).await?;
        Ok(response.data.unwrap_or(Value::Null))
    }

    /// `PUT /api/v1/enumeration/{name}` replace-set update
    ///
    /// `values` are the objects to store; entries named in `replacing` are
    /// superseded by the update.
    pub async fn update_enumeration(
        &self,
        name: &str,
        values: &[Value],
        replacing: &[Value],
    ) -> Result<Option<Value>, ClientError> {
        let endpoint = format!("/api/v1/enumeration/{name}");
        let options = RequestOptions::new()
            .method(Method::PUT)
            .body(json!({ "objects": values, "replacing": replacing }));
        let response = self.request(&endpoint, options).await?;
        Ok(response.data)
    }

    /// `DELETE /api/v1/enumeration/{name}/{value}`
    ///
    /// The value becomes a path segment and is percent-encoded.
    pub async fn delete_enumeration_value(
        &self,
        name: &str,
        value: &str,
    ) -> Result<Option<Value>, ClientError> {
        let endpoint = format!("/api/v1/enumeration/{name}/{}", urlencoding::encode(value));
        let response = self.request(&endpoint, RequestOptions::new().method(Method::DELETE)).await?;
        Ok(response.data)
    }

    /// `GET /api/v1/autoren`
    pub async fn get_autoren(&self, params: Vec<(String, String)>) -> Result<Value, ClientError> {
        let response = self
            .request("/api/v1/autoren", RequestOptions::new().params(params))
            .await?;
        Ok(response.data.unwrap_or(Value::Null))
    }

    /// `PUT /api/v1/autoren` replace-set update
    pub async fn update_autoren(
        &self,
        values: &[Value],
        replacing: &[Value],
    ) -> Result<Option<Value>, ClientError> {
        let options = RequestOptions::new()
            .method(Method::PUT)
            .body(json!({ "objects": values, "replacing": replacing }));
        let response = self.request("/api/v1/autoren", options).await?;
        Ok(response.data)
    }

    /// `DELETE /api/v1/autoren` filtered by query parameters
    pub async fn delete_autoren_by_params(
        &self,
        params: Vec<(String, String)>,
    ) -> Result<Option<Value>, ClientError> {
        let options = RequestOptions::new().method(Method::DELETE).params(params);
        let response = self.request("/api/v1/autoren", options).await?;
        Ok(response.data)
    }

    /// `GET /api/v1/gremien`
    pub async fn get_gremien(&self, params: Vec<(String, String)>) -> Result<Value, ClientError> {
        let response = self
            .request("/api/v1/gremien", RequestOptions::new().params(params))
            .await?;
        Ok(response.data.unwrap_or(Value::Null))
    }

    /// `PUT /api/v1/gremien` replace-set update
    pub async fn update_gremien(
        &self,
        values: &[Value],
        replacing: &[Value],
    ) -> Result<Option<Value>, ClientError> {
        let options = RequestOptions::new()
            .method(Method::PUT)
            .body(json!({ "objects": values, "replacing": replacing }));
        let response = self.request("/api/v1/gremien", options).await?;
        Ok(response.data)
    }

    /// `DELETE /api/v1/gremien` filtered by query parameters
    pub async fn delete_gremien_by_params(
        &self,
        params: Vec<(String, String)>,
    ) -> Result<Option<Value>, ClientError> {
        let options = RequestOptions::new().method(Method::DELETE).params(params);
        let response = self.request("/api/v1/gremien", options).await?;
        Ok(response.data)
    }

    /// `POST /api/v1/auth`, minting a new API key
    pub async fn create_api_key(
        &self,
        scope: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Value>, ClientError> {
        let mut body = json!({ "scope": scope });
        if let Some(expiry) = expires_at {
            body["expires_at"] = json!(expiry.to_rfc3339());
        }
        let options = RequestOptions::new().method(Method::POST).body(body);
        let response = self.request("/api/v1/auth", options).await?;
        Ok(response.data)
    }

    /// `DELETE /api/v1/auth`, revoking the key named in the
    /// `api-key-delete` header
    pub async fn delete_api_key(&self, key: &str) -> Result<Option<Value>, ClientError> {
        let options = RequestOptions::new()
            .method(Method::DELETE)
            .header("api-key-delete", key);
        let response = self.request("/api/v1/auth", options).await?;
        Ok(response.data)
    }

    /// Fetch the dashboard's headline numbers
    ///
    /// The two list endpoints are queried concurrently with a small page
    /// size; only their total counts are used. The enumeration count is the
    /// number of known enumeration families.
    pub async fn load_dashboard_stats(&self) -> Result<DashboardStats, ClientError> {
        let small = vec![("per_page".to_string(), "5".to_string())];
        let (vorgaenge, sitzungen) =
            futures::try_join!(self.get_vorgaenge(small.clone()), self.get_sitzungen(small))?;
        Ok(DashboardStats {
            vorgaenge: vorgaenge.count,
            sitzungen: sitzungen.count,
            enumerations: ENUMERATION_NAMES.len() as u64,
        })
    }

    /// Fetch every enumeration family concurrently
    ///
    /// A family that fails to load is reported as an empty list so one bad
    /// endpoint does not blank the whole settings view.
    pub async fn load_enumerations(&self) -> HashMap<String, Value> {
        let fetches = ENUMERATION_NAMES.map(|name| async move {
            match self.get_enumerations(name, Vec::new()).await {
                Ok(Value::Null) => (name.to_string(), Value::Array(Vec::new())),
                Ok(data) => (name.to_string(), data),
                Err(err) => {
                    warn!(enumeration = name, error = %err, "failed to load enumeration");
                    (name.to_string(), Value::Array(Vec::new()))
                }
            }
        });
        join_all(fetches).await.into_iter().collect()
    }

    async fn get_page(
        &self,
        endpoint: &str,
        params: Vec<(String, String)>,
    ) -> Result<Page, ClientError> {
        let requested_per_page = params
            .iter()
            .find(|(key, _)| key == "per_page")
            .and_then(|(_, value)| value.parse().ok());
        let response = self.request(endpoint, RequestOptions::new().params(params)).await?;
        Ok(page_from_response(response, requested_per_page))
    }
}

/// Assemble a [`Page`] from a listing response
fn page_from_response(response: ApiResponse, requested_per_page: Option<u64>) -> Page {
    let data = match response.data {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    let header = |name: &str| -> Option<u64> {
        response.headers.get(name).and_then(|value| value.parse().ok())
    };
    Page {
        count: header("x-total-count").unwrap_or(data.len() as u64),
        total_pages: header("x-total-pages").unwrap_or(1),
        current_page: header("x-page").unwrap_or(1),
        per_page: header("x-per-page")
            .or(requested_per_page)
            .unwrap_or(DEFAULT_PER_PAGE),
        data,
    }
}
