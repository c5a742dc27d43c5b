//! Commands from the view layer and the events sent back
//!
//! Each command produces exactly one event. Payloads are plain data; in
//! particular no event ever carries an API key, only the
//! [`CredentialSummary`] view of a credential record.

use ltzf_client::CredentialSummary;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Instruction from the view layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Validate a key against a backend and, on success, persist it
    Authenticate {
        backend_url: String,
        api_key: String,
        /// Extends credential lifetime from one day to seven
        #[serde(default)]
        remember_key: bool,
    },
    /// Re-validate stored credentials and rebind the client
    RestoreSession,
    /// Run one backend operation
    ApiRequest {
        method: String,
        #[serde(default)]
        params: Value,
        #[serde(alias = "id")]
        request_id: String,
    },
    /// Destroy credentials, cache, and the bound client
    Logout,
}

/// Reply to the view layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    AuthSuccess { credentials: CredentialSummary },
    AuthFailure { error: String },
    SessionRestored { credentials: CredentialSummary },
    SessionExpired { error: String },
    ApiResponse {
        request_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    LogoutComplete,
}

impl Event {
    pub fn api_success(request_id: impl Into<String>, result: Value) -> Self {
        Self::ApiResponse {
            request_id: request_id.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn api_failure(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::ApiResponse {
            request_id: request_id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}
