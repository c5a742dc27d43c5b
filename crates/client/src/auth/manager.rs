//! Credential lifecycle management

use std::sync::atomic::{AtomicU32, Ordering};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::ApiClient;

use super::store::CredentialStore;
use super::types::{CredentialRecord, Scope};

/// Storage key under which the credential record is persisted
pub const CREDENTIAL_STORAGE_KEY: &str = "ltzf_auth";

/// Re-validation attempts allowed before stored credentials are destroyed
pub const MAX_VALIDATION_ATTEMPTS: u32 = 3;

/// Authentication failures, with user-facing messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid API key")]
    InvalidKey,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Insufficient permissions. Required: admin or keyadder, got: {scope}")]
    InsufficientScope { scope: String },

    #[error("Authentication failed: {0}")]
    Failed(String),

    #[error("No valid credentials found")]
    NoCredentials,
}

/// Outcome of a failed stored-credential re-validation
///
/// Only [`Transient`](Self::Transient) leaves the stored record in place;
/// every other case has already destroyed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RevalidationError {
    #[error("No stored credentials")]
    NoCredentials,

    #[error("Too many validation attempts, please login again")]
    TooManyAttempts,

    #[error("Stored credentials are invalid")]
    Invalid,

    #[error("Validation failed, will retry")]
    Transient,
}

impl RevalidationError {
    /// Whether the caller may retry without re-entering credentials
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Persisted form of a credential record; the key is base64-obscured
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredentials {
    backend_url: String,
    api_key: String,
    scope: Scope,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Owner of the credential lifecycle
///
/// Validation talks to the backend; persistence goes through the injected
/// [`CredentialStore`]. Stored-credential re-validation keeps a failure
/// counter so a flaky backend gets a bounded number of retries before the
/// record is destroyed and the user has to log in again.
pub struct CredentialManager<S> {
    store: S,
    storage_key: String,
    page_secure: bool,
    validation_failures: AtomicU32,
}

impl<S: CredentialStore> CredentialManager<S> {
    pub fn new(store: S, page_secure: bool) -> Self {
        Self {
            store,
            storage_key: CREDENTIAL_STORAGE_KEY.to_string(),
            page_secure,
            validation_failures: AtomicU32::new(0),
        }
    }

    /// Override the storage key (used when several panels share one store)
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Validate a key against a backend
    ///
    /// Runs the connectivity probe first so an unreachable backend is
    /// reported as such, then checks the key's scope. Only `admin` and
    /// `keyadder` pass.
    pub async fn validate_credentials(
        &self,
        backend_url: &str,
        api_key: &str,
    ) -> Result<Scope, AuthError> {
        let client = self.client_for(backend_url, api_key);
        client.ping().await.map_err(map_auth_error)?;
        let status = client.auth_status().await.map_err(map_auth_error)?;
        match status.scope {
            Some(scope) if scope.is_authorized() => {
                debug!(scope = %scope, "credentials validated");
                Ok(scope)
            }
            other => Err(AuthError::InsufficientScope {
                scope: other.map_or_else(|| "none".to_string(), |s| s.to_string()),
            }),
        }
    }

    /// Persist a validated credential set, returning whether storage
    /// succeeded
    ///
    /// The key is obscured before it touches the store. Obscuring is an
    /// encoding, not encryption; the store itself is the trust boundary.
    pub fn store_credentials(
        &self,
        backend_url: &str,
        api_key: &str,
        scope: Scope,
        expires_at: DateTime<Utc>,
    ) -> bool {
        let stored = StoredCredentials {
            backend_url: backend_url.to_string(),
            api_key: encode_api_key(api_key),
            scope,
            created_at: Utc::now(),
            expires_at,
        };
        let serialized = match serde_json::to_string(&stored) {
            Ok(s) => s,
            Err(err) => {
                error!(error = %err, "failed to serialize credentials");
                return false;
            }
        };
        match self.store.set(&self.storage_key, &serialized) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "failed to store credentials");
                false
            }
        }
    }

    /// Load the stored credential record
    ///
    /// Expired or undecodable records are purged on sight, so a `Some`
    /// return is always usable.
    pub fn get_credentials(&self) -> Option<CredentialRecord> {
        let raw = match self.store.get(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "credential storage unavailable");
                return None;
            }
        };
        let stored: StoredCredentials = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "corrupt credential record, purging");
                self.clear_credentials();
                return None;
            }
        };
        let Some(api_key) = decode_api_key(&stored.api_key) else {
            warn!("undecodable api key in stored credentials, purging");
            self.clear_credentials();
            return None;
        };
        let record = CredentialRecord {
            backend_url: stored.backend_url,
            api_key,
            scope: stored.scope,
            created_at: stored.created_at,
            expires_at: stored.expires_at,
        };
        if record.is_expired() {
            debug!("stored credentials expired, purging");
            self.clear_credentials();
            return None;
        }
        Some(record)
    }

    pub fn has_valid_credentials(&self) -> bool {
        self.get_credentials().is_some()
    }

    /// Remove the stored record; safe to call when nothing is stored
    pub fn clear_credentials(&self) {
        if let Err(err) = self.store.remove(&self.storage_key) {
            warn!(error = %err, "failed to clear credentials");
        }
    }

    /// Build a client from the stored credentials
    pub fn api_client(&self) -> Result<ApiClient, AuthError> {
        let record = self.get_credentials().ok_or(AuthError::NoCredentials)?;
        Ok(self.client_for(&record.backend_url, &record.api_key))
    }

    /// Re-validate the stored credentials against their backend
    ///
    /// Network failures are reported as transient until
    /// [`MAX_VALIDATION_ATTEMPTS`] is reached, at which point the record is
    /// destroyed. A successful validation resets the counter.
    pub async fn validate_stored_credentials(
        &self,
    ) -> Result<CredentialRecord, RevalidationError> {
        let Some(record) = self.get_credentials() else {
            return Err(RevalidationError::NoCredentials);
        };

        if self.validation_failures.load(Ordering::SeqCst) >= MAX_VALIDATION_ATTEMPTS {
            self.validation_failures.store(0, Ordering::SeqCst);
            self.clear_credentials();
            return Err(RevalidationError::TooManyAttempts);
        }

        let attempt = self.validation_failures.fetch_add(1, Ordering::SeqCst) + 1;
        let client = self.client_for(&record.backend_url, &record.api_key);
        match client.auth_status().await {
            Ok(_) => {
                self.validation_failures.store(0, Ordering::SeqCst);
                Ok(record)
            }
            Err(err) => {
                warn!(error = %err, attempt, "stored credential validation failed");
                if attempt >= MAX_VALIDATION_ATTEMPTS {
                    self.clear_credentials();
                    Err(RevalidationError::Invalid)
                } else {
                    Err(RevalidationError::Transient)
                }
            }
        }
    }

    fn client_for(&self, backend_url: &str, api_key: &str) -> ApiClient {
        ApiClient::new(ClientConfig::new(backend_url, api_key, self.page_secure))
    }
}

fn map_auth_error(err: ClientError) -> AuthError {
    match err.status() {
        Some(403) => AuthError::InvalidKey,
        Some(401) => AuthError::Unauthorized,
        _ => AuthError::Failed(err.to_string()),
    }
}

fn encode_api_key(key: &str) -> String {
    BASE64.encode(key)
}

fn decode_api_key(encoded: &str) -> Option<String> {
    let bytes = BASE64.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}
