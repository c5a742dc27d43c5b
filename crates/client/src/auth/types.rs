//! Credential data types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Permission scope attached to an API key
///
/// Only `admin` and `keyadder` may use the admin panel; every other scope
/// string is carried verbatim so error messages can name it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
    Admin,
    Keyadder,
    Other(String),
}

impl Scope {
    /// Whether this scope grants access to the admin panel
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Admin | Self::Keyadder)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Keyadder => "keyadder",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Scope {
    fn from(s: String) -> Self {
        match s.as_str() {
            "admin" => Self::Admin,
            "keyadder" => Self::Keyadder,
            _ => Self::Other(s),
        }
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.as_str().to_string()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated credential set
///
/// `api_key` is the cleartext key; the obscured form only exists inside the
/// storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub backend_url: String,
    pub api_key: String,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Expiry is inclusive: a record whose expiry equals the current time
    /// is already expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Key-free view of a credential record, safe to hand to the view layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub backend_url: String,
    pub scope: Scope,
    pub expires_at: DateTime<Utc>,
}

impl From<&CredentialRecord> for CredentialSummary {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            backend_url: record.backend_url.clone(),
            scope: record.scope.clone(),
            expires_at: record.expires_at,
        }
    }
}
