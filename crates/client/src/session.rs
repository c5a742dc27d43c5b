//! Long-lived session pointer persistence
//!
//! Separate from credentials: the pointer only records that a session
//! exists, which backend it belongs to, and when it lapses. It goes through
//! the same [`CredentialStore`] seam and follows the same purge-on-read
//! discipline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::auth::CredentialStore;

/// Storage key under which the session pointer is persisted
pub const SESSION_STORAGE_KEY: &str = "ltzf_session";

/// Reference to a server-side session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPointer {
    pub session_id: String,
    pub backend_url: String,
    pub expires_at: DateTime<Utc>,
    pub stored_at: DateTime<Utc>,
}

impl SessionPointer {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Persistence for the session pointer
pub struct SessionPointerStore<S> {
    store: S,
    storage_key: String,
}

impl<S: CredentialStore> SessionPointerStore<S> {
    pub fn new(store: S) -> Self {
        Self { store, storage_key: SESSION_STORAGE_KEY.to_string() }
    }

    /// Persist the pointer, returning whether storage succeeded
    pub fn save(&self, pointer: &SessionPointer) -> bool {
        let serialized = match serde_json::to_string(pointer) {
            Ok(s) => s,
            Err(err) => {
                error!(error = %err, "failed to serialize session pointer");
                return false;
            }
        };
        match self.store.set(&self.storage_key, &serialized) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "failed to store session pointer");
                false
            }
        }
    }

    /// Load the pointer; expired or corrupt records are purged
    pub fn load(&self) -> Option<SessionPointer> {
        let raw = match self.store.get(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "session storage unavailable");
                return None;
            }
        };
        let pointer: SessionPointer = match serde_json::from_str(&raw) {
            Ok(pointer) => pointer,
            Err(err) => {
                warn!(error = %err, "corrupt session pointer, purging");
                self.clear();
                return None;
            }
        };
        if pointer.is_expired() {
            debug!("session pointer expired, purging");
            self.clear();
            return None;
        }
        Some(pointer)
    }

    /// Remove the pointer; safe to call when nothing is stored
    pub fn clear(&self) {
        if let Err(err) = self.store.remove(&self.storage_key) {
            warn!(error = %err, "failed to clear session pointer");
        }
    }
}
