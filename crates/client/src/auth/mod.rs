//! Credential validation and persistence
//!
//! The manager owns the credential lifecycle: validating a key against the
//! backend, persisting the accepted record through a pluggable store, and
//! re-validating stored credentials with a capped retry counter so a dead
//! backend cannot loop the login flow forever.

mod manager;
mod store;
mod types;

pub use manager::{
    AuthError, CredentialManager, RevalidationError, CREDENTIAL_STORAGE_KEY,
    MAX_VALIDATION_ATTEMPTS,
};
pub use store::{CredentialStore, MemoryCredentialStore, StorageError};
pub use types::{CredentialRecord, CredentialSummary, Scope};
