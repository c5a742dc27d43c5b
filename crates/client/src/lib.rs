//! HTTP client for the LTZF backend
//!
//! Layers, bottom up:
//! - `config`: backend URL normalization and client settings
//! - `transport`: the raw request/response path (headers, status mapping,
//!   network-failure classification)
//! - `resources`: one typed method per backend operation, plus pagination
//!   extraction and the aggregate dashboard/enumeration loaders
//! - `auth`: credential validation, obscured persistence, and capped
//!   re-validation of stored credentials
//! - `session`: the longer-lived session pointer record

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod config;
pub mod error;
pub mod resources;
pub mod session;
pub mod transport;

pub use auth::{
    AuthError, CredentialManager, CredentialRecord, CredentialStore, CredentialSummary,
    MemoryCredentialStore, RevalidationError, Scope, StorageError,
};
pub use config::ClientConfig;
pub use error::ClientError;
pub use resources::{AuthStatus, DashboardStats, Page, ENUMERATION_NAMES};
pub use session::{SessionPointer, SessionPointerStore, SESSION_STORAGE_KEY};
pub use transport::{ApiClient, ApiResponse, RequestOptions};
