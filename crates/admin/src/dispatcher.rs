//! The single mediation point between the view layer and the backend

use chrono::{Duration, Utc};
use ltzf_client::{
    ApiClient, ClientError, CredentialManager, CredentialStore, CredentialSummary,
};
use ltzf_common::{CacheConfig, Clock, ResponseCache, SystemClock};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::{Command, Event};
use crate::method::{params_is_empty, ApiCall, ApiMethod, BindError};

#[derive(Debug, Error)]
enum DispatchError {
    #[error("API client not initialized")]
    NotInitialized,

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Owner of the authenticated client, credential manager, and response cache
///
/// Every command goes through [`handle`](Self::handle) and produces exactly
/// one [`Event`]. The bound client only exists while valid credentials do:
/// authentication and session restoration bind it, logout and credential
/// destruction drop it.
pub struct Dispatcher<S, C = SystemClock>
where
    S: CredentialStore,
    C: Clock,
{
    auth: CredentialManager<S>,
    cache: ResponseCache<Value, C>,
    client: Option<ApiClient>,
}

impl<S: CredentialStore> Dispatcher<S, SystemClock> {
    /// Create a dispatcher, binding a client if valid credentials are
    /// already stored
    pub fn new(store: S, page_secure: bool) -> Self {
        Self::with_cache(store, page_secure, ResponseCache::new(CacheConfig::default()))
    }
}

impl<S, C> Dispatcher<S, C>
where
    S: CredentialStore,
    C: Clock,
{
    /// Create a dispatcher around an externally owned cache
    pub fn with_cache(store: S, page_secure: bool, cache: ResponseCache<Value, C>) -> Self {
        let auth = CredentialManager::new(store, page_secure);
        let client = auth.api_client().ok();
        if client.is_some() {
            debug!("client bound from stored credentials");
        }
        Self { auth, cache, client }
    }

    /// Whether an authenticated client is currently bound
    pub fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    /// The shared response cache, for subscriptions from the view layer
    pub fn cache(&self) -> &ResponseCache<Value, C> {
        &self.cache
    }

    /// Process one command
    pub async fn handle(&mut self, command: Command) -> Event {
        match command {
            Command::Authenticate { backend_url, api_key, remember_key } => {
                self.authenticate(backend_url, api_key, remember_key).await
            }
            Command::RestoreSession => self.restore_session().await,
            Command::ApiRequest { method, params, request_id } => {
                match self.run_api_request(&method, &params).await {
                    Ok(result) => Event::api_success(request_id, result),
                    Err(err) => {
                        warn!(method = %method, error = %err, "api request failed");
                        Event::api_failure(request_id, err.to_string())
                    }
                }
            }
            Command::Logout => self.logout(),
        }
    }

    async fn authenticate(
        &mut self,
        backend_url: String,
        api_key: String,
        remember_key: bool,
    ) -> Event {
        let scope = match self.auth.validate_credentials(&backend_url, &api_key).await {
            Ok(scope) => scope,
            Err(err) => {
                info!(backend_url = %backend_url, error = %err, "authentication rejected");
                return Event::AuthFailure { error: err.to_string() };
            }
        };

        let lifetime = if remember_key { Duration::days(7) } else { Duration::days(1) };
        let expires_at = Utc::now() + lifetime;
        self.auth.store_credentials(&backend_url, &api_key, scope.clone(), expires_at);

        match self.auth.api_client() {
            Ok(client) => {
                self.client = Some(client);
                info!(backend_url = %backend_url, scope = %scope, "authenticated");
                Event::AuthSuccess {
                    credentials: CredentialSummary { backend_url, scope, expires_at },
                }
            }
            Err(err) => Event::AuthFailure { error: err.to_string() },
        }
    }

    async fn restore_session(&mut self) -> Event {
        match self.auth.validate_stored_credentials().await {
            Ok(record) => match self.auth.api_client() {
                Ok(client) => {
                    self.client = Some(client);
                    info!(backend_url = %record.backend_url, "session restored");
                    Event::SessionRestored { credentials: CredentialSummary::from(&record) }
                }
                Err(err) => {
                    self.unbind_client();
                    Event::SessionExpired { error: err.to_string() }
                }
            },
            Err(err) => {
                info!(error = %err, transient = err.is_transient(), "session not restored");
                // A transient failure keeps the bound client for a retry;
                // anything terminal has already destroyed the credentials
                if !err.is_transient() {
                    self.unbind_client();
                }
                Event::SessionExpired { error: err.to_string() }
            }
        }
    }

    fn unbind_client(&mut self) {
        if self.client.take().is_some() {
            self.cache.clear();
            debug!("client unbound, cache cleared");
        }
    }

    fn logout(&mut self) -> Event {
        self.auth.clear_credentials();
        self.cache.clear();
        self.client = None;
        info!("logged out");
        Event::LogoutComplete
    }

    async fn run_api_request(&mut self, name: &str, params: &Value) -> Result<Value, DispatchError> {
        let client = self.client.clone().ok_or(DispatchError::NotInitialized)?;
        let method = ApiMethod::from_name(name).map_err(DispatchError::Bind)?;

        let cacheable = method.is_read() && params_is_empty(params);
        if cacheable {
            if let Some(hit) = self.cache.get(&method.cache_key()) {
                debug!(method = name, "served from cache");
                return Ok(hit);
            }
        }

        let call = method.bind(params)?;
        let result = execute(&client, call).await?;
        if cacheable {
            self.cache.set(method.cache_key(), result.clone());
        }
        Ok(result)
    }
}

/// Run a bound call against the client, flattening the result to JSON
async fn execute(client: &ApiClient, call: ApiCall) -> Result<Value, ClientError> {
    match call {
        ApiCall::Ping => {
            client.ping().await?;
            Ok(serde_json::json!({"status": "ok"}))
        }
        ApiCall::AuthStatus => to_json(client.auth_status().await?),
        ApiCall::GetVorgaenge { params } => to_json(client.get_vorgaenge(params).await?),
        ApiCall::GetVorgangById { id } => client.get_vorgang_by_id(&id).await,
        ApiCall::PutVorgangById { id, data } => {
            Ok(client.put_vorgang_by_id(&id, &data).await?.unwrap_or(Value::Null))
        }
        ApiCall::GetDocumentById { id } => client.get_document_by_id(&id).await,
        ApiCall::GetSitzungen { params } => to_json(client.get_sitzungen(params).await?),
        ApiCall::GetEnumerations { name, params } => client.get_enumerations(&name, params).await,
        ApiCall::UpdateEnumeration { name, values, replacing } => Ok(client
            .update_enumeration(&name, &values, &replacing)
            .await?
            .unwrap_or(Value::Null)),
        ApiCall::DeleteEnumerationValue { name, value } => Ok(client
            .delete_enumeration_value(&name, &value)
            .await?
            .unwrap_or(Value::Null)),
        ApiCall::GetAutoren { params } => client.get_autoren(params).await,
        ApiCall::UpdateAutoren { values, replacing } => {
            Ok(client.update_autoren(&values, &replacing).await?.unwrap_or(Value::Null))
        }
        ApiCall::DeleteAutorenByParams { params } => {
            Ok(client.delete_autoren_by_params(params).await?.unwrap_or(Value::Null))
        }
        ApiCall::GetGremien { params } => client.get_gremien(params).await,
        ApiCall::UpdateGremien { values, replacing } => {
            Ok(client.update_gremien(&values, &replacing).await?.unwrap_or(Value::Null))
        }
        ApiCall::DeleteGremienByParams { params } => {
            Ok(client.delete_gremien_by_params(params).await?.unwrap_or(Value::Null))
        }
        ApiCall::CreateApiKey { scope, expires_at } => {
            Ok(client.create_api_key(&scope, expires_at).await?.unwrap_or(Value::Null))
        }
        ApiCall::DeleteApiKey { key } => {
            Ok(client.delete_api_key(&key).await?.unwrap_or(Value::Null))
        }
        ApiCall::LoadDashboardStats => to_json(client.load_dashboard_stats().await?),
        ApiCall::LoadEnumerations => to_json(client.load_enumerations().await),
    }
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(ClientError::Payload)
}
