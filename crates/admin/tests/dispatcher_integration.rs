//! End-to-end command/event flows against a mock backend.

use std::sync::Arc;

use chrono::{Duration, Utc};
use ltzf_admin::{Command, Dispatcher, Event};
use ltzf_client::{CredentialManager, CredentialStore, MemoryCredentialStore, Scope};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dispatcher() -> (Dispatcher<Arc<MemoryCredentialStore>>, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    (Dispatcher::new(Arc::clone(&store), false), store)
}

fn request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4())
}

fn authenticate_command(server: &MockServer) -> Command {
    Command::Authenticate {
        backend_url: server.uri(),
        api_key: "valid-key".to_string(),
        remember_key: false,
    }
}

fn api_request(method: &str, params: Value) -> Command {
    Command::ApiRequest {
        method: method.to_string(),
        params,
        request_id: request_id(),
    }
}

async fn mock_auth_endpoints(server: &MockServer, scope: &str) {
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"scope": scope})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn authenticate_binds_client_and_reports_summary() {
    let server = MockServer::start().await;
    mock_auth_endpoints(&server, "admin").await;
    let (mut dispatcher, _store) = dispatcher();

    let event = dispatcher.handle(authenticate_command(&server)).await;

    let Event::AuthSuccess { credentials } = event else {
        panic!("expected AuthSuccess, got {event:?}");
    };
    assert_eq!(credentials.backend_url, server.uri());
    assert_eq!(credentials.scope, Scope::Admin);
    assert!(credentials.expires_at > Utc::now());
    assert!(dispatcher.is_initialized());
}

#[tokio::test]
async fn auth_events_never_carry_the_key() {
    let server = MockServer::start().await;
    mock_auth_endpoints(&server, "admin").await;
    let (mut dispatcher, _store) = dispatcher();

    let event = dispatcher.handle(authenticate_command(&server)).await;
    let serialized = serde_json::to_string(&event).unwrap();

    assert!(!serialized.contains("valid-key"));
}

#[tokio::test]
async fn remember_key_extends_expiry() {
    let server = MockServer::start().await;
    mock_auth_endpoints(&server, "admin").await;
    let (mut dispatcher, _store) = dispatcher();

    let event = dispatcher
        .handle(Command::Authenticate {
            backend_url: server.uri(),
            api_key: "valid-key".to_string(),
            remember_key: true,
        })
        .await;

    let Event::AuthSuccess { credentials } = event else {
        panic!("expected AuthSuccess, got {event:?}");
    };
    assert!(credentials.expires_at > Utc::now() + Duration::days(6));
}

#[tokio::test]
async fn invalid_key_yields_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/status"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    let (mut dispatcher, _store) = dispatcher();

    let event = dispatcher.handle(authenticate_command(&server)).await;

    assert_eq!(event, Event::AuthFailure { error: "Invalid API key".to_string() });
    assert!(!dispatcher.is_initialized());
}

#[tokio::test]
async fn insufficient_scope_yields_auth_failure() {
    let server = MockServer::start().await;
    mock_auth_endpoints(&server, "collector").await;
    let (mut dispatcher, _store) = dispatcher();

    let event = dispatcher.handle(authenticate_command(&server)).await;

    assert_eq!(
        event,
        Event::AuthFailure {
            error: "Insufficient permissions. Required: admin or keyadder, got: collector"
                .to_string()
        }
    );
}

#[tokio::test]
async fn api_request_without_client_fails() {
    let (mut dispatcher, _store) = dispatcher();

    let event = dispatcher.handle(api_request("getVorgaenge", json!({}))).await;

    let Event::ApiResponse { success, error, .. } = event else {
        panic!("expected ApiResponse");
    };
    assert!(!success);
    assert_eq!(error.as_deref(), Some("API client not initialized"));
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let server = MockServer::start().await;
    mock_auth_endpoints(&server, "admin").await;
    let (mut dispatcher, _store) = dispatcher();
    dispatcher.handle(authenticate_command(&server)).await;

    let event = dispatcher.handle(api_request("frobnicate", json!({}))).await;

    let Event::ApiResponse { success, error, .. } = event else {
        panic!("expected ApiResponse");
    };
    assert!(!success);
    assert_eq!(error.as_deref(), Some("Unknown API method: frobnicate"));
}

#[tokio::test]
async fn parameterless_read_is_served_from_cache() {
    let server = MockServer::start().await;
    mock_auth_endpoints(&server, "admin").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/autoren"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"person": "X"}])))
        .expect(1)
        .mount(&server)
        .await;
    let (mut dispatcher, _store) = dispatcher();
    dispatcher.handle(authenticate_command(&server)).await;

    let first = dispatcher.handle(api_request("getAutoren", json!({}))).await;
    let second = dispatcher.handle(api_request("getAutoren", json!(null))).await;

    for event in [first, second] {
        let Event::ApiResponse { success, result, .. } = event else {
            panic!("expected ApiResponse");
        };
        assert!(success);
        assert_eq!(result, Some(json!([{"person": "X"}])));
    }
}

#[tokio::test]
async fn parameterized_read_bypasses_cache() {
    let server = MockServer::start().await;
    mock_auth_endpoints(&server, "admin").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/vorgang"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;
    let (mut dispatcher, _store) = dispatcher();
    dispatcher.handle(authenticate_command(&server)).await;

    dispatcher.handle(api_request("getVorgaenge", json!({"per_page": 5}))).await;
    dispatcher.handle(api_request("getVorgaenge", json!({"per_page": 5}))).await;
}

#[tokio::test]
async fn backend_error_is_reported_verbatim() {
    let server = MockServer::start().await;
    mock_auth_endpoints(&server, "admin").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/vorgang/v-404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let (mut dispatcher, _store) = dispatcher();
    dispatcher.handle(authenticate_command(&server)).await;

    let event = dispatcher
        .handle(api_request("getVorgangById", json!({"id": "v-404"})))
        .await;

    let Event::ApiResponse { success, error, .. } = event else {
        panic!("expected ApiResponse");
    };
    assert!(!success);
    assert_eq!(error.as_deref(), Some("HTTP 404"));
}

#[tokio::test]
async fn logout_destroys_client_cache_and_credentials() {
    let server = MockServer::start().await;
    mock_auth_endpoints(&server, "admin").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/autoren"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    let (mut dispatcher, store) = dispatcher();
    dispatcher.handle(authenticate_command(&server)).await;
    dispatcher.handle(api_request("getAutoren", json!({}))).await;

    let event = dispatcher.handle(Command::Logout).await;

    assert_eq!(event, Event::LogoutComplete);
    assert!(!dispatcher.is_initialized());
    assert_eq!(dispatcher.cache().stats().entries, 0);
    assert!(store.get("ltzf_auth").unwrap().is_none());

    let event = dispatcher.handle(api_request("getAutoren", json!({}))).await;
    let Event::ApiResponse { success, .. } = event else {
        panic!("expected ApiResponse");
    };
    assert!(!success);
}

#[tokio::test]
async fn new_dispatcher_binds_from_stored_credentials() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = CredentialManager::new(Arc::clone(&store), false);
    manager.store_credentials(&server.uri(), "key", Scope::Admin, Utc::now() + Duration::hours(1));

    let dispatcher = Dispatcher::new(store, false);

    assert!(dispatcher.is_initialized());
}

#[tokio::test]
async fn restore_session_revalidates_stored_credentials() {
    let server = MockServer::start().await;
    mock_auth_endpoints(&server, "admin").await;
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = CredentialManager::new(Arc::clone(&store), false);
    manager.store_credentials(&server.uri(), "key", Scope::Admin, Utc::now() + Duration::hours(1));
    let mut dispatcher = Dispatcher::new(store, false);

    let event = dispatcher.handle(Command::RestoreSession).await;

    let Event::SessionRestored { credentials } = event else {
        panic!("expected SessionRestored, got {event:?}");
    };
    assert_eq!(credentials.backend_url, server.uri());
    assert_eq!(credentials.scope, Scope::Admin);
}

#[tokio::test]
async fn restore_without_credentials_expires_session() {
    let (mut dispatcher, _store) = dispatcher();

    let event = dispatcher.handle(Command::RestoreSession).await;

    assert_eq!(event, Event::SessionExpired { error: "No stored credentials".to_string() });
}

#[tokio::test]
async fn restore_destroys_credentials_after_three_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = CredentialManager::new(Arc::clone(&store), false);
    manager.store_credentials(&server.uri(), "key", Scope::Admin, Utc::now() + Duration::hours(1));
    let mut dispatcher = Dispatcher::new(Arc::clone(&store), false);

    for _ in 0..2 {
        let event = dispatcher.handle(Command::RestoreSession).await;
        assert_eq!(
            event,
            Event::SessionExpired { error: "Validation failed, will retry".to_string() }
        );
        assert!(store.get("ltzf_auth").unwrap().is_some());
    }

    let event = dispatcher.handle(Command::RestoreSession).await;
    assert_eq!(
        event,
        Event::SessionExpired { error: "Stored credentials are invalid".to_string() }
    );
    assert!(store.get("ltzf_auth").unwrap().is_none());

    let event = dispatcher.handle(Command::RestoreSession).await;
    assert_eq!(event, Event::SessionExpired { error: "No stored credentials".to_string() });
}

#[tokio::test]
async fn terminal_restore_failure_unbinds_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/autoren"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = CredentialManager::new(Arc::clone(&store), false);
    manager.store_credentials(&server.uri(), "key", Scope::Admin, Utc::now() + Duration::hours(1));
    let mut dispatcher = Dispatcher::new(Arc::clone(&store), false);
    dispatcher.handle(api_request("getAutoren", json!({}))).await;
    assert_eq!(dispatcher.cache().stats().entries, 1);

    // Transient failures keep the bound client for a retry
    for _ in 0..2 {
        dispatcher.handle(Command::RestoreSession).await;
        assert!(dispatcher.is_initialized());
    }

    let event = dispatcher.handle(Command::RestoreSession).await;
    assert_eq!(
        event,
        Event::SessionExpired { error: "Stored credentials are invalid".to_string() }
    );
    assert!(!dispatcher.is_initialized());
    assert_eq!(dispatcher.cache().stats().entries, 0);

    let event = dispatcher.handle(api_request("getAutoren", json!({}))).await;
    let Event::ApiResponse { success, error, .. } = event else {
        panic!("expected ApiResponse");
    };
    assert!(!success);
    assert_eq!(error, Some("API client not initialized".to_string()));
}
