//! Shared test harness: the full application router over the in-memory
//! ledger and a scripted endpoint, plus request helpers.

#![allow(dead_code)]

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use beamline_db::ledger::{Ledger, MemoryLedger};
use beamline_dispatch::{DispatchEngine, EngineConfig, NoDelayPacer};
use beamline_events::EventBus;
use beamline_gateway::credentials::CredentialStore;
use beamline_gateway::endpoint::{Attachment, ChatEndpoint, EndpointError, EndpointEvent};
use beamline_gateway::manager::{SessionConfig, SessionManager};
use beamline_gateway::session::SessionState;
use beamline_licensing::LicenseService;
use http_body_util::BodyExt;
use tokio::sync::{mpsc, Mutex};
use tower::ServiceExt;

use beamline_api::auth::jwt::JwtConfig;
use beamline_api::auth::password::hash_password;
use beamline_api::config::ServerConfig;
use beamline_api::router::build_app_router;
use beamline_api::state::AppState;

/// Credentials of the seeded administrative account.
pub const ADMIN_EMAIL: &str = "admin@beamline.dev";
pub const ADMIN_PASSWORD: &str = "admin-test-pass";

// ---------------------------------------------------------------------------
// Scripted endpoint
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct TestEndpoint {
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    /// Successful deliveries, in order.
    pub sends: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ChatEndpoint for TestEndpoint {
    async fn connect(&self) -> Result<(), EndpointError> {
        self.connect_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), EndpointError> {
        self.disconnect_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn send(
        &self,
        address: &str,
        message: &str,
        _attachment: Option<&Attachment>,
    ) -> Result<(), EndpointError> {
        self.sends.lock().await.push((address.into(), message.into()));
        Ok(())
    }

    async fn is_reachable(&self, _address: &str) -> Result<bool, EndpointError> {
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub endpoint: Arc<TestEndpoint>,
    pub events_tx: mpsc::Sender<EndpointEvent>,
}

fn test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".into()],
        request_timeout_secs: 5,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".into(),
            token_expiry_days: 1,
        },
        database_url: None,
        bridge_ws_url: "ws://127.0.0.1:0/bridge".into(),
        credentials_dir: std::env::temp_dir()
            .join(format!("beamline-api-test-{}", uuid::Uuid::new_v4()))
            .display()
            .to_string(),
        pacing_secs: 0,
        relink_delay_secs: 60,
        auth_failure_ceiling: 5,
        sweep_interval_secs: 3600,
        check_reachability: true,
        admin_email: ADMIN_EMAIL.into(),
        admin_password: ADMIN_PASSWORD.into(),
    }
}

/// Build the full application over a seeded memory ledger.
pub async fn build_test_app() -> TestApp {
    let config = test_server_config();

    let password_hash = hash_password(ADMIN_PASSWORD).expect("hashing should succeed");
    let ledger: Arc<dyn Ledger> =
        Arc::new(MemoryLedger::seeded(ADMIN_EMAIL, "Admin", password_hash));

    let bus = Arc::new(EventBus::default());
    let endpoint = Arc::new(TestEndpoint::default());
    let (events_tx, events_rx) = mpsc::channel(16);

    let session = SessionManager::start(
        Arc::clone(&endpoint) as Arc<dyn ChatEndpoint>,
        events_rx,
        Arc::clone(&bus),
        CredentialStore::new(&config.credentials_dir),
        SessionConfig {
            relink_delay: Duration::from_secs(config.relink_delay_secs),
            auth_failure_ceiling: config.auth_failure_ceiling,
        },
    );

    let licenses = Arc::new(LicenseService::new(Arc::clone(&ledger), Arc::clone(&bus)));
    let engine = Arc::new(DispatchEngine::new(
        Arc::clone(&endpoint) as Arc<dyn ChatEndpoint>,
        Arc::clone(&session),
        Arc::clone(&ledger),
        Arc::clone(&bus),
        Arc::new(NoDelayPacer),
        EngineConfig::default(),
    ));

    let state = AppState {
        ledger,
        bus,
        session,
        licenses,
        engine,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state.clone(), &config);

    TestApp {
        app,
        state,
        endpoint,
        events_tx,
    }
}

/// Push a `ready` event and wait until the coordinator reflects it.
pub async fn make_session_ready(app: &TestApp) {
    app.events_tx.send(EndpointEvent::Ready).await.unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while app.state.session.state().await.state != SessionState::Ready {
        assert!(
            tokio::time::Instant::now() < deadline,
            "session never became ready"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// GET a path, optionally with a Bearer token.
pub async fn get(app: &TestApp, uri: &str, token: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {token}"));
    }
    app.app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Send a JSON body with the given method.
pub async fn send_json(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {token}"));
    }
    app.app
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(
    app: &TestApp,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response<Body> {
    send_json(app, "POST", uri, body, token).await
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

// ---------------------------------------------------------------------------
// Auth helpers
// ---------------------------------------------------------------------------

/// Log in and return the access token.
pub async fn login(app: &TestApp, email: &str, password: &str) -> String {
    let response = post_json(
        app,
        "/api/v1/auth/login",
        serde_json::json!({ "email": email, "password": password }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK, "login should succeed");
    body_json(response).await["token"]
        .as_str()
        .expect("token field")
        .to_string()
}

/// Register a fresh user and return the access token.
pub async fn signup(app: &TestApp, name: &str, email: &str, password: &str) -> String {
    let response = post_json(
        app,
        "/api/v1/auth/signup",
        serde_json::json!({ "name": name, "email": email, "password": password }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK, "signup should succeed");
    body_json(response).await["token"]
        .as_str()
        .expect("token field")
        .to_string()
}

/// Token for the seeded admin account.
pub async fn admin_token(app: &TestApp) -> String {
    login(app, ADMIN_EMAIL, ADMIN_PASSWORD).await
}
