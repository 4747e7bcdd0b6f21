// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;

use crate::auth::account::ConnectedAccount;
use crate::client::executor::ApiClient;
use crate::config::auth::AuthConfig;
use crate::config::settings::SettingsConfig;
use crate::observability::diagnostics::{Breadcrumb, DiagnosticsSink};

pub const ACCOUNT: &str = "0xabc";
pub const FRESH_TOKEN: &str = "tok123";
pub const STALE_TOKEN: &str = "stale";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn settings(base_url: String, timeout_ms: Option<u64>) -> SettingsConfig {
    SettingsConfig {
        base_url,
        tenant_domain: Some("app.example.com".to_owned()),
        timeout_ms,
        retry: None,
        logging: None,
    }
}

pub fn build_client(base_url: String, account: Option<&str>) -> ApiClient {
    build_client_with(base_url, account, None, None)
}

pub fn build_client_with(
    base_url: String,
    account: Option<&str>,
    timeout_ms: Option<u64>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
) -> ApiClient {
    let accounts = Arc::new(ConnectedAccount::new(account.map(str::to_owned)));
    let mut builder = ApiClient::builder(settings(base_url, timeout_ms), AuthConfig::default(), accounts);
    if let Some(sink) = diagnostics {
        builder = builder.diagnostics(sink);
    }
    builder.build().expect("client")
}

/// Polls until `condition` holds, panics after two seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[derive(Default)]
pub struct RecordingDiagnostics {
    pub breadcrumbs: Mutex<Vec<Breadcrumb>>,
    pub messages: Mutex<Vec<String>>,
}

impl DiagnosticsSink for RecordingDiagnostics {
    fn breadcrumb(&self, breadcrumb: Breadcrumb) {
        self.breadcrumbs.lock().unwrap().push(breadcrumb);
    }

    fn message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_owned());
    }
}

/// What the mocked refresh endpoint answers.
#[derive(Clone, Copy, Debug)]
pub enum RefreshReply {
    Token(&'static str),
    Status(StatusCode),
}

/// Backend with protected `/pools/{id}` and the auth endpoints.
///
/// `/pools/{id}` accepts only `Bearer tok123` (or nothing, when `reject_all` is set)
/// and records every attempt as `(id, authorization)`.
#[derive(Clone)]
pub struct MockBackend {
    refresh_reply: RefreshReply,
    refresh_delay: Duration,
    reject_all: bool,
    refresh_calls: Arc<AtomicUsize>,
    refresh_headers: Arc<Mutex<Vec<HeaderMap>>>,
    pool_calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl MockBackend {
    pub fn new(refresh_reply: RefreshReply, refresh_delay: Duration) -> Self {
        Self {
            refresh_reply,
            refresh_delay,
            reject_all: false,
            refresh_calls: Arc::default(),
            refresh_headers: Arc::default(),
            pool_calls: Arc::default(),
        }
    }

    pub fn rejecting_every_token(mut self) -> Self {
        self.reject_all = true;
        self
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/pools/{id}", get(pool))
            .route("/auth/refresh", post(refresh))
            .route("/auth/refresh-settings", get(refresh_settings))
            .route("/auth/login", post(login))
            .route("/auth/challenge", post(login))
            .with_state(self.clone())
    }

    pub async fn spawn(&self) -> (JoinHandle<()>, String) {
        let (handle, addr) = spawn_axum(self.router()).await;
        (handle, format!("http://{}", addr))
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_headers(&self) -> Vec<HeaderMap> {
        self.refresh_headers.lock().unwrap().clone()
    }

    pub fn pool_calls(&self) -> Vec<(String, Option<String>)> {
        self.pool_calls.lock().unwrap().clone()
    }
}

async fn pool(
    State(backend): State<MockBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    backend.pool_calls.lock().unwrap().push((id.clone(), auth.clone()));

    let valid = format!("Bearer {}", FRESH_TOKEN);
    if !backend.reject_all && auth.as_deref() == Some(valid.as_str()) {
        (StatusCode::OK, Json(json!({ "id": id }))).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "token expired" }))).into_response()
    }
}

/// Protected like `/pools/{id}`, recorded as `refresh-settings`.
async fn refresh_settings(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    pool(State(backend), Path("refresh-settings".to_owned()), headers).await
}

async fn refresh(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    backend.refresh_headers.lock().unwrap().push(headers);
    tokio::time::sleep(backend.refresh_delay).await;

    match backend.refresh_reply {
        RefreshReply::Token(token) => {
            (StatusCode::OK, Json(json!({ "accessToken": token }))).into_response()
        }
        RefreshReply::Status(status) => {
            (status, Json(json!({ "message": "refresh token expired" }))).into_response()
        }
    }
}

async fn login() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "bad signature" }))).into_response()
}
