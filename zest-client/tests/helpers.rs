//! Test helpers: an in-process backend speaking the account API and serving
//! push streams, bound to an ephemeral port.
#![allow(dead_code)]

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use tokio::net::TcpListener;
use zest_client::zest_core::{ClientConfig, Navigator, UserAlert};

// Make sure tracing is only initialised once per test binary
static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

/// Host double that remembers every navigation and alert it receives
#[derive(Debug, Default)]
pub struct RecordingHost {
    navigations: Mutex<Vec<String>>,
    alerts: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Navigator for RecordingHost {
    fn navigate_to(&self, path: &str) {
        self.navigations.lock().unwrap().push(path.to_string());
    }
}

impl UserAlert for RecordingHost {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
}

/// Knobs for the mock backend
#[derive(Debug, Clone)]
pub struct MockOptions {
    /// Id given to the first registered user
    pub first_user_id: i32,
    /// Force the token endpoint to answer with this status
    pub token_status: Option<StatusCode>,
    /// Force the push endpoint to answer with this status
    pub push_status: Option<StatusCode>,
    /// Number of `update` events sent on each push stream
    pub push_events: usize,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            first_user_id: 1,
            token_status: None,
            push_status: None,
            push_events: 3,
        }
    }
}

pub struct MockState {
    options: MockOptions,
    // username -> (user id, password)
    users: Mutex<HashMap<String, (i32, String)>>,
    next_id: AtomicI32,
    issued_tokens: AtomicUsize,
    tokens: Mutex<HashMap<String, i32>>,
    pub register_bodies: Mutex<Vec<Value>>,
    // (user id, body) of every accepted credentials submission
    pub auth_creds: Mutex<Vec<(i32, Value)>>,
    pub push_connections: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl MockState {
    fn new(options: MockOptions) -> Self {
        Self {
            next_id: AtomicI32::new(options.first_user_id),
            options,
            users: Mutex::new(HashMap::new()),
            issued_tokens: AtomicUsize::new(0),
            tokens: Mutex::new(HashMap::new()),
            register_bodies: Mutex::new(Vec::new()),
            auth_creds: Mutex::new(Vec::new()),
            push_connections: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    fn username_for(&self, user_id: i32) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|(_, (id, _))| *id == user_id)
            .map(|(name, _)| name.clone())
    }
}

pub struct MockBackend {
    pub address: String,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_origin(&self.address)
    }

    pub fn push_connections(&self) -> usize {
        self.state.push_connections.load(Ordering::SeqCst)
    }

    pub fn register_bodies(&self) -> Vec<Value> {
        self.state.register_bodies.lock().unwrap().clone()
    }

    pub fn auth_creds(&self) -> Vec<(i32, Value)> {
        self.state.auth_creds.lock().unwrap().clone()
    }

    /// Create an account directly, bypassing the HTTP API
    pub fn seed_user(&self, username: &str, password: &str) -> i32 {
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        self.state
            .users
            .lock()
            .unwrap()
            .insert(username.to_string(), (id, password.to_string()));
        id
    }
}

pub async fn spawn_backend() -> MockBackend {
    spawn_backend_with(MockOptions::default()).await
}

pub async fn spawn_backend_with(options: MockOptions) -> MockBackend {
    LazyLock::force(&TRACING);

    let state = Arc::new(MockState::new(options));
    let app = Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", get(logout))
        .route("/api/me", get(me))
        .route("/api/auth-creds", post(auth_creds))
        .route("/api/sse-auth-token", get(sse_auth_token))
        .route("/push/{user_id}", get(push))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock backend failed");
    });

    MockBackend {
        address: format!("http://127.0.0.1:{}", port),
        state,
    }
}

fn error_json(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "code": code, "message": message }))).into_response()
}

fn with_session_cookie(user_id: i32, body: Value) -> Response {
    (
        [(header::SET_COOKIE, format!("user_id={}; Path=/", user_id))],
        Json(body),
    )
        .into_response()
}

fn session_user(headers: &HeaderMap) -> Option<i32> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix("user_id="))
        .find_map(|id| id.parse().ok())
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.register_bodies.lock().unwrap().push(body.clone());

    let username = body["username"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();

    if username.is_empty() || password.is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            "invalid_fields",
            "Username and password are required",
        );
    }

    let mut users = state.users.lock().unwrap();
    if users.contains_key(&username) {
        return error_json(StatusCode::CONFLICT, "user_exists", "Username already taken");
    }

    let user_id = state.next_id.fetch_add(1, Ordering::SeqCst);
    users.insert(username.clone(), (user_id, password));
    with_session_cookie(user_id, json!({ "user_id": user_id, "username": username }))
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let user_id = state
        .users
        .lock()
        .unwrap()
        .get(username)
        .filter(|(_, stored)| stored == password)
        .map(|(id, _)| *id);

    match user_id {
        Some(user_id) => {
            with_session_cookie(user_id, json!({ "user_id": user_id, "username": username }))
        }
        None => error_json(
            StatusCode::UNAUTHORIZED,
            "login_failed",
            "Invalid username or password",
        ),
    }
}

async fn logout(State(state): State<Arc<MockState>>) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    (
        [(header::SET_COOKIE, "user_id=; Path=/; Max-Age=0")],
        StatusCode::OK,
    )
        .into_response()
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let user = session_user(&headers)
        .and_then(|id| state.username_for(id).map(|name| (id, name)));

    match user {
        Some((user_id, username)) => {
            Json(json!({ "user_id": user_id, "username": username })).into_response()
        }
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn auth_creds(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(user_id) = session_user(&headers) else {
        return error_json(StatusCode::UNAUTHORIZED, "unauthorized", "Not signed in");
    };

    let complete = ["oauth_token", "client_id"]
        .iter()
        .all(|field| body[*field].as_str().is_some_and(|value| !value.is_empty()));
    if !complete {
        return error_json(
            StatusCode::BAD_REQUEST,
            "invalid_fields",
            "OAuth token and client id are required",
        );
    }

    state.auth_creds.lock().unwrap().push((user_id, body));
    StatusCode::OK.into_response()
}

async fn sse_auth_token(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let Some(user_id) = session_user(&headers) else {
        return error_json(StatusCode::UNAUTHORIZED, "unauthorized", "Not signed in");
    };

    if let Some(status) = state.options.token_status {
        return (status, "token service unavailable").into_response();
    }

    let n = state.issued_tokens.fetch_add(1, Ordering::SeqCst);
    let token = format!("tok{}x{}", user_id, n);
    state.tokens.lock().unwrap().insert(token.clone(), user_id);
    token.into_response()
}

async fn push(
    State(state): State<Arc<MockState>>,
    Path(user_id): Path<i32>,
    RawQuery(query): RawQuery,
) -> Response {
    if let Some(status) = state.options.push_status {
        return status.into_response();
    }

    // Tokens are single use
    let owner = query.and_then(|token| state.tokens.lock().unwrap().remove(&token));
    if owner != Some(user_id) {
        return StatusCode::FORBIDDEN.into_response();
    }

    state.push_connections.fetch_add(1, Ordering::SeqCst);
    let count = state.options.push_events;

    let stream = async_stream::stream! {
        for seq in 0..count {
            yield Ok::<Event, Infallible>(
                Event::default()
                    .event("update")
                    .id(seq.to_string())
                    .data(json!({ "user_id": user_id, "seq": seq }).to_string()),
            );
        }
        // Hold the stream open like a real push endpoint
        futures::future::pending::<()>().await;
    };

    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}
