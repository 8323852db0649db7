use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

pub const PASSWORD: &str = "secret";

/// Knobs and counters shared with the stub backend.
#[derive(Default)]
pub struct StubState {
    pub fail_menu: AtomicBool,
    pub omit_menu_field: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    pub menu_requests: AtomicUsize,
    pub last_bearer: Mutex<Option<String>>,
}

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: Arc<StubState>,
}

impl TestServer {
    pub fn fail_menu(&self, fail: bool) {
        self.state.fail_menu.store(fail, Ordering::SeqCst);
    }

    /// Answer menu requests with 200 and a body that has no `menu` field.
    pub fn omit_menu_field(&self, omit: bool) {
        self.state.omit_menu_field.store(omit, Ordering::SeqCst);
    }

    pub fn delay_refresh(&self, delay: Duration) {
        self.state
            .refresh_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn menu_requests(&self) -> usize {
        self.state.menu_requests.load(Ordering::SeqCst)
    }

    pub fn last_bearer(&self) -> Option<String> {
        self.state.last_bearer.lock().unwrap().clone()
    }
}

/// Start a stub HR backend on a free local port.
pub async fn spawn_server() -> Result<TestServer> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let base_url = format!("http://127.0.0.1:{}", port);
    let state = Arc::new(StubState::default());

    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/api/menu", get(menu))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind stub server")?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer {
        port,
        base_url,
        state,
    })
}

fn role_for(username: &str) -> &'static str {
    match username {
        "admin" => "Admin",
        "root" => "Super Admin",
        _ => "User",
    }
}

// All-digit usernames get an integer id, like a row key
fn user_id(username: &str) -> Value {
    username
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(username))
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let username = body["username"].as_str().unwrap_or_default();
    if body["password"] != PASSWORD || username.is_empty() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "invalid credentials" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "access_token": format!("access-{username}"),
            "refresh_token": format!("refresh-{username}"),
            "user": {
                "id": user_id(username),
                "name": format!("{username} example"),
                "email": format!("{username}@example.com"),
                "role": role_for(username),
            }
        })),
    )
}

async fn refresh(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    match body["refresh_token"].as_str().and_then(|t| t.strip_prefix("refresh-")) {
        Some(username) => (
            StatusCode::OK,
            Json(json!({
                "access_token": format!("access-{username}-renewed"),
                "refresh_token": format!("refresh-{username}"),
            })),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "invalid refresh token" })),
        ),
    }
}

async fn menu(State(state): State<Arc<StubState>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    state.menu_requests.fetch_add(1, Ordering::SeqCst);

    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    *state.last_bearer.lock().unwrap() = bearer.clone();

    if state.fail_menu.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": "menu service down" })),
        );
    }

    match bearer {
        Some(token) if token.starts_with("access-") && state.omit_menu_field.load(Ordering::SeqCst) => (
            StatusCode::OK,
            Json(json!({ "success": true, "detail": "menu moved" })),
        ),
        Some(token) if token.starts_with("access-") => (
            StatusCode::OK,
            Json(json!({
                "menu": [
                    { "key": "dashboard", "label": "Dashboard", "children": [] },
                    { "key": "hr", "label": "HR", "children": [
                        { "key": "leave", "label": "Leave requests" },
                        { "key": "early-departure", "label": "Early departure", "children": null }
                    ]}
                ]
            })),
        ),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "missing bearer token" })),
        ),
    }
}
