//! Stub notification backend
//!
//! Serves the REST endpoints `HttpNotificationSource` talks to from an in-memory store.
//! Each test gets its own backend on a random port; dropping it shuts the server down.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use notification_sync::notifications::{Notification, NotificationPage};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct BackendState {
    /// user -> notifications, newest first
    notifications: HashMap<String, Vec<Notification>>,
    forced_status: Option<u16>,
    raw_count: Option<serde_json::Value>,
    authorization: Vec<Option<String>>,
    paths: Vec<String>,
}

type SharedState = Arc<Mutex<BackendState>>;

#[derive(Deserialize)]
struct ListQuery {
    page: u32,
    page_size: u32,
    #[serde(default)]
    unread_only: bool,
    #[serde(rename = "type")]
    notification_type: Option<String>,
}

/// Stub backend instance
///
/// When dropped, the server gracefully shuts down.
pub struct StubBackend {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    state: SharedState,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl StubBackend {
    /// Spawns a new stub backend on a random port
    ///
    /// # Panics
    ///
    /// Panics if port binding fails.
    pub async fn spawn() -> Self {
        let state = SharedState::default();

        let app = Router::new()
            .route(
                "/v1/users/{user_id}/notifications/unread-count",
                get(unread_count),
            )
            .route("/v1/users/{user_id}/notifications", get(list_notifications))
            .route(
                "/v1/users/{user_id}/notifications/read-all",
                post(mark_all_read),
            )
            .route("/v1/notifications/{id}/read", post(mark_read))
            .route("/v1/notifications/{id}", delete(delete_notification))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn add_notifications(&self, user_id: &str, notifications: Vec<Notification>) {
        let mut state = self.state.lock().unwrap();
        let list = state.notifications.entry(user_id.to_string()).or_default();
        list.extend(notifications);
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// Answer every request with `status` until cleared.
    pub fn force_status(&self, status: Option<u16>) {
        self.state.lock().unwrap().forced_status = status;
    }

    /// Serve `body` verbatim from the unread count endpoint.
    pub fn set_raw_count_body(&self, body: serde_json::Value) {
        self.state.lock().unwrap().raw_count = Some(body);
    }

    pub fn notification(&self, id: &str) -> Option<Notification> {
        self.state
            .lock()
            .unwrap()
            .notifications
            .values()
            .flat_map(|list| list.iter())
            .find(|n| n.id == id)
            .cloned()
    }

    /// Authorization header of every request received, in order.
    pub fn authorization_headers(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().authorization.clone()
    }

    /// Raw request paths received, in order.
    pub fn request_paths(&self) -> Vec<String> {
        self.state.lock().unwrap().paths.clone()
    }
}

/// Records the request and returns the forced error response, if any.
fn record(state: &SharedState, headers: &HeaderMap, path: String) -> Option<Response> {
    let mut state = state.lock().unwrap();
    state.authorization.push(
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    );
    state.paths.push(path);
    state.forced_status.map(|status| {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, "forced failure").into_response()
    })
}

async fn unread_count(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = record(&state, &headers, format!("unread-count/{}", user_id)) {
        return response;
    }
    let state = state.lock().unwrap();
    if let Some(raw) = &state.raw_count {
        return Json(raw.clone()).into_response();
    }
    let count = state
        .notifications
        .get(&user_id)
        .map(|list| list.iter().filter(|n| n.is_unread()).count())
        .unwrap_or(0);
    Json(json!({ "count": count })).into_response()
}

async fn list_notifications(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = record(&state, &headers, format!("list/{}", user_id)) {
        return response;
    }
    let state = state.lock().unwrap();
    let matching: Vec<Notification> = state
        .notifications
        .get(&user_id)
        .map(|list| {
            list.iter()
                .filter(|n| !query.unread_only || n.is_unread())
                .filter(|n| {
                    query
                        .notification_type
                        .as_deref()
                        .map_or(true, |t| n.notification_type.as_str() == t)
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let start = (query.page as usize) * (query.page_size as usize);
    let page = NotificationPage {
        data: matching
            .iter()
            .skip(start)
            .take(query.page_size as usize)
            .cloned()
            .collect(),
        total: matching.len() as u64,
        page: query.page,
        page_size: query.page_size,
    };
    Json(page).into_response()
}

async fn mark_read(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = record(&state, &headers, format!("read/{}", id)) {
        return response;
    }
    let mut state = state.lock().unwrap();
    let Some(notification) = state
        .notifications
        .values_mut()
        .flat_map(|list| list.iter_mut())
        .find(|n| n.id == id)
    else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let updated = notification.read_at.is_none();
    if updated {
        notification.read_at = Some(notification.created_at + 1);
    }
    Json(json!({ "updated": updated })).into_response()
}

async fn mark_all_read(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = record(&state, &headers, format!("read-all/{}", user_id)) {
        return response;
    }
    let mut state = state.lock().unwrap();
    let mut updated = 0u64;
    if let Some(list) = state.notifications.get_mut(&user_id) {
        for notification in list.iter_mut().filter(|n| n.read_at.is_none()) {
            notification.read_at = Some(notification.created_at + 1);
            updated += 1;
        }
    }
    Json(json!({ "updated": updated })).into_response()
}

async fn delete_notification(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = record(&state, &headers, format!("delete/{}", id)) {
        return response;
    }
    let mut state = state.lock().unwrap();
    let mut deleted = false;
    for list in state.notifications.values_mut() {
        if let Some(index) = list.iter().position(|n| n.id == id) {
            list.remove(index);
            deleted = true;
            break;
        }
    }
    Json(json!({ "deleted": deleted })).into_response()
}
