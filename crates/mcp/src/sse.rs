//! SSE transport: one event stream per client session, requests by POST.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::McpServer;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Open SSE sessions, each fed by an unbounded channel of serialized responses.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, mpsc::UnboundedSender<String>>>,
}

impl SessionRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<String>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, session_id: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(session_id.to_owned(), tx);
        rx
    }

    pub fn remove(&self, session_id: &str) {
        self.lock().remove(session_id);
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Queues `payload` for one session; false if it is gone.
    pub fn send(&self, session_id: &str, payload: String) -> bool {
        self.lock().get(session_id).is_some_and(|tx| tx.send(payload).is_ok())
    }

    /// The session id when exactly one session is open.
    pub fn sole_session(&self) -> Option<String> {
        let sessions = self.lock();
        match sessions.len() {
            1 => sessions.keys().next().cloned(),
            _ => None,
        }
    }
}

pub struct SseState {
    pub server: Arc<McpServer>,
    pub sessions: SessionRegistry,
}

/// Unregisters the session once its stream is dropped.
struct SessionGuard {
    state: Arc<SseState>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.sessions.remove(&self.session_id);
        tracing::info!(session_id = %self.session_id, "SSE session closed");
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

pub fn create_router(server: Arc<McpServer>) -> Router {
    let state = Arc::new(SseState { server, sessions: SessionRegistry::default() });
    Router::new()
        .route("/sse", get(sse_handler))
        .route("/messages/", post(session_message))
        .route("/messages", post(session_message))
        .route("/message", post(legacy_message))
        .route("/health", get(health))
        .with_state(state)
}

/// Serves the SSE transport on `addr` until the process is stopped.
pub async fn run_sse(server: Arc<McpServer>, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("MCP SSE server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(server)).await
}

async fn sse_handler(State(state): State<Arc<SseState>>) -> impl IntoResponse {
    let session_id = Uuid::new_v4().simple().to_string();
    let mut rx = state.sessions.register(&session_id);
    tracing::info!(%session_id, "SSE session opened");

    let endpoint = format!("/messages/?session_id={session_id}");
    let guard = SessionGuard { state: Arc::clone(&state), session_id };
    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<_, Infallible>(Event::default().event("endpoint").data(endpoint));
        while let Some(payload) = rx.recv().await {
            yield Ok(Event::default().event("message").data(payload));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default().interval(KEEP_ALIVE_INTERVAL))
}

/// `POST /messages/?session_id=..`: accepted immediately, answered on the stream.
async fn session_message(
    State(state): State<Arc<SseState>>,
    Query(query): Query<SessionQuery>,
    body: String,
) -> Response {
    if !state.sessions.contains(&query.session_id) {
        return (StatusCode::NOT_FOUND, "Could not find session").into_response();
    }
    tokio::spawn(async move {
        if let Some(payload) = respond(&state.server, &body).await {
            if !state.sessions.send(&query.session_id, payload) {
                tracing::warn!(session_id = %query.session_id, "Session closed before response");
            }
        }
    });
    (StatusCode::ACCEPTED, "Accepted").into_response()
}

/// `POST /message` without a session: answered on the only open stream.
/// Refused with 409 when no stream or more than one is open.
async fn legacy_message(State(state): State<Arc<SseState>>, body: String) -> Response {
    let Some(session_id) = state.sessions.sole_session() else {
        tracing::warn!(open = state.sessions.len(), "Session-less message refused");
        return (
            StatusCode::CONFLICT,
            "Post to the session endpoint announced on the SSE stream",
        )
            .into_response();
    };
    tokio::spawn(async move {
        if let Some(payload) = respond(&state.server, &body).await {
            if !state.sessions.send(&session_id, payload) {
                tracing::warn!(%session_id, "Session closed before response");
            }
        }
    });
    (StatusCode::ACCEPTED, "Accepted").into_response()
}

async fn respond(server: &McpServer, body: &str) -> Option<String> {
    let response = server.handle_message(body).await?;
    match serde_json::to_string(&response) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to serialize MCP response: {e}");
            None
        },
    }
}

async fn health(State(state): State<Arc<SseState>>) -> Json<crate::ServerStatus> {
    Json(state.server.status().await)
}
