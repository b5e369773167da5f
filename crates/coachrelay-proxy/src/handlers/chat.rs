//! Chat relay route shims.
//!
//! Each hosting target gets its own path; all of them run the same relay
//! with a different deployment profile.

use axum::extract::State;
use axum::http::Method;
use axum::response::Response;
use bytes::Bytes;

use crate::server::AppState;

/// `/api/deepseek/chat`, using the configured profile.
pub async fn primary(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    state.relays.primary.handle_chat_request(&method, body).await
}

/// `/.netlify/functions/deepseek-chat`
pub async fn function(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    state.relays.function.handle_chat_request(&method, body).await
}

/// `/deepseek-chat-edge`
pub async fn edge(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    state.relays.edge.handle_chat_request(&method, body).await
}
