//! HTTP and WebSocket route handlers.

pub mod core;
pub mod ingest;
pub mod rules;
pub mod ws;

use axum::http::HeaderMap;
use serde::Deserialize;

use crate::state::AppState;

/// `?secret=` fallback for clients that cannot set headers.
#[derive(Debug, Deserialize, Default)]
pub struct AuthQuery {
    pub secret: Option<String>,
}

/// Pull the shared secret from the configured header or the query string.
pub fn provided_secret(
    state: &AppState,
    headers: &HeaderMap,
    query: &AuthQuery,
) -> Option<String> {
    headers
        .get(state.config.auth_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .or_else(|| query.secret.clone())
}
