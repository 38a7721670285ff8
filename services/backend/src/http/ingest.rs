//! `POST /ingest`: the HTTP entry into the pipeline.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use super::{provided_secret, AuthQuery};
use crate::ingest::{ingest_payload, IngestError};
use crate::state::AppState;

pub async fn ingest(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    if state.config.auth_enabled() {
        let provided = provided_secret(&state, &headers, &query);
        if !state.config.verify_shared_secret(provided.as_deref()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "Unauthorized"})),
            )
                .into_response();
        }
    }

    match ingest_payload(&state, &payload, "http").await {
        Ok(_) => Json(json!({
            "ok": true,
            "broadcast_to": state.hub.client_count(),
        }))
        .into_response(),
        Err(IngestError::InvalidPayload(e)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": [e.to_string()]})),
        )
            .into_response(),
    }
}
