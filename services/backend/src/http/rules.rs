//! Rule-set introspection and hot reload.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, info};

use crate::state::AppState;

pub async fn list_rules(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "count": state.rules.len(),
        "rules": state.rules.rule_names(),
    }))
}

/// Atomically swap in the rule file's current contents; the previous set
/// stays active when the file fails to parse.
pub async fn reload_rules(State(state): State<AppState>) -> Response {
    match state.rules.reload() {
        Ok(count) => {
            info!(count, "rule set reloaded");
            Json(json!({"reloaded": true, "count": count})).into_response()
        }
        Err(e) => {
            error!(error = %e, "rule reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": [e.to_string()]})),
            )
                .into_response()
        }
    }
}
