//! Status and health endpoints.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::config::APP_TITLE;
use crate::state::AppState;
use zmeta_schema::SUPPORTED_SCHEMA_VERSIONS;

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": format!("{APP_TITLE} running"),
        "clients": state.hub.client_count(),
    }))
}

/// Always 200; the body carries the counters, rate windows, and the
/// effective auth/CORS configuration.
pub async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.metrics.snapshot();
    let recorder = state.recorder.stats();
    let deduper = state.deduper.stats();
    let auth_enabled = state.config.auth_enabled();
    Json(json!({
        "status": "ok",
        "clients": state.hub.client_count(),
        "udp_received_total": snapshot.udp_received_total,
        "validated_total": snapshot.validated_total,
        "dropped_total": snapshot.dropped_total,
        "alerts_total": snapshot.alerts_total,
        "eps_1s": state.metrics.eps(1),
        "eps_10s": state.metrics.eps(10),
        "last_packet_age_s": state.metrics.last_packet_age(),
        "ws_queue_max": state.config.ws_queue_max,
        "ws_sent_total": snapshot.ws_sent_total,
        "ws_dropped_total": snapshot.ws_dropped_total,
        "adapter_counts": snapshot.adapter_counts,
        "recorder_written_total": recorder.total_written,
        "recorder_dropped_total": recorder.dropped,
        "alerts_suppressed_total": deduper.suppressed_total,
        "auth_mode": if auth_enabled { "shared_secret" } else { "disabled" },
        "auth_header": if auth_enabled { Value::from(state.config.auth_header.clone()) } else { Value::Null },
        "allowed_origins": state.config.allowed_origins,
        "environment": state.config.environment,
        "supported_schema_versions": SUPPORTED_SCHEMA_VERSIONS,
    }))
}
