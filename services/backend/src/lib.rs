// backend: real-time sensor-telemetry ingest and fan-out service.
//
// Payloads arrive over UDP or HTTP, are normalized to the canonical event,
// broadcast to WebSocket subscribers, appended to the hourly NDJSON log,
// and evaluated against the YAML rule set; alerts pass the deduper before
// fan-out.  Library form exposes the pieces for integration testing.

pub mod config;
pub mod dedup;
pub mod http;
pub mod ingest;
pub mod metrics;
pub mod recorder;
pub mod state;
pub mod udp;
pub mod ws;

pub use state::AppState;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    Router::new()
        .route("/ingest", post(http::ingest::ingest))
        .route("/healthz", get(http::core::healthz))
        .route("/status", get(http::core::status))
        .route("/rules", get(http::rules::list_rules))
        .route("/rules/reload", post(http::rules::reload_rules))
        .route("/ws", get(http::ws::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `*` anywhere in the list means wildcard; otherwise only the listed
/// origins are allowed.  An empty list allows none.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin
                .parse()
                .map_err(|_| warn!(origin = %origin, "ignoring unparseable CORS origin"))
                .ok()
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}
