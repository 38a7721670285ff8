//! WebSocket surface: greeting, echo, event fan-out, alert dedup, auth.

mod common;

use common::{rf_event_payload, wait_until, TestApp, RF_ALERT_RULES};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_text(ws: &mut WsStream) -> String {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        match message {
            Message::Text(text) => return text.to_string(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn connected_subscriber(app: &TestApp) -> WsStream {
    let (mut ws, _) = connect_async(app.ws_url("/ws")).await.expect("connect");
    let greeting = next_text(&mut ws).await;
    assert_eq!(greeting, "Connected to ZMeta WebSocket");
    wait_until(|| app.state.hub.client_count() == 1).await;
    ws
}

#[tokio::test]
async fn subscriber_gets_greeting_then_events_in_order() {
    let app = TestApp::spawn().await;
    let mut ws = connected_subscriber(&app).await;

    let client = reqwest::Client::new();
    let response: serde_json::Value = client
        .post(app.url("/ingest"))
        .json(&rf_event_payload())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["broadcast_to"], 1);

    let event: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(event["sensor_id"], "s1");
    assert_eq!(event["sequence"], 1);
    assert_eq!(event["data"]["value"]["frequency_hz"], json!(915_200_000_i64));

    app.shutdown().await;
}

#[tokio::test]
async fn inbound_text_is_echoed() {
    let app = TestApp::spawn().await;
    let mut ws = connected_subscriber(&app).await;

    ws.send(Message::Text("ping".into())).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "Echo: ping");

    app.shutdown().await;
}

#[tokio::test]
async fn duplicate_alert_within_ttl_is_broadcast_once() {
    let app = TestApp::spawn().await;
    app.write_rules(RF_ALERT_RULES);
    app.state.rules.reload().unwrap();

    let mut ws = connected_subscriber(&app).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        client
            .post(app.url("/ingest"))
            .json(&rf_event_payload())
            .send()
            .await
            .unwrap();
    }

    // Expected frames: event, alert, event — and no second alert.
    let first: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(first["sequence"], 1);
    let alert: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(alert["type"], "alert");
    assert_eq!(alert["rule"], "rf_strong_signal");
    assert_eq!(alert["severity"], "warn");
    assert_eq!(alert["loc"], json!({"lat": 42.0, "lon": -71.0}));
    let second: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(second["sequence"], 2);

    let snapshot = app.state.metrics.snapshot();
    assert_eq!(snapshot.alerts_total, 1);
    assert_eq!(app.state.deduper.stats().suppressed_total, 1);

    app.shutdown().await;
}

#[tokio::test]
async fn wrong_secret_closes_with_4401() {
    let app = TestApp::spawn_with(&[("ZMETA_SHARED_SECRET", "hunter2")]).await;

    let (mut ws, _) = connect_async(app.ws_url("/ws")).await.expect("connect");
    let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("websocket error");
    match message {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4401),
        other => panic!("expected close frame, got {other:?}"),
    }

    app.shutdown().await;
}

#[tokio::test]
async fn query_secret_is_accepted_for_websockets() {
    let app = TestApp::spawn_with(&[("ZMETA_SHARED_SECRET", "hunter2")]).await;

    let (mut ws, _) = connect_async(app.ws_url("/ws?secret=hunter2"))
        .await
        .expect("connect");
    assert_eq!(next_text(&mut ws).await, "Connected to ZMeta WebSocket");

    app.shutdown().await;
}

#[tokio::test]
async fn disconnected_subscriber_leaves_the_registry() {
    let app = TestApp::spawn().await;
    let ws = connected_subscriber(&app).await;
    drop(ws);
    wait_until(|| app.state.hub.client_count() == 0).await;
    app.shutdown().await;
}

#[tokio::test]
async fn two_subscribers_both_receive_the_event() {
    let app = TestApp::spawn().await;
    let (mut ws1, _) = connect_async(app.ws_url("/ws")).await.unwrap();
    let (mut ws2, _) = connect_async(app.ws_url("/ws")).await.unwrap();
    assert_eq!(next_text(&mut ws1).await, "Connected to ZMeta WebSocket");
    assert_eq!(next_text(&mut ws2).await, "Connected to ZMeta WebSocket");
    wait_until(|| app.state.hub.client_count() == 2).await;

    let client = reqwest::Client::new();
    let response: serde_json::Value = client
        .post(app.url("/ingest"))
        .json(&rf_event_payload())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["broadcast_to"], 2);

    for ws in [&mut ws1, &mut ws2] {
        let event: serde_json::Value = serde_json::from_str(&next_text(ws).await).unwrap();
        assert_eq!(event["sensor_id"], "s1");
    }

    app.shutdown().await;
}
