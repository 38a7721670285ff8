//! HTTP surface: ingest, health, status, rules, and auth behavior.

mod common;

use common::{rf_event_payload, wait_until, TestApp, RF_ALERT_RULES};
use serde_json::json;

#[tokio::test]
async fn rf_adapter_passthrough_records_the_normalized_event() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(app.url("/ingest"))
        .json(&rf_event_payload())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"ok": true, "broadcast_to": 0}));

    let lines = app.read_record_lines(1).await;
    assert_eq!(lines.len(), 1);
    let event = &lines[0];
    assert_eq!(event["data"]["type"], "rf_detection");
    assert_eq!(event["data"]["value"]["frequency_hz"], json!(915_200_000_i64));
    assert_eq!(event["sequence"], json!(1));
    assert_eq!(event["schema_version"], "1.0");
    assert_eq!(event["source_format"], "zmeta");
    assert!(event["timestamp"].as_str().unwrap().ends_with('Z'));

    app.shutdown().await;
}

#[tokio::test]
async fn invalid_modality_is_rejected_without_touching_counters() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let mut payload = rf_event_payload();
    payload["modality"] = json!("lidar");
    payload["source_format"] = json!("zmeta");
    let response = client
        .post(app.url("/ingest"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
    let body: serde_json::Value = response.json().await.unwrap();
    let detail = body["detail"].as_array().expect("detail array");
    assert!(detail[0].as_str().unwrap().contains("lidar"));

    let snapshot = app.state.metrics.snapshot();
    assert_eq!(snapshot.validated_total, 0);
    assert_eq!(snapshot.dropped_total, 0);

    app.shutdown().await;
}

#[tokio::test]
async fn non_object_body_is_rejected() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();
    let response = client
        .post(app.url("/ingest"))
        .json(&json!("just a string"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
    app.shutdown().await;
}

#[tokio::test]
async fn shared_secret_guards_ingest() {
    let app = TestApp::spawn_with(&[("ZMETA_SHARED_SECRET", "hunter2")]).await;
    let client = reqwest::Client::new();

    let denied = client
        .post(app.url("/ingest"))
        .json(&rf_event_payload())
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 401);

    let with_header = client
        .post(app.url("/ingest"))
        .header("x-zmeta-secret", "hunter2")
        .json(&rf_event_payload())
        .send()
        .await
        .unwrap();
    assert_eq!(with_header.status(), 200);

    let with_query = client
        .post(format!("{}?secret=hunter2", app.url("/ingest")))
        .json(&rf_event_payload())
        .send()
        .await
        .unwrap();
    assert_eq!(with_query.status(), 200);

    app.shutdown().await;
}

#[tokio::test]
async fn healthz_reports_counters_and_config() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    client
        .post(app.url("/ingest"))
        .json(&rf_event_payload())
        .send()
        .await
        .unwrap();

    let health: serde_json::Value = client
        .get(app.url("/healthz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["clients"], 0);
    assert_eq!(health["validated_total"], 1);
    assert_eq!(health["dropped_total"], 0);
    assert_eq!(health["ws_queue_max"], 64);
    assert_eq!(health["auth_mode"], "disabled");
    assert!(health["auth_header"].is_null());
    assert_eq!(health["allowed_origins"], json!(["*"]));
    assert_eq!(health["supported_schema_versions"], json!(["1.0", "1.1"]));
    assert_eq!(health["adapter_counts"]["simulated_v1_rf"], 1);
    assert!(health["last_packet_age_s"].is_number());

    app.shutdown().await;
}

#[tokio::test]
async fn status_reports_title_and_client_count() {
    let app = TestApp::spawn().await;
    let body: serde_json::Value = reqwest::get(app.url("/status")).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ZMeta Backend running");
    assert_eq!(body["clients"], 0);
    app.shutdown().await;
}

#[tokio::test]
async fn rules_can_be_inspected_and_reloaded() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let empty: serde_json::Value = client
        .get(app.url("/rules"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty["count"], 0);

    app.write_rules(
        r"
rules:
  - name: live_rule
    conditions:
      - field: modality
        eq: rf
  - name: dormant_rule
    enabled: false
    conditions:
      - field: modality
        eq: eo
",
    );
    let reloaded: serde_json::Value = client
        .post(app.url("/rules/reload"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reloaded, json!({"reloaded": true, "count": 1}));

    let listed: serde_json::Value = client
        .get(app.url("/rules"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["rules"], json!(["live_rule"]));

    app.shutdown().await;
}

#[tokio::test]
async fn malformed_rule_file_fails_reload_and_keeps_the_old_set() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    app.write_rules(RF_ALERT_RULES);
    client.post(app.url("/rules/reload")).send().await.unwrap();
    assert_eq!(app.state.rules.len(), 1);

    app.write_rules("rules: [{name: [nope");
    let response = client.post(app.url("/rules/reload")).send().await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(app.state.rules.len(), 1, "previous set should survive");

    app.shutdown().await;
}

#[tokio::test]
async fn v11_event_is_projected_but_keeps_its_version() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let payload = json!({
        "schema_version": "1.1",
        "timestamp": "2025-01-01T00:00:00Z",
        "sensor_id": "sensor-v11",
        "modality": "rf",
        "location": {"lat": 42.0, "lon": -71.0},
        "data": {"type": "burst", "freq_hz": 915_000_000.0, "rssi_dbm": -52.0},
        "provenance": {"source_format": "zmeta"}
    });
    let response = client
        .post(app.url("/ingest"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let lines = app.read_record_lines(1).await;
    let event = &lines[0];
    assert_eq!(event["schema_version"], "1.1");
    assert_eq!(event["data"]["type"], "rf_burst");
    assert_eq!(event["data"]["value"]["frequency_hz"], json!(915_000_000.0));
    assert_eq!(event["data"]["value"]["rssi_dbm"], json!(-52.0));

    app.shutdown().await;
}

#[tokio::test]
async fn sequences_are_gap_free_across_mixed_ingest() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        client
            .post(app.url("/ingest"))
            .json(&rf_event_payload())
            .send()
            .await
            .unwrap();
    }
    wait_until(|| app.state.metrics.snapshot().validated_total == 3).await;

    let lines = app.read_record_lines(3).await;
    let sequences: Vec<u64> = lines
        .iter()
        .map(|event| event["sequence"].as_u64().unwrap())
        .collect();
    assert_eq!(sequences, [1, 2, 3]);

    app.shutdown().await;
}
