//! Shared harness: a fully-wired app on ephemeral ports with a temp
//! record directory and rule file.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use backend::config::Config;
use backend::recorder::RecorderHandle;
use backend::udp::UdpReceiverHandle;
use backend::{build_router, udp, AppState};
use tokio::task::JoinHandle;

pub struct TestApp {
    pub addr: SocketAddr,
    pub udp_addr: SocketAddr,
    pub state: AppState,
    pub dir: tempfile::TempDir,
    server: JoinHandle<()>,
    udp_handle: Option<UdpReceiverHandle>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    /// Spawn with extra `ZMETA_*` overrides layered over test defaults.
    pub async fn spawn_with(vars: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut map: HashMap<String, String> = HashMap::from([
            ("ZMETA_UDP_HOST".to_owned(), "127.0.0.1".to_owned()),
            ("ZMETA_UDP_PORT".to_owned(), "0".to_owned()),
            (
                "ZMETA_RECORD_DIR".to_owned(),
                dir.path().join("records").display().to_string(),
            ),
            (
                "ZMETA_RULES_PATH".to_owned(),
                dir.path().join("rules.yaml").display().to_string(),
            ),
        ]);
        for (key, value) in vars {
            map.insert((*key).to_owned(), (*value).to_owned());
        }
        let config = Config::from_lookup(|name| map.get(name).cloned()).expect("config");

        let recorder = RecorderHandle::spawn(config.record_dir.clone(), config.retention);
        let state = AppState::new(config, recorder);
        state.rules.reload().expect("rules load");

        let udp_handle = udp::spawn(state.clone()).await.expect("udp bind");
        let udp_addr = udp_handle.local_addr();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("http bind");
        let addr = listener.local_addr().expect("http addr");
        let router = build_router(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("server error");
        });

        TestApp {
            addr,
            udp_addr,
            state,
            dir,
            server,
            udp_handle: Some(udp_handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self, path_and_query: &str) -> String {
        format!("ws://{}{path_and_query}", self.addr)
    }

    pub fn write_rules(&self, yaml: &str) {
        std::fs::write(self.dir.path().join("rules.yaml"), yaml).expect("write rules");
    }

    /// Contents of the single record file, once `expected_lines` are there.
    pub async fn read_record_lines(&self, expected_lines: usize) -> Vec<serde_json::Value> {
        wait_until(|| self.state.recorder.stats().total_written >= expected_lines as u64).await;
        let records_dir = self.dir.path().join("records");
        let mut paths: Vec<_> = std::fs::read_dir(&records_dir)
            .expect("records dir")
            .flatten()
            .map(|entry| entry.path())
            .collect();
        paths.sort();
        let mut lines = Vec::new();
        for path in paths {
            let content = std::fs::read_to_string(path).expect("record file");
            for line in content.lines() {
                lines.push(serde_json::from_str(line).expect("record line is JSON"));
            }
        }
        lines
    }

    pub async fn shutdown(mut self) {
        if let Some(udp_handle) = self.udp_handle.take() {
            udp_handle.stop().await;
        }
        self.server.abort();
        self.state.recorder.stop().await;
    }
}

/// Poll a condition for up to two seconds.
pub async fn wait_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

pub fn rf_event_payload() -> serde_json::Value {
    serde_json::json!({
        "timestamp": "2025-01-01T00:00:00Z",
        "sensor_id": "s1",
        "modality": "rf",
        "location": {"lat": 42.0, "lon": -71.0},
        "data": {"type": "frequency", "value": 915.2, "units": "MHz"},
        "source_format": "simulated_json_v1"
    })
}

pub const RF_ALERT_RULES: &str = r#"
rules:
  - name: rf_strong_signal
    severity: warn
    message: "Strong RF carrier in the ISM band"
    conditions:
      - field: modality
        eq: rf
      - field: data.value.frequency_hz
        between: [902000000, 928000000]
"#;
