//! UDP ingest: one JSON object per datagram, no framing.
//!
//! The socket task never blocks on downstream work: datagrams are counted,
//! lossily decoded, and handed to a bounded queue with drop-on-overflow.
//! A separate consumer task parses and runs the ingest pipeline; malformed
//! or rejected payloads are counted and logged with a truncated snippet.

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::ingest::ingest_payload;
use crate::state::AppState;

const MAX_DATAGRAM: usize = 65_535;
const SNIPPET_CHARS: usize = 200;

pub struct UdpReceiverHandle {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl UdpReceiverHandle {
    /// The bound address (relevant when the configured port is 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

/// Bind the configured address and start the receive and consume tasks.
pub async fn spawn(state: AppState) -> std::io::Result<UdpReceiverHandle> {
    let bind = format!("{}:{}", state.config.udp_host, state.config.udp_port);
    let socket = UdpSocket::bind(&bind).await?;
    let local_addr = socket.local_addr()?;
    info!(addr = %local_addr, "UDP listener bound");

    let (tx, rx) = mpsc::channel(state.config.udp_queue_max);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = vec![
        tokio::spawn(receive_loop(socket, tx, state.clone(), shutdown_rx.clone())),
        tokio::spawn(consume_loop(rx, state, shutdown_rx)),
    ];
    Ok(UdpReceiverHandle {
        local_addr,
        shutdown_tx,
        tasks,
    })
}

/// Socket side: count, decode lossily, strip, enqueue without waiting.
async fn receive_loop(
    socket: UdpSocket,
    tx: mpsc::Sender<String>,
    state: AppState,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            received = socket.recv_from(&mut buf) => {
                let (len, addr) = match received {
                    Ok(ok) => ok,
                    Err(e) => {
                        warn!(error = %e, "UDP receive failed");
                        continue;
                    }
                };
                state.metrics.note_received();
                let text = String::from_utf8_lossy(&buf[..len]).trim().to_owned();
                if text.is_empty() {
                    continue;
                }
                if tx.try_send(text).is_err() {
                    state.metrics.note_dropped();
                    warn!(%addr, "UDP queue full, dropping datagram");
                }
            }
        }
    }
}

/// Queue side: parse JSON and run the pipeline; failures count as drops.
async fn consume_loop(
    mut rx: mpsc::Receiver<String>,
    state: AppState,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            raw = rx.recv() => {
                let Some(raw) = raw else { break };
                match serde_json::from_str(&raw) {
                    Ok(payload) => {
                        if let Err(e) = ingest_payload(&state, &payload, "udp").await {
                            state.metrics.note_dropped();
                            warn!(error = %e, snippet = %snippet(&raw), "UDP payload rejected");
                        }
                    }
                    Err(e) => {
                        state.metrics.note_dropped();
                        warn!(error = %e, snippet = %snippet(&raw), "UDP payload is not JSON");
                    }
                }
            }
        }
    }
}

fn snippet(raw: &str) -> String {
    raw.chars().take(SNIPPET_CHARS).collect()
}
