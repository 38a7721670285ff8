//! Process-wide counters, the sequence generator, and the EPS window.
//!
//! One mutex guards the whole counter block so snapshots are consistent
//! with each other; every operation is a short, non-blocking critical
//! section shared by the ingest path and the hub sender tasks.

use serde::Serialize;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Ring size for validated-event timestamps: ~10 minutes at 1 Hz.
const EPS_RING_CAPACITY: usize = 600;

#[derive(Default)]
struct Inner {
    udp_received_total: u64,
    validated_total: u64,
    dropped_total: u64,
    alerts_total: u64,
    ws_sent_total: u64,
    ws_dropped_total: u64,
    sequence_counter: u64,
    adapter_counts: HashMap<String, u64>,
    /// Unix seconds of the last validated event, for observability.
    last_packet_ts: Option<f64>,
    /// Monotonic instants backing the age and EPS computations.
    last_packet_at: Option<Instant>,
    validated_at: VecDeque<Instant>,
}

/// A consistent copy of every counter.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub udp_received_total: u64,
    pub validated_total: u64,
    pub dropped_total: u64,
    pub alerts_total: u64,
    pub ws_sent_total: u64,
    pub ws_dropped_total: u64,
    pub sequence_counter: u64,
    pub last_packet_ts: Option<f64>,
    pub adapter_counts: HashMap<String, u64>,
}

#[derive(Default)]
pub struct Metrics {
    inner: Mutex<Inner>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("metrics lock poisoned")
    }

    pub fn note_received(&self) {
        self.lock().udp_received_total += 1;
    }

    pub fn note_dropped(&self) {
        self.lock().dropped_total += 1;
    }

    pub fn note_validated(&self) {
        self.note_validated_at(Instant::now(), unix_now());
    }

    fn note_validated_at(&self, now: Instant, unix: f64) {
        let mut inner = self.lock();
        inner.validated_total += 1;
        inner.last_packet_ts = Some(unix);
        inner.last_packet_at = Some(now);
        if inner.validated_at.len() == EPS_RING_CAPACITY {
            inner.validated_at.pop_front();
        }
        inner.validated_at.push_back(now);
    }

    pub fn note_alert(&self) {
        self.lock().alerts_total += 1;
    }

    pub fn note_ws_sent(&self) {
        self.lock().ws_sent_total += 1;
    }

    pub fn note_ws_dropped(&self) {
        self.lock().ws_dropped_total += 1;
    }

    pub fn note_adapter(&self, name: &str) {
        *self.lock().adapter_counts.entry(name.to_owned()).or_insert(0) += 1;
    }

    /// Monotonic, gap-free; the first value handed out is 1.
    pub fn next_sequence(&self) -> u64 {
        let mut inner = self.lock();
        inner.sequence_counter += 1;
        inner.sequence_counter
    }

    /// Validated events per second over the trailing window.
    pub fn eps(&self, window_s: u64) -> f64 {
        self.eps_at(window_s, Instant::now())
    }

    fn eps_at(&self, window_s: u64, now: Instant) -> f64 {
        let inner = self.lock();
        if inner.validated_at.is_empty() {
            return 0.0;
        }
        let count = inner
            .validated_at
            .iter()
            .filter(|at| now.duration_since(**at).as_secs_f64() <= window_s as f64)
            .count();
        round2(count as f64 / window_s.max(1) as f64)
    }

    /// Seconds since the last validated event, rounded to 2 decimals.
    pub fn last_packet_age(&self) -> Option<f64> {
        let inner = self.lock();
        inner
            .last_packet_at
            .map(|at| round2(at.elapsed().as_secs_f64()))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();
        MetricsSnapshot {
            udp_received_total: inner.udp_received_total,
            validated_total: inner.validated_total,
            dropped_total: inner.dropped_total,
            alerts_total: inner.alerts_total,
            ws_sent_total: inner.ws_sent_total,
            ws_dropped_total: inner.ws_dropped_total,
            sequence_counter: inner.sequence_counter,
            last_packet_ts: inner.last_packet_ts,
            adapter_counts: inner.adapter_counts.clone(),
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
