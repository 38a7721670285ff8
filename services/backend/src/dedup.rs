//! Short-TTL alert suppression.
//!
//! Key: `"{rule}|{sensor_id}|{severity}|{lat4},{lon4}"` with coordinates
//! rounded to four decimals.  Absent parts render as the literal `None`,
//! kept for compatibility with historical suppression keys.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use zmeta_rules::Alert;

pub const DEFAULT_TTL: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_KEYS: usize = 10_000;

#[derive(Default)]
struct State {
    seen: HashMap<String, Instant>,
    checked_total: u64,
    suppressed_total: u64,
}

pub struct AlertDeduper {
    ttl: Duration,
    max_keys: usize,
    state: Mutex<State>,
}

/// Counters exposed on the health surface.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct DeduperStats {
    pub ttl_s: f64,
    pub checked_total: u64,
    pub suppressed_total: u64,
}

impl Default for AlertDeduper {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_KEYS)
    }
}

impl AlertDeduper {
    pub fn new(ttl: Duration, max_keys: usize) -> Self {
        AlertDeduper {
            ttl,
            max_keys,
            state: Mutex::new(State::default()),
        }
    }

    /// True when the alert should be broadcast; false when an identical
    /// key fired within the TTL.
    pub fn should_send(&self, alert: &Alert) -> bool {
        self.should_send_at(alert, Instant::now())
    }

    pub fn should_send_at(&self, alert: &Alert, now: Instant) -> bool {
        let key = dedup_key(alert);
        let mut state = self.state.lock().expect("dedup lock poisoned");
        state.checked_total += 1;
        if let Some(last) = state.seen.get(&key) {
            if now.duration_since(*last) < self.ttl {
                state.suppressed_total += 1;
                return false;
            }
        }
        state.seen.insert(key, now);
        if state.seen.len() > self.max_keys {
            let ttl = self.ttl;
            state.seen.retain(|_, at| now.duration_since(*at) < ttl);
        }
        true
    }

    pub fn stats(&self) -> DeduperStats {
        let state = self.state.lock().expect("dedup lock poisoned");
        DeduperStats {
            ttl_s: self.ttl.as_secs_f64(),
            checked_total: state.checked_total,
            suppressed_total: state.suppressed_total,
        }
    }
}

fn dedup_key(alert: &Alert) -> String {
    format!(
        "{}|{}|{}|{},{}",
        alert.rule,
        alert.sensor_id.as_deref().unwrap_or("None"),
        alert.severity,
        coord(alert.loc.lat),
        coord(alert.loc.lon),
    )
}

/// Four-decimal rounding with the shortest decimal rendering; `None` for
/// absent coordinates.
fn coord(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", (v * 10_000.0).round() / 10_000.0),
        None => "None".to_owned(),
    }
}
