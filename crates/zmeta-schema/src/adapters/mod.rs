//! Ordered registry of foreign-payload adapters.
//!
//! Each adapter inspects a raw JSON payload and, when it recognizes the
//! format (by explicit `source_format` tag, shape heuristics, or known
//! foreign keys), returns a normalized payload for strict re-validation.
//! The first adapter to return a result decides.

mod klv;
mod rf;
mod thermal;

use serde_json::{Map, Value};

type AdapterFn = fn(&Value) -> Option<Value>;

/// Registry in evaluation order: the simulator formats first, KLV last.
const REGISTRY: [(&str, AdapterFn); 3] = [
    ("simulated_v1_rf", rf::adapt),
    ("simulated_v1_thermal", thermal::adapt),
    ("klv_like", klv::adapt),
];

/// Run the registry; the first adapter that claims the payload wins.
pub fn adapt(payload: &Value) -> Option<(&'static str, Value)> {
    for (name, adapter) in REGISTRY {
        if let Some(normalized) = adapter(payload) {
            return Some((name, normalized));
        }
    }
    None
}

/// `source_format` tags that always belong to the registry, even when the
/// payload happens to satisfy the canonical shape.
pub fn is_foreign_format(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("simulated_json_v1")
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Resolve a dotted path ("data.value.rssi_dbm") against a JSON object.
pub(crate) fn get_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

pub(crate) fn num_at(payload: &Value, path: &str) -> Option<f64> {
    get_path(payload, path).and_then(Value::as_f64)
}

pub(crate) fn str_at<'a>(payload: &'a Value, path: &str) -> Option<&'a str> {
    get_path(payload, path).and_then(Value::as_str)
}

/// Copy the `location` object field-by-field, dropping absent parts.
pub(crate) fn copy_location(payload: &Value) -> Value {
    let mut out = Map::new();
    for key in ["lat", "lon", "alt"] {
        if let Some(v) = num_at(payload, &format!("location.{key}")) {
            out.insert(key.to_owned(), Value::from(v));
        }
    }
    Value::Object(out)
}

/// Prefer a top-level `confidence`; fall back to `data.confidence`.
pub(crate) fn lift_confidence(payload: &Value) -> Option<f64> {
    payload
        .get("confidence")
        .and_then(Value::as_f64)
        .or_else(|| num_at(payload, "data.confidence"))
}

/// Copy pass-through metadata fields shared by the simulator adapters.
pub(crate) fn copy_common(payload: &Value, out: &mut Map<String, Value>) {
    for key in ["timestamp", "orientation", "pid", "tags", "note"] {
        if let Some(v) = payload.get(key) {
            if !v.is_null() {
                out.insert(key.to_owned(), v.clone());
            }
        }
    }
}
