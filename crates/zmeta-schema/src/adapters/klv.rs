//! KLV-style metadata dictionaries → canonical events.
//!
//! Recognized by the presence of any of the characteristic camel-case keys.
//! Target position maps to `location`, platform attitude to `orientation`,
//! and the signal descriptors into `data.value`.

use chrono::Utc;
use serde_json::{json, Map, Value};

const KLV_MARKER_KEYS: [&str; 4] = [
    "targetLatitude",
    "targetLongitude",
    "sensorType",
    "platformHeading",
];

pub(super) fn adapt(payload: &Value) -> Option<Value> {
    let object = payload.as_object()?;
    if !KLV_MARKER_KEYS.iter().any(|key| object.contains_key(*key)) {
        return None;
    }

    let sensor_type = object
        .get("sensorType")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    let mut location = Map::new();
    for (out_key, in_key) in [
        ("lat", "targetLatitude"),
        ("lon", "targetLongitude"),
        ("alt", "targetAltitude"),
    ] {
        let v = object.get(in_key).and_then(Value::as_f64).unwrap_or(0.0);
        location.insert(out_key.to_owned(), Value::from(v));
    }

    let mut orientation = Map::new();
    for (out_key, in_key) in [
        ("yaw", "platformHeading"),
        ("pitch", "platformPitch"),
        ("roll", "platformRoll"),
    ] {
        if let Some(v) = object.get(in_key).and_then(Value::as_f64) {
            orientation.insert(out_key.to_owned(), Value::from(v));
        }
    }

    let mut value = Map::new();
    for (out_key, in_key) in [
        ("signal_strength", "signal_strength"),
        ("modulation", "modulation"),
        ("fov", "sensorFOV"),
    ] {
        if let Some(v) = object.get(in_key) {
            if !v.is_null() {
                value.insert(out_key.to_owned(), v.clone());
            }
        }
    }

    let mut out = Map::new();
    out.insert(
        "sensor_id".to_owned(),
        object.get("sensor_id").cloned().unwrap_or_else(|| json!("klv_source_001")),
    );
    out.insert(
        "timestamp".to_owned(),
        object.get("timestamp").cloned().unwrap_or_else(|| json!(Utc::now())),
    );
    out.insert("location".to_owned(), Value::Object(location));
    out.insert("modality".to_owned(), json!(sensor_type.to_ascii_lowercase()));
    out.insert("orientation".to_owned(), Value::Object(orientation));
    out.insert(
        "data".to_owned(),
        json!({
            "type": sensor_type,
            "value": Value::Object(value),
            "confidence": object.get("confidence").cloned().unwrap_or(json!(1.0)),
        }),
    );
    if let Some(pid) = object.get("pid") {
        out.insert("pid".to_owned(), pid.clone());
    }
    out.insert(
        "tags".to_owned(),
        object.get("tags").cloned().unwrap_or_else(|| json!(["converted", "klv"])),
    );
    out.insert(
        "note".to_owned(),
        object.get("note").cloned().unwrap_or_else(|| json!("Converted from KLV")),
    );
    out.insert("source_format".to_owned(), json!("KLV"));
    out.insert("schema_version".to_owned(), json!("1.0"));
    Some(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use crate::{parse_event, validate_or_adapt, Modality};
    use serde_json::json;

    fn klv_payload() -> serde_json::Value {
        json!({
            "sensor_id": "klv_source_001",
            "timestamp": "2025-02-01T18:30:00Z",
            "targetLatitude": 35.0005,
            "targetLongitude": -78.0005,
            "targetAltitude": 120.0,
            "sensorType": "RF",
            "platformHeading": 45.0,
            "signal_strength": -52.0
        })
    }

    #[test]
    fn klv_keys_map_to_canonical_fields() {
        let (name, event) = validate_or_adapt(&klv_payload()).unwrap();
        assert_eq!(name, "klv_like");
        assert_eq!(event.modality, Modality::Rf);
        assert_eq!(event.source_format, "KLV");
        assert!((event.location.lat - 35.0005).abs() < 1e-9);
        assert_eq!(event.location.alt, Some(120.0));
        let orientation = event.orientation.expect("heading should map to yaw");
        assert_eq!(orientation.yaw, Some(45.0));
        assert_eq!(event.data.value["signal_strength"], json!(-52.0));
        assert_eq!(event.tags.as_deref(), Some(["converted".to_owned(), "klv".to_owned()].as_slice()));
    }

    #[test]
    fn missing_timestamp_is_filled_with_now() {
        let mut payload = klv_payload();
        payload.as_object_mut().unwrap().remove("timestamp");
        let adapted = super::adapt(&payload).unwrap();
        assert!(adapted.get("timestamp").is_some());
        assert!(parse_event(&adapted).is_ok());
    }

    #[test]
    fn unknown_sensor_type_fails_revalidation() {
        let mut payload = klv_payload();
        payload["sensorType"] = json!("gravimeter");
        let adapted = super::adapt(&payload).expect("adapter still claims KLV shapes");
        assert!(parse_event(&adapted).is_err());
    }

    #[test]
    fn declines_payloads_without_klv_markers() {
        let payload = json!({"sensor_id": "plain", "data": {"type": "x"}});
        assert!(super::adapt(&payload).is_none());
    }
}
