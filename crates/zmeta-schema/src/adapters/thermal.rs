//! Simulated thermal detections: any of the common temperature spellings
//! → `thermal_hotspot` with a `temp_c` value object.

use serde_json::{json, Map, Value};

use super::{copy_common, copy_location, lift_confidence, num_at, str_at};

/// Places the simulators have been seen putting the temperature.
const TEMP_PATHS: [&str; 4] = [
    "data.temp_c",
    "data.temperature_c",
    "data.value.temp_c",
    "data.value.temperature_c",
];

pub(super) fn adapt(payload: &Value) -> Option<Value> {
    let source = str_at(payload, "source_format").unwrap_or_default();
    let modality = str_at(payload, "modality").unwrap_or_default();
    let kind = str_at(payload, "data.type").unwrap_or_default();

    let is_thermal =
        modality.eq_ignore_ascii_case("thermal") || matches!(kind, "hotspot" | "temperature");
    if !(source.eq_ignore_ascii_case("simulated_json_v1") || is_thermal) {
        return None;
    }

    let temp_c = num_at(payload, "data.value")
        .or_else(|| TEMP_PATHS.iter().find_map(|path| num_at(payload, path)))?;

    let mut data = Map::new();
    data.insert("type".to_owned(), json!("thermal_hotspot"));
    data.insert("value".to_owned(), json!({"temp_c": temp_c}));
    if let Some(confidence) = lift_confidence(payload) {
        data.insert("confidence".to_owned(), Value::from(confidence));
    }

    let mut out = Map::new();
    out.insert(
        "sensor_id".to_owned(),
        payload.get("sensor_id").cloned().unwrap_or_else(|| json!("sim_thermal")),
    );
    out.insert("modality".to_owned(), json!("thermal"));
    out.insert("location".to_owned(), copy_location(payload));
    out.insert("data".to_owned(), Value::Object(data));
    out.insert("source_format".to_owned(), json!("zmeta"));
    copy_common(payload, &mut out);
    Some(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use crate::parse_event;
    use serde_json::json;

    #[test]
    fn scalar_hotspot_value_becomes_temp_c() {
        let payload = json!({
            "timestamp": "2025-02-01T12:00:00Z",
            "sensor_id": "sim_thermal_01",
            "modality": "thermal",
            "location": {"lat": 35.2714, "lon": -78.6376, "alt": 145.0},
            "data": {"type": "hotspot", "value": 63.5},
            "source_format": "simulated_json_v1"
        });
        let adapted = super::adapt(&payload).expect("thermal adapter should claim the payload");
        assert_eq!(adapted["data"]["type"], json!("thermal_hotspot"));
        assert_eq!(adapted["data"]["value"]["temp_c"], json!(63.5));
        let event = parse_event(&adapted).expect("adapted payload should re-validate");
        assert_eq!(event.modality.as_str(), "thermal");
    }

    #[test]
    fn nested_temperature_spellings_are_searched_in_order() {
        let payload = json!({
            "timestamp": "2025-02-01T12:00:00Z",
            "sensor_id": "th-9",
            "modality": "thermal",
            "location": {"lat": 1.0, "lon": 2.0},
            "data": {"type": "hotspot", "value": {"temperature_c": 81.25}},
            "source_format": "edge_cam"
        });
        let adapted = super::adapt(&payload).unwrap();
        assert_eq!(adapted["data"]["value"]["temp_c"], json!(81.25));
    }

    #[test]
    fn declines_without_any_temperature() {
        let payload = json!({
            "timestamp": "2025-02-01T12:00:00Z",
            "sensor_id": "th-9",
            "modality": "thermal",
            "location": {"lat": 1.0, "lon": 2.0},
            "data": {"type": "hotspot", "value": {"bbox": [1, 2, 3, 4]}},
            "source_format": "edge_cam"
        });
        assert!(super::adapt(&payload).is_none());
    }

    #[test]
    fn declines_non_thermal_payloads() {
        let payload = json!({
            "sensor_id": "ac-1",
            "modality": "acoustic",
            "data": {"type": "doa", "value": 45.0},
            "source_format": "field_mic"
        });
        assert!(super::adapt(&payload).is_none());
    }
}
