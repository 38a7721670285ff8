//! Simulated RF detections: scalar MHz center frequency → `rf_detection`
//! with an integral `frequency_hz` value object.

use serde_json::{json, Map, Value};

use super::{copy_common, copy_location, lift_confidence, num_at, str_at};

pub(super) fn adapt(payload: &Value) -> Option<Value> {
    let source = str_at(payload, "source_format").unwrap_or_default();
    let modality = str_at(payload, "modality").unwrap_or_default();
    let kind = str_at(payload, "data.type").unwrap_or_default();
    let units = str_at(payload, "data.units").unwrap_or_default().trim().to_ascii_lowercase();

    let matches_format =
        source.eq_ignore_ascii_case("simulated_json_v1") && modality.eq_ignore_ascii_case("rf");
    let matches_shape = kind == "frequency" && units == "mhz";
    if !(matches_format || matches_shape) {
        return None;
    }
    let mhz = num_at(payload, "data.value")?;

    #[allow(clippy::cast_possible_truncation)]
    let frequency_hz = (mhz * 1_000_000.0).round() as i64;
    let mut value = Map::new();
    value.insert("frequency_hz".to_owned(), Value::from(frequency_hz));

    // Carry signal metadata the simulator places in either data.* or
    // data.value.*.
    if let Some(rssi) = num_at(payload, "data.rssi_dbm").or_else(|| num_at(payload, "data.value.rssi_dbm")) {
        value.insert("rssi_dbm".to_owned(), Value::from(rssi));
    }
    if let Some(bw) = num_at(payload, "data.bandwidth_hz").or_else(|| num_at(payload, "data.value.bandwidth_hz")) {
        #[allow(clippy::cast_possible_truncation)]
        value.insert("bandwidth_hz".to_owned(), Value::from(bw as i64));
    }
    if let Some(dwell) = num_at(payload, "data.dwell_s").or_else(|| num_at(payload, "data.value.dwell_s")) {
        value.insert("dwell_s".to_owned(), Value::from(dwell));
    }

    let mut data = Map::new();
    data.insert("type".to_owned(), json!("rf_detection"));
    data.insert("value".to_owned(), Value::Object(value));
    if let Some(confidence) = lift_confidence(payload) {
        data.insert("confidence".to_owned(), Value::from(confidence));
    }

    let mut out = Map::new();
    out.insert(
        "sensor_id".to_owned(),
        payload.get("sensor_id").cloned().unwrap_or_else(|| json!("sim_rf")),
    );
    out.insert(
        "modality".to_owned(),
        payload.get("modality").cloned().unwrap_or_else(|| json!("rf")),
    );
    out.insert("location".to_owned(), copy_location(payload));
    out.insert("data".to_owned(), Value::Object(data));
    out.insert("source_format".to_owned(), json!("zmeta"));
    copy_common(payload, &mut out);
    Some(Value::Object(out))
}
