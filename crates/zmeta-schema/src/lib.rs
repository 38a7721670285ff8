// zmeta-schema: canonical sensor event model and ingest adapters.
//
// Parsing strategy: strict validation of the 1.0 wire shape, falling back
// to the typed 1.1 shape (projected losslessly into 1.0), and finally to
// the ordered adapter registry for recognized foreign formats.  When every
// path declines, the strict-validation error is the one surfaced.

pub mod adapters;
pub mod event;
pub mod v11;

pub use event::{
    Event, FusionContext, Location, Modality, Orientation, Provenance, SecurityStamp, SensorData,
    TransportHealth, SUPPORTED_SCHEMA_VERSIONS,
};
pub use v11::{AcousticData, EoirData, EventV11, RfData, SensorPayload, ThermalData};

use serde_json::Value;

/// Adapter name recorded when strict validation succeeded without adaptation.
pub const NATIVE: &str = "native";

/// Why a payload was rejected.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    /// The payload does not deserialize into any supported event shape.
    #[error("invalid payload: {0}")]
    Shape(String),
    #[error("unsupported schema_version: {0}")]
    UnsupportedSchemaVersion(String),
    #[error("unknown modality: {0}")]
    UnknownModality(String),
    #[error("sensor_id must not be empty")]
    EmptySensorId,
    #[error("confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),
}

/// Field checks that produce a precise error kind before serde reports a
/// generic shape mismatch.
fn precheck(payload: &Value) -> Result<(), ValidationError> {
    if let Some(version) = payload.get("schema_version").and_then(Value::as_str) {
        if !SUPPORTED_SCHEMA_VERSIONS.contains(&version) {
            return Err(ValidationError::UnsupportedSchemaVersion(version.to_owned()));
        }
    }
    if let Some(modality) = payload.get("modality").and_then(Value::as_str) {
        modality.parse::<Modality>()?;
    }
    Ok(())
}

/// Strictly parse a canonical event: the 1.0 shape first, then the typed
/// 1.1 shape projected into 1.0.  No adapters are consulted.
pub fn parse_event(payload: &Value) -> Result<Event, ValidationError> {
    precheck(payload)?;
    let shape_error = match serde_json::from_value::<Event>(payload.clone()) {
        Ok(event) => {
            event.validate()?;
            return Ok(event);
        }
        Err(e) => ValidationError::Shape(e.to_string()),
    };
    match serde_json::from_value::<EventV11>(payload.clone()) {
        Ok(v11) => {
            let event = v11.into_event();
            event.validate()?;
            Ok(event)
        }
        Err(_) => Err(shape_error),
    }
}

/// Parse a payload, consulting the adapter registry for foreign formats.
///
/// Returns the name of the adapter that decided ([`NATIVE`] when strict
/// validation carried the payload as-is).  Payloads that self-identify as a
/// foreign `source_format` go through the registry even when they happen to
/// satisfy the canonical shape — a simulated MHz detection is syntactically
/// valid 1.0 but still needs normalizing.  Adapter output is re-validated
/// strictly; if every adapter declines, the strict error is surfaced.
pub fn validate_or_adapt(payload: &Value) -> Result<(&'static str, Event), ValidationError> {
    let strict = parse_event(payload);
    let foreign_tag = payload
        .get("source_format")
        .and_then(Value::as_str)
        .is_some_and(adapters::is_foreign_format);
    if let Ok(event) = &strict {
        if !foreign_tag {
            return Ok((NATIVE, event.clone()));
        }
    }
    if let Some((name, adapted)) = adapters::adapt(payload) {
        let event = parse_event(&adapted)?;
        return Ok((name, event));
    }
    strict.map(|event| (NATIVE, event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn native_payload_skips_the_registry() {
        let payload = json!({
            "timestamp": "2025-01-01T00:00:00Z",
            "sensor_id": "s1",
            "modality": "rf",
            "location": {"lat": 42.0, "lon": -71.0},
            "data": {"type": "rf_detection", "value": {"frequency_hz": 915_000_000_u64}},
            "source_format": "zmeta"
        });
        let (name, event) = validate_or_adapt(&payload).unwrap();
        assert_eq!(name, NATIVE);
        assert_eq!(event.modality, Modality::Rf);
    }

    #[test]
    fn foreign_tag_routes_through_the_adapter_even_when_shape_valid() {
        // Syntactically valid 1.0, but tagged as the simulator format with a
        // scalar MHz value that must be normalized to Hz.
        let payload = json!({
            "timestamp": "2025-01-01T00:00:00Z",
            "sensor_id": "s1",
            "modality": "rf",
            "location": {"lat": 42.0, "lon": -71.0},
            "data": {"type": "frequency", "value": 915.2, "units": "MHz"},
            "source_format": "simulated_json_v1"
        });
        let (name, event) = validate_or_adapt(&payload).unwrap();
        assert_eq!(name, "simulated_v1_rf");
        assert_eq!(event.data.kind, "rf_detection");
        assert_eq!(event.data.value["frequency_hz"], json!(915_200_000_i64));
        assert_eq!(event.schema_version, "1.0");
    }

    #[test]
    fn rejection_surfaces_the_strict_error_when_all_adapters_decline() {
        let payload = json!({
            "timestamp": "2025-01-01T00:00:00Z",
            "sensor_id": "s1",
            "modality": "lidar",
            "location": {"lat": 42.0, "lon": -71.0},
            "data": {"type": "point_cloud", "value": {}},
            "source_format": "zmeta"
        });
        assert!(matches!(
            validate_or_adapt(&payload),
            Err(ValidationError::UnknownModality(m)) if m == "lidar"
        ));
    }

    #[test]
    fn v11_payload_is_projected_into_the_1_0_shape() {
        let payload = json!({
            "schema_version": "1.1",
            "timestamp": "2025-01-01T00:00:00Z",
            "sensor_id": "sensor-test-v11",
            "modality": "rf",
            "location": {"lat": 42.0, "lon": -71.0},
            "data": {"type": "burst", "freq_hz": 915_000_000.0, "rssi_dbm": -52.0, "confidence": 0.93},
            "provenance": {"source_format": "zmeta"}
        });
        let (name, event) = validate_or_adapt(&payload).unwrap();
        assert_eq!(name, NATIVE);
        assert_eq!(event.schema_version, "1.1");
        assert_eq!(event.data.kind, "rf_burst");
        assert_eq!(event.data.value["frequency_hz"], json!(915_000_000.0));
        assert_eq!(event.data.value["rssi_dbm"], json!(-52.0));
        assert_eq!(event.data.confidence, Some(0.93));
        assert_eq!(event.source_format, "zmeta");
        assert!(event.provenance.is_some());
    }
}
