//! Canonical event types (schema version "1.0" wire shape).
//!
//! The canonical event is the normalized sensor observation every ingest
//! path converges on.  `data.value` stays open (scalar or object) so that
//! per-modality payloads and foreign detections share one wire shape; the
//! typed 1.1 payloads in [`crate::v11`] project into it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

/// Schema versions the service accepts on the wire.
pub const SUPPORTED_SCHEMA_VERSIONS: [&str; 2] = ["1.0", "1.1"];

// ---------------------------------------------------------------------------
// Modality
// ---------------------------------------------------------------------------

/// Sensor modality.  Parsed case-insensitively, always serialized lower-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Thermal,
    Rf,
    Eo,
    Ir,
    Acoustic,
}

impl Modality {
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Thermal => "thermal",
            Modality::Rf => "rf",
            Modality::Eo => "eo",
            Modality::Ir => "ir",
            Modality::Acoustic => "acoustic",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thermal" => Ok(Modality::Thermal),
            "rf" => Ok(Modality::Rf),
            "eo" => Ok(Modality::Eo),
            "ir" => Ok(Modality::Ir),
            "acoustic" => Ok(Modality::Acoustic),
            _ => Err(ValidationError::UnknownModality(s.to_owned())),
        }
    }
}

impl Serialize for Modality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Modality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Sub-records
// ---------------------------------------------------------------------------

/// WGS84 position.  Altitude in meters when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
}

/// Platform or sensor attitude, degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<f64>,
}

/// The open measurement record.  `value` is a scalar or an object; typed
/// 1.1 payloads collapse into the object form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Where the observation came from and on what hardware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_promoted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_redacted: Option<bool>,
    pub source_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_id: Option<String>,
}

/// Link-quality readings reported by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportHealth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi_dbm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snr_db: Option<f64>,
}

/// Optional integrity metadata attached by an edge signer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityStamp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig_alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Downstream fusion annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redundancy_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<String>,
}

// ---------------------------------------------------------------------------
// Canonical event
// ---------------------------------------------------------------------------

fn default_schema_version() -> String {
    "1.0".to_owned()
}

/// The canonical sensor observation record.
///
/// `sequence` is assigned by the ingest pipeline when absent; a value
/// present on the wire is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub sensor_id: String,
    pub modality: Modality,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    pub data: SensorData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub source_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportHealth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityStamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fusion: Option<FusionContext>,
}

impl Event {
    /// Invariant checks that the serde shape alone cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sensor_id.is_empty() {
            return Err(ValidationError::EmptySensorId);
        }
        if !SUPPORTED_SCHEMA_VERSIONS.contains(&self.schema_version.as_str()) {
            return Err(ValidationError::UnsupportedSchemaVersion(
                self.schema_version.clone(),
            ));
        }
        if let Some(c) = self.data.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(ValidationError::ConfidenceOutOfRange(c));
            }
        }
        Ok(())
    }

    /// Compact single-line JSON, the form broadcast and recorded.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
