//! Typed schema "1.1" payloads and their projection to the 1.0 wire shape.
//!
//! 1.1 events carry a per-modality payload struct instead of the open
//! `data.value`.  The projection collapses the payload into a value object
//! (absent fields stripped), renames the frequency fields to their wire
//! names, and derives `data.type` as `"<modality>_<payload type>"`.  The
//! projected event keeps `schema_version = "1.1"`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::{
    Event, FusionContext, Location, Modality, Orientation, Provenance, SecurityStamp, SensorData,
    TransportHealth,
};

// ---------------------------------------------------------------------------
// Per-modality payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RfKind {
    #[default]
    Burst,
    Tone,
    Sweep,
    Unk,
}

/// RF detection payload.  Frequencies in Hz, powers in dBm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfData {
    #[serde(rename = "type", default)]
    pub kind: RfKind,
    pub freq_hz: f64,
    #[serde(default)]
    pub bw_hz: Option<f64>,
    #[serde(default)]
    pub tx_power_dbm: Option<f64>,
    #[serde(default)]
    pub rx_power_dbm: Option<f64>,
    #[serde(default)]
    pub power_dbm: Option<f64>,
    #[serde(default)]
    pub rssi_dbm: Option<f64>,
    #[serde(default)]
    pub doa_deg: Option<f64>,
    #[serde(default)]
    pub snr_db: Option<f64>,
    #[serde(default)]
    pub path_loss_db: Option<f64>,
    #[serde(default)]
    pub polarization: Option<String>,
    #[serde(default)]
    pub antenna_gain_dbi: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThermalKind {
    #[default]
    Hotspot,
    Bbox,
    Unk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalData {
    #[serde(rename = "type", default)]
    pub kind: ThermalKind,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub temp_c: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AcousticKind {
    #[default]
    Doa,
    Event,
    Unk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcousticData {
    #[serde(rename = "type", default)]
    pub kind: AcousticKind,
    #[serde(default)]
    pub doa_deg: Option<f64>,
    #[serde(default)]
    pub class_label: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EoirKind {
    #[default]
    Bbox,
    Feature,
    Unk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EoirData {
    #[serde(rename = "type", default)]
    pub kind: EoirKind,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub class_label: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Union of the typed payloads.  Matched in declaration order; RF is
/// anchored by its required `freq_hz`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorPayload {
    Rf(RfData),
    Thermal(ThermalData),
    Acoustic(AcousticData),
    Eoir(EoirData),
}

// ---------------------------------------------------------------------------
// 1.1 event
// ---------------------------------------------------------------------------

fn default_schema_version_11() -> String {
    "1.1".to_owned()
}

/// Schema 1.1 event: typed payload, provenance required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventV11 {
    #[serde(default = "default_schema_version_11")]
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    pub sensor_id: String,
    pub modality: Modality,
    pub location: Location,
    pub data: SensorPayload,
    pub provenance: Provenance,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub pid: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub stream_id: Option<String>,
    #[serde(default)]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub partition_key: Option<String>,
    #[serde(default)]
    pub transport: Option<TransportHealth>,
    #[serde(default)]
    pub security: Option<SecurityStamp>,
    #[serde(default)]
    pub fusion: Option<FusionContext>,
}

impl EventV11 {
    /// Lossless projection into the 1.0 wire shape.
    pub fn into_event(self) -> Event {
        let data = sensor_payload_to_data(self.modality, &self.data);
        Event {
            timestamp: self.timestamp,
            sensor_id: self.sensor_id,
            modality: self.modality,
            location: self.location,
            orientation: self.orientation,
            data,
            pid: self.pid,
            tags: self.tags,
            note: self.note,
            schema_version: self.schema_version,
            sequence: self.sequence,
            source_format: self.provenance.source_format.clone(),
            stream_id: self.stream_id,
            bundle_id: self.bundle_id,
            partition_key: self.partition_key,
            provenance: Some(self.provenance),
            transport: self.transport,
            security: self.security,
            fusion: self.fusion,
        }
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

fn insert_f64(map: &mut Map<String, Value>, key: &str, value: Option<f64>) {
    if let Some(v) = value {
        map.insert(key.to_owned(), Value::from(v));
    }
}

fn insert_str(map: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        map.insert(key.to_owned(), Value::from(v));
    }
}

fn sensor_payload_to_data(modality: Modality, payload: &SensorPayload) -> SensorData {
    let mut value = Map::new();
    let (kind_suffix, confidence) = match payload {
        SensorPayload::Rf(rf) => {
            value.insert("frequency_hz".to_owned(), Value::from(rf.freq_hz));
            insert_f64(&mut value, "bandwidth_hz", rf.bw_hz);
            insert_f64(&mut value, "tx_power_dbm", rf.tx_power_dbm);
            insert_f64(&mut value, "rx_power_dbm", rf.rx_power_dbm);
            insert_f64(&mut value, "power_dbm", rf.power_dbm);
            insert_f64(&mut value, "rssi_dbm", rf.rssi_dbm);
            insert_f64(&mut value, "doa_deg", rf.doa_deg);
            insert_f64(&mut value, "snr_db", rf.snr_db);
            insert_f64(&mut value, "path_loss_db", rf.path_loss_db);
            insert_str(&mut value, "polarization", rf.polarization.clone());
            insert_f64(&mut value, "antenna_gain_dbi", rf.antenna_gain_dbi);
            let suffix = match rf.kind {
                RfKind::Burst => "burst",
                RfKind::Tone => "tone",
                RfKind::Sweep => "sweep",
                RfKind::Unk => "unk",
            };
            (suffix, rf.confidence)
        }
        SensorPayload::Thermal(thermal) => {
            if let Some(bbox) = &thermal.bbox {
                value.insert("bbox".to_owned(), Value::from(bbox.clone()));
            }
            insert_f64(&mut value, "temp_c", thermal.temp_c);
            let suffix = match thermal.kind {
                ThermalKind::Hotspot => "hotspot",
                ThermalKind::Bbox => "bbox",
                ThermalKind::Unk => "unk",
            };
            (suffix, thermal.confidence)
        }
        SensorPayload::Acoustic(acoustic) => {
            insert_f64(&mut value, "doa_deg", acoustic.doa_deg);
            insert_str(&mut value, "class_label", acoustic.class_label.clone());
            let suffix = match acoustic.kind {
                AcousticKind::Doa => "doa",
                AcousticKind::Event => "event",
                AcousticKind::Unk => "unk",
            };
            (suffix, acoustic.confidence)
        }
        SensorPayload::Eoir(eoir) => {
            if let Some(bbox) = &eoir.bbox {
                value.insert("bbox".to_owned(), Value::from(bbox.clone()));
            }
            insert_str(&mut value, "class_label", eoir.class_label.clone());
            let suffix = match eoir.kind {
                EoirKind::Bbox => "bbox",
                EoirKind::Feature => "feature",
                EoirKind::Unk => "unk",
            };
            (suffix, eoir.confidence)
        }
    };
    SensorData {
        kind: format!("{}_{}", modality.as_str(), kind_suffix),
        value: Value::Object(value),
        units: None,
        confidence,
    }
}
