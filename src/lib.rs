pub mod actors;
pub mod analysis;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod normalizer;
pub mod storage;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped telemetry sample from one elevator.
///
/// This is the canonical shape produced by [`normalizer::normalize`] and the
/// only shape the rest of the pipeline accepts. Every numeric field is finite.
///
/// The serde field names are the wire names used by the sensor firmware and
/// the dashboards, so the broadcast payload and the ingestion payload share
/// one vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Sample instant (UTC, millisecond precision on the wire)
    #[serde(rename = "t", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Elevator identity; readings without one are relayed but never stored
    #[serde(
        rename = "id_elevador",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub elevator_id: Option<String>,

    /// Motor current (A)
    #[serde(rename = "ia")]
    pub current_a: f64,

    /// Machine room temperature (°C)
    #[serde(rename = "temp_c")]
    pub temperature_c: f64,

    /// Cabin vibration, sensor 1 (m/s²)
    #[serde(rename = "vib_s1_ms2")]
    pub vibration_ms2: f64,

    /// Supply voltage (V), measured or derived from the current
    #[serde(rename = "tensao")]
    pub voltage_v: f64,

    #[serde(rename = "velocidade")]
    pub speed: f64,

    /// Controller state code as reported by the firmware
    #[serde(rename = "estado")]
    pub state: i64,

    #[serde(rename = "dist_l1")]
    pub distance_l1: f64,

    #[serde(rename = "dist_l2")]
    pub distance_l2: f64,

    #[serde(rename = "dist_o1")]
    pub distance_o1: f64,

    #[serde(rename = "dist_o2")]
    pub distance_o2: f64,

    /// Cabin height, passed through untouched
    #[serde(rename = "altura", default, skip_serializing_if = "Option::is_none")]
    pub height: Option<serde_json::Value>,
}

impl SensorReading {
    /// Distance reported when a distance sensor is absent or unreadable
    pub const DEFAULT_DISTANCE: f64 = 200.0;

    /// Create a reading with every signal at its default value
    pub fn new(elevator_id: Option<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            elevator_id,
            current_a: 0.0,
            temperature_c: 0.0,
            vibration_ms2: 0.0,
            voltage_v: 0.0,
            speed: 0.0,
            state: 0,
            distance_l1: Self::DEFAULT_DISTANCE,
            distance_l2: Self::DEFAULT_DISTANCE,
            distance_o1: Self::DEFAULT_DISTANCE,
            distance_o2: Self::DEFAULT_DISTANCE,
            height: None,
        }
    }

    /// Serialize to the canonical wire form sent to subscribers
    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse the canonical wire form
    pub fn from_wire(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}
