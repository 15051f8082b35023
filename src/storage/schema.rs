//! Stored record definitions
//!
//! Readings are stored in the shape of [`crate::SensorReading`] itself. The
//! only derived record is the [`DailyAggregate`]: one row per elevator and
//! reference day, written by the aggregation scheduler and never updated.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day's reduction of all readings of one elevator
///
/// Serialized with the column names the dashboards already consume
/// (`temp_media`, `corrente_max`, `picos_corrente_alta`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    #[serde(rename = "id_elevador")]
    pub elevator_id: String,

    /// Calendar day (UTC) the row summarizes
    #[serde(rename = "data")]
    pub reference_date: NaiveDate,

    #[serde(rename = "temp_media")]
    pub temp_mean: f64,

    #[serde(rename = "temp_max")]
    pub temp_max: f64,

    #[serde(rename = "vib_media")]
    pub vib_mean: f64,

    #[serde(rename = "vib_max")]
    pub vib_max: f64,

    #[serde(rename = "corrente_media")]
    pub current_mean: f64,

    #[serde(rename = "corrente_max")]
    pub current_max: f64,

    #[serde(rename = "tensao_media")]
    pub voltage_mean: f64,

    /// Readings whose current exceeded the high-current threshold
    #[serde(rename = "picos_corrente_alta")]
    pub high_current_count: u32,

    #[serde(rename = "leituras_totais")]
    pub total_readings: u32,
}
